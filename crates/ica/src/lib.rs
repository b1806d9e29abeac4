//! HTTP client for the ICA shopping-list API.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use keepsync_engine::{RemoteItem, RemoteList, RemoteStore, RowId};

#[derive(Debug, Clone)]
pub struct IcaClient {
    client: Client,
    base_url: String,
    session_id: String,
}

impl IcaClient {
    pub fn new(base_url: &str, session_id: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(base_url.trim())
            .with_context(|| format!("invalid ICA base url: {base_url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("ICA base url must be http(s), got {}", parsed.scheme());
        }
        if session_id.trim().is_empty() {
            bail!("ICA session id is empty");
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            session_id: session_id.trim().to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl RemoteStore for IcaClient {
    async fn fetch_lists(&self) -> Result<Vec<RemoteList>> {
        let response = self
            .client
            .get(self.endpoint("list/all"))
            .bearer_auth(&self.session_id)
            .send()
            .await
            .context("fetching ICA lists")?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            bail!("ICA list/all failed ({status}): {}", truncate(&body, 200));
        }
        let lists = parse_lists(&body)?;
        debug!(lists = lists.len(), "fetched ICA lists");
        Ok(lists)
    }

    async fn add_to_list(&self, list_id: &str, text: &str) -> Result<bool> {
        let response = self
            .client
            .post(self.endpoint(&format!("row/{list_id}")))
            .bearer_auth(&self.session_id)
            .json(&json!({ "text": text }))
            .send()
            .await
            .with_context(|| format!("adding '{text}' to ICA"))?;

        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        if status.is_client_error() {
            warn!(%status, item = %text, list_id, "ICA refused row");
            return Ok(false);
        }
        bail!("ICA add failed ({status})")
    }

    async fn remove_item(&self, row_id: &RowId) -> Result<bool> {
        let response = self
            .client
            .delete(self.endpoint(&format!("row/{row_id}")))
            .bearer_auth(&self.session_id)
            .send()
            .await
            .with_context(|| format!("removing ICA row {row_id}"))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => {
                debug!(%row_id, "ICA row already gone");
                Ok(false)
            }
            status => bail!("ICA remove failed ({status})"),
        }
    }
}

// ── Wire format ─────────────────────────────────────────────────────────────

/// Row and list ids arrive as numbers or strings depending on the endpoint.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireId {
    Number(i64),
    Text(String),
}

impl WireId {
    fn into_string(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireList {
    id: WireId,
    #[serde(default)]
    rows: Vec<WireRow>,
}

#[derive(Debug, Deserialize)]
struct WireRow {
    id: Option<WireId>,
    #[serde(default)]
    text: String,
    #[serde(rename = "isStriked", default)]
    is_striked: bool,
}

/// Decode a `list/all` body.  Rows without an id cannot be removed and are
/// dropped.
pub fn parse_lists(body: &str) -> Result<Vec<RemoteList>> {
    let lists: Vec<WireList> = serde_json::from_str(body).context("decoding ICA lists")?;
    Ok(lists
        .into_iter()
        .map(|list| RemoteList {
            id: list.id.into_string(),
            rows: list
                .rows
                .into_iter()
                .filter_map(|row| {
                    Some(RemoteItem {
                        id: RowId::new(row.id?.into_string()),
                        text: row.text,
                        is_striked: row.is_striked,
                    })
                })
                .collect(),
        })
        .collect())
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lists_with_mixed_id_types() {
        let body = r#"[
            {"id": "weekly", "title": "Veckohandling", "rows": [
                {"id": 17, "text": "Mjölk", "isStriked": false},
                {"id": "18", "text": "Ägg", "isStriked": true},
                {"text": "no id"}
            ]},
            {"id": 2, "title": "Empty"}
        ]"#;

        let lists = parse_lists(body).unwrap();
        assert_eq!(lists.len(), 2);
        assert_eq!(lists[0].id, "weekly");
        assert_eq!(lists[0].rows.len(), 2);
        assert_eq!(lists[0].rows[0].id, RowId::new("17"));
        assert!(!lists[0].rows[0].is_striked);
        assert!(lists[0].rows[1].is_striked);
        assert_eq!(lists[1].id, "2");
        assert!(lists[1].rows.is_empty());
    }

    #[test]
    fn missing_striked_flag_means_active() {
        let lists = parse_lists(r#"[{"id": "l", "rows": [{"id": 1, "text": "milk"}]}]"#).unwrap();
        assert!(!lists[0].rows[0].is_striked);
    }

    #[test]
    fn garbage_body_is_an_error() {
        assert!(parse_lists("<html>maintenance</html>").is_err());
    }

    #[test]
    fn client_rejects_bad_configuration() {
        let timeout = Duration::from_secs(5);
        assert!(IcaClient::new("not a url", "token", timeout).is_err());
        assert!(IcaClient::new("ftp://example.com", "token", timeout).is_err());
        assert!(IcaClient::new("https://example.com/api", "  ", timeout).is_err());
    }

    #[test]
    fn endpoints_join_without_double_slashes() {
        let client = IcaClient::new("https://example.com/api/", "token", Duration::from_secs(5)).unwrap();
        assert_eq!(client.endpoint("list/all"), "https://example.com/api/list/all");
        assert_eq!(client.endpoint("/row/7"), "https://example.com/api/row/7");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("åäö", 2), "åä");
        assert_eq!(truncate("ok", 10), "ok");
    }
}
