//! Home Assistant REST client.
//!
//! Reaches the Keep list through the generic `todo.*` services and refreshes
//! the ICA sensor through `homeassistant.update_entity`.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use keepsync_engine::{LocalItem, LocalStore, SensorNotifier};

#[derive(Debug, Clone)]
pub struct HassClient {
    client: Client,
    base_url: String,
    token: String,
    /// Entity id template; `{list_id}` is substituted per refresh.
    sensor_template: Option<String>,
}

impl HassClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(base_url.trim())
            .with_context(|| format!("invalid Home Assistant url: {base_url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("Home Assistant url must be http(s), got {}", parsed.scheme());
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
            sensor_template: None,
        })
    }

    /// Refresh `template` (with `{list_id}` substituted) after sync batches.
    /// A blank template disables refreshes.
    pub fn with_sensor_template(mut self, template: &str) -> Self {
        let template = template.trim();
        self.sensor_template = (!template.is_empty()).then(|| template.to_string());
        self
    }

    pub fn sensor_entity(&self, list_id: &str) -> Option<String> {
        self.sensor_template
            .as_ref()
            .map(|template| template.replace("{list_id}", list_id))
    }

    async fn call_service(
        &self,
        domain: &str,
        service: &str,
        data: Value,
        return_response: bool,
    ) -> Result<Value> {
        let mut endpoint = format!("{}/api/services/{domain}/{service}", self.base_url);
        if return_response {
            endpoint.push_str("?return_response");
        }

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.token)
            .json(&data)
            .send()
            .await
            .with_context(|| format!("calling {domain}.{service}"))?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            bail!("{domain}.{service} failed ({status}): {}", body.trim());
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl LocalStore for HassClient {
    async fn get_items(&self, entity: &str) -> Result<Vec<LocalItem>> {
        let body = self
            .call_service("todo", "get_items", json!({ "entity_id": entity }), true)
            .await?;
        parse_items(body, entity)
    }

    async fn add_item(&self, entity: &str, text: &str) -> Result<()> {
        self.call_service(
            "todo",
            "add_item",
            json!({ "entity_id": entity, "item": text }),
            false,
        )
        .await?;
        Ok(())
    }

    async fn remove_item(&self, entity: &str, text: &str) -> Result<()> {
        self.call_service(
            "todo",
            "remove_item",
            json!({ "entity_id": entity, "item": text }),
            false,
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SensorNotifier for HassClient {
    async fn refresh_sensor(&self, list_id: &str) -> Result<()> {
        let Some(entity) = self.sensor_entity(list_id) else {
            debug!(list_id, "no sensor configured");
            return Ok(());
        };
        self.call_service(
            "homeassistant",
            "update_entity",
            json!({ "entity_id": entity }),
            false,
        )
        .await?;
        debug!(sensor = %entity, "sensor refresh requested");
        Ok(())
    }
}

// ── Response parsing ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ServiceResponse {
    service_response: HashMap<String, EntityItems>,
}

#[derive(Debug, Deserialize)]
struct EntityItems {
    #[serde(default)]
    items: Vec<LocalItem>,
}

/// Pull `entity`'s items out of a `get_items` service response.
pub fn parse_items(body: Value, entity: &str) -> Result<Vec<LocalItem>> {
    let mut response: ServiceResponse =
        serde_json::from_value(body).context("decoding todo.get_items response")?;
    match response.service_response.remove(entity) {
        Some(entry) => Ok(entry.items),
        None => bail!("todo.get_items returned nothing for {entity}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keepsync_engine::ItemStatus;

    #[test]
    fn parses_get_items_response() {
        let body = json!({
            "changed_states": [],
            "service_response": {
                "todo.shopping": {
                    "items": [
                        {"summary": "Milk", "uid": "a1", "status": "needs_action"},
                        {"summary": "Eggs", "uid": "b2", "status": "completed"}
                    ]
                }
            }
        });

        let items = parse_items(body, "todo.shopping").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].summary, "Milk");
        assert_eq!(items[0].status, ItemStatus::NeedsAction);
        assert!(items[1].is_completed());
    }

    #[test]
    fn missing_entity_is_an_error() {
        let body = json!({ "service_response": { "todo.other": { "items": [] } } });
        let err = parse_items(body, "todo.shopping").unwrap_err();
        assert!(err.to_string().contains("todo.shopping"));
    }

    #[test]
    fn sensor_template_substitutes_list_id() {
        let client = HassClient::new("http://localhost:8123", "token", Duration::from_secs(5))
            .unwrap()
            .with_sensor_template("sensor.ica_shopping_{list_id}");
        assert_eq!(
            client.sensor_entity("42").as_deref(),
            Some("sensor.ica_shopping_42")
        );
    }

    #[test]
    fn blank_template_disables_sensor() {
        let client = HassClient::new("http://localhost:8123", "token", Duration::from_secs(5))
            .unwrap()
            .with_sensor_template("  ");
        assert!(client.sensor_entity("42").is_none());
    }

    #[test]
    fn rejects_non_http_url() {
        assert!(HassClient::new("ws://localhost:8123", "t", Duration::from_secs(5)).is_err());
    }
}
