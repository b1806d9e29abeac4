//! In-memory stores for tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;

use crate::model::{ItemStatus, LocalItem, RemoteItem, RemoteList, RowId};
use crate::store::{LocalStore, RemoteStore, SensorNotifier};

/// ICA stand-in holding any number of lists.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    lists: Mutex<Vec<RemoteList>>,
    next_id: AtomicU64,
    failing_texts: Mutex<HashSet<String>>,
    fail_fetch: AtomicBool,
    add_calls: AtomicUsize,
    remove_calls: AtomicUsize,
}

impl MemoryRemote {
    pub fn with_list(list_id: &str, texts: &[&str]) -> Self {
        let remote = Self::default();
        remote.add_list(list_id, texts);
        remote
    }

    pub fn add_list(&self, list_id: &str, texts: &[&str]) {
        let rows = texts.iter().map(|text| self.new_row(text)).collect();
        self.lists.lock().unwrap().push(RemoteList {
            id: list_id.to_string(),
            rows,
        });
    }

    fn new_row(&self, text: &str) -> RemoteItem {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        RemoteItem {
            id: RowId::new(format!("row-{id}")),
            text: text.to_string(),
            is_striked: false,
        }
    }

    /// Check a row off on the ICA side.
    pub fn strike(&self, text: &str) {
        for list in self.lists.lock().unwrap().iter_mut() {
            for row in list.rows.iter_mut().filter(|row| row.text == text) {
                row.is_striked = true;
            }
        }
    }

    pub fn texts(&self, list_id: &str) -> Vec<String> {
        self.lists
            .lock()
            .unwrap()
            .iter()
            .find(|list| list.id == list_id)
            .map(|list| list.rows.iter().map(|row| row.text.clone()).collect())
            .unwrap_or_default()
    }

    /// Make every add/remove touching `text` fail with a transport error.
    pub fn fail_on(&self, text: &str) {
        self.failing_texts.lock().unwrap().insert(text.to_string());
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn add_calls(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    pub fn mutation_calls(&self) -> usize {
        self.add_calls() + self.remove_calls()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn fetch_lists(&self) -> Result<Vec<RemoteList>> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            bail!("connection reset");
        }
        Ok(self.lists.lock().unwrap().clone())
    }

    async fn add_to_list(&self, list_id: &str, text: &str) -> Result<bool> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_texts.lock().unwrap().contains(text) {
            bail!("timed out adding {text}");
        }
        let row = self.new_row(text);
        let mut lists = self.lists.lock().unwrap();
        match lists.iter_mut().find(|list| list.id == list_id) {
            Some(list) => {
                list.rows.push(row);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_item(&self, row_id: &RowId) -> Result<bool> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        let mut lists = self.lists.lock().unwrap();
        for list in lists.iter_mut() {
            if let Some(pos) = list.rows.iter().position(|row| &row.id == row_id) {
                if self.failing_texts.lock().unwrap().contains(&list.rows[pos].text) {
                    bail!("timed out removing {row_id}");
                }
                list.rows.remove(pos);
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Keep stand-in for a single todo entity.
#[derive(Debug, Default)]
pub struct MemoryLocal {
    items: Mutex<Vec<LocalItem>>,
    fail_reads: AtomicBool,
    add_calls: AtomicUsize,
    remove_calls: AtomicUsize,
}

impl MemoryLocal {
    pub fn with_items(summaries: &[&str]) -> Self {
        let local = Self::default();
        for summary in summaries {
            local.push(LocalItem::new(*summary));
        }
        local
    }

    pub fn push(&self, item: LocalItem) {
        self.items.lock().unwrap().push(item);
    }

    /// Mark an item completed the way the Keep UI would.
    pub fn complete(&self, summary: &str) {
        for item in self.items.lock().unwrap().iter_mut() {
            if item.summary == summary {
                item.status = ItemStatus::Completed;
            }
        }
    }

    pub fn delete(&self, summary: &str) {
        self.items.lock().unwrap().retain(|item| item.summary != summary);
    }

    pub fn summaries(&self) -> Vec<String> {
        self.items
            .lock()
            .unwrap()
            .iter()
            .map(|item| item.summary.clone())
            .collect()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn add_calls(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    pub fn mutation_calls(&self) -> usize {
        self.add_calls() + self.remove_calls()
    }
}

#[async_trait]
impl LocalStore for MemoryLocal {
    async fn get_items(&self, _entity: &str) -> Result<Vec<LocalItem>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("todo/get_items unavailable");
        }
        Ok(self.items.lock().unwrap().clone())
    }

    async fn add_item(&self, _entity: &str, text: &str) -> Result<()> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        self.push(LocalItem::new(text));
        Ok(())
    }

    async fn remove_item(&self, _entity: &str, text: &str) -> Result<()> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        let mut items = self.items.lock().unwrap();
        match items.iter().position(|item| item.summary == text) {
            Some(pos) => {
                items.remove(pos);
                Ok(())
            }
            None => bail!("unable to find to-do list item: {text}"),
        }
    }
}

/// Counts sensor refreshes.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    refreshed: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.refreshed.lock().unwrap().len()
    }

    pub fn lists(&self) -> Vec<String> {
        self.refreshed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SensorNotifier for RecordingNotifier {
    async fn refresh_sensor(&self, list_id: &str) -> Result<()> {
        self.refreshed.lock().unwrap().push(list_id.to_string());
        Ok(())
    }
}
