//! Generated-item history and the store it is persisted to.
//!
//! The store is remote in production; the engine only sees `HistoryStore`.
//! `BestEffortStore` wraps any backend so a failing store never interrupts
//! an editing session.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::generation::ToolMode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Data,
}

/// One result shown in the user's gallery.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedItem {
    pub id: String,
    pub url: String,
    pub media_type: MediaType,
    #[serde(rename = "type")]
    pub tool_mode: ToolMode,
    pub description: String,
    pub timestamp: u64,
}

impl GeneratedItem {
    pub fn new(url: impl Into<String>, media_type: MediaType, tool_mode: ToolMode, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            url: url.into(),
            media_type,
            tool_mode,
            description: description.into(),
            timestamp: crate::export::now_epoch_ms() as u64,
        }
    }

    /// Inline `data:` payloads are too large to persist remotely.
    pub fn is_inline(&self) -> bool {
        crate::io::is_data_url(&self.url)
    }
}

#[allow(async_fn_in_trait)]
pub trait HistoryStore {
    /// Items for `user`, newest first.
    async fn list(&self, user: &str) -> Result<Vec<GeneratedItem>, StoreError>;
    async fn insert(&self, user: &str, item: &GeneratedItem) -> Result<(), StoreError>;
    async fn delete(&self, user: &str, id: &str) -> Result<(), StoreError>;
}

/// In-process store keyed by user.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<String, Vec<GeneratedItem>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryStore {
    async fn list(&self, user: &str) -> Result<Vec<GeneratedItem>, StoreError> {
        let mut items = self.items.read().get(user).cloned().unwrap_or_default();
        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(items)
    }

    async fn insert(&self, user: &str, item: &GeneratedItem) -> Result<(), StoreError> {
        let mut map = self.items.write();
        let list = map.entry(user.to_string()).or_default();
        if list.iter().any(|i| i.id == item.id) {
            return Err(StoreError(format!("duplicate item id {}", item.id)));
        }
        list.push(item.clone());
        Ok(())
    }

    async fn delete(&self, user: &str, id: &str) -> Result<(), StoreError> {
        let mut map = self.items.write();
        let Some(list) = map.get_mut(user) else {
            return Err(StoreError(format!("no items for user {}", user)));
        };
        let before = list.len();
        list.retain(|i| i.id != id);
        if list.len() == before {
            return Err(StoreError(format!("item {} not found", id)));
        }
        Ok(())
    }
}

/// Logs and swallows every backend failure.
#[derive(Debug, Default)]
pub struct BestEffortStore<S> {
    inner: S,
}

impl<S: HistoryStore> BestEffortStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Empty on failure.
    pub async fn list(&self, user: &str) -> Vec<GeneratedItem> {
        match self.inner.list(user).await {
            Ok(items) => items,
            Err(e) => {
                log::warn!("could not load history for {}: {}", user, e);
                Vec::new()
            }
        }
    }

    /// Returns whether the item reached the store. Inline items are never sent.
    pub async fn insert(&self, user: &str, item: &GeneratedItem) -> bool {
        if item.is_inline() {
            log::debug!("item {} is inline; kept locally only", item.id);
            return false;
        }
        match self.inner.insert(user, item).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("could not save item {}: {}", item.id, e);
                false
            }
        }
    }

    pub async fn delete(&self, user: &str, id: &str) -> bool {
        match self.inner.delete(user, id).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("could not delete item {}: {}", id, e);
                false
            }
        }
    }
}
