// Dengue Track
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! In-memory key-value backend

use crate::batch::WriteBatch;
use crate::error::StoreResult;
use crate::kv::{ChangeEvent, ChangeFeed, KeyValueStore};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tokio::sync::broadcast;

/// Volatile store backed by an ordered map
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
    feed: ChangeFeed,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Raw copy of the stored entries
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.read().clone()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.feed.ensure_open()?;
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> StoreResult<()> {
        self.apply(WriteBatch::new().put(key, value)).await
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.apply(WriteBatch::new().remove(key)).await
    }

    async fn apply(&self, batch: WriteBatch) -> StoreResult<()> {
        self.feed.ensure_open()?;
        if batch.is_empty() {
            return Ok(());
        }

        {
            let mut entries = self.entries.write();
            batch.apply_to(&mut entries);
        }

        self.feed.publish(batch.keys());
        Ok(())
    }

    fn subscribe(&self) -> StoreResult<broadcast::Receiver<ChangeEvent>> {
        self.feed.subscribe()
    }

    fn close(&self) {
        self.feed.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[tokio::test]
    async fn test_put_get_remove() {
        let store = MemoryStore::new();

        assert_eq!(store.get("k").await.unwrap(), None);
        store.put("k", "v".to_string()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));

        store.remove("k").await.unwrap();
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_batch_publishes_one_event() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe().unwrap();

        store.apply(WriteBatch::new().put("a", "1").put("b", "2")).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert!(event.touches("a") && event.touches("b"));
        assert!(rx.try_recv().is_err());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_closed_store_rejects_operations() {
        let store = MemoryStore::new();
        store.close();

        assert!(matches!(store.get("k").await, Err(StoreError::Closed)));
        assert!(matches!(store.put("k", "v".to_string()).await, Err(StoreError::Closed)));
    }
}
