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

//! Key-value store abstraction and change notification

use crate::batch::WriteBatch;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

/// Buffered change events per subscriber before it starts lagging
const CHANGE_FEED_CAPACITY: usize = 64;

/// Notification published after every committed write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Store-wide revision, strictly increasing
    pub revision: u64,
    /// Keys touched by the write
    pub keys: Arc<[String]>,
}

impl ChangeEvent {
    pub fn touches(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }
}

/// Durable key-value layer used by the session core.
///
/// Writes to a single key are last-write-wins. Only [`KeyValueStore::apply`]
/// gives multi-key atomicity.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key; absent keys are `Ok(None)`
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store a value under a key
    async fn put(&self, key: &str, value: String) -> StoreResult<()>;

    /// Remove a key; removing an absent key is not an error
    async fn remove(&self, key: &str) -> StoreResult<()>;

    /// Commit every operation in the batch as one write
    async fn apply(&self, batch: WriteBatch) -> StoreResult<()>;

    /// Subscribe to change events for writes committed after this call
    fn subscribe(&self) -> StoreResult<broadcast::Receiver<ChangeEvent>>;

    /// Tear the store down: pending subscribers see their feed end and every
    /// later operation fails with [`StoreError::Closed`]
    fn close(&self);
}

/// Broadcast side of a store's change notification
#[derive(Debug)]
pub struct ChangeFeed {
    sender: Mutex<Option<broadcast::Sender<ChangeEvent>>>,
    revision: AtomicU64,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            sender: Mutex::new(Some(sender)),
            revision: AtomicU64::new(0),
        }
    }

    /// Fail fast when the feed has been closed
    pub fn ensure_open(&self) -> StoreResult<()> {
        if self.sender.lock().is_some() { Ok(()) } else { Err(StoreError::Closed) }
    }

    pub fn subscribe(&self) -> StoreResult<broadcast::Receiver<ChangeEvent>> {
        self.sender.lock().as_ref().map(broadcast::Sender::subscribe).ok_or(StoreError::Closed)
    }

    /// Publish a change for the given keys and return its revision
    pub fn publish(&self, keys: Vec<String>) -> u64 {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(sender) = self.sender.lock().as_ref() {
            let event = ChangeEvent { revision, keys: keys.into() };
            // No receivers is the common case outside of stream consumers
            if let Ok(receivers) = sender.send(event) {
                debug!("Published change revision {} to {} subscribers", revision, receivers);
            }
        }
        revision
    }

    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    /// Drop the sender so every receiver observes `RecvError::Closed`
    pub fn close(&self) {
        self.sender.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }
}
