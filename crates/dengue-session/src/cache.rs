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

//! Persisted permission cache
//!
//! Holds the signed-in actor's user id, role id, role name and permission set
//! in the durable store. Nothing is kept in memory: every read goes to the
//! store and every write is a store write, so the store stays the single
//! source of truth across restarts and across handles.

use crate::error::{SessionError, SessionResult};
use crate::permissions::{PermissionCode, PermissionSet};
use dengue_store::{ChangeEvent, KeyValueStore, StoreResult, WriteBatch};
use futures::stream::{self, Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const USER_ID_KEY: &str = "permission_cache.user_id";
const ROLE_ID_KEY: &str = "permission_cache.role_id";
const ROLE_NAME_KEY: &str = "permission_cache.role_name";
const PERMISSIONS_KEY: &str = "permission_cache.permissions";

/// Durable cache of the actor's resolved permissions
#[derive(Clone)]
pub struct PermissionCache {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for PermissionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionCache").finish_non_exhaustive()
    }
}

impl PermissionCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Overwrite all four fields in a single store write
    pub async fn save(&self, user_id: i64, role_id: i64, role_name: &str, permissions: &PermissionSet) -> SessionResult<()> {
        let encoded = serde_json::to_string(permissions).map_err(|e| SessionError::InvalidData {
            message: format!("Failed to encode permission set: {}", e),
        })?;

        let batch = WriteBatch::new()
            .put(USER_ID_KEY, user_id.to_string())
            .put(ROLE_ID_KEY, role_id.to_string())
            .put(ROLE_NAME_KEY, role_name)
            .put(PERMISSIONS_KEY, encoded);
        self.store.apply(batch).await?;

        info!("Cached {} permissions for user {} (role {} {})", permissions.len(), user_id, role_id, role_name);
        Ok(())
    }

    /// Remove all four fields; reads afterwards behave as signed out
    pub async fn clear(&self) -> SessionResult<()> {
        let batch = WriteBatch::new().remove(USER_ID_KEY).remove(ROLE_ID_KEY).remove(ROLE_NAME_KEY).remove(PERMISSIONS_KEY);
        self.store.apply(batch).await?;
        debug!("Permission cache cleared");
        Ok(())
    }

    pub async fn permissions(&self) -> SessionResult<PermissionSet> {
        Ok(load_permissions(self.store.as_ref()).await?)
    }

    pub async fn user_id(&self) -> SessionResult<Option<i64>> {
        self.read_id(USER_ID_KEY).await
    }

    pub async fn role_id(&self) -> SessionResult<Option<i64>> {
        self.read_id(ROLE_ID_KEY).await
    }

    pub async fn role_name(&self) -> SessionResult<Option<String>> {
        Ok(self.store.get(ROLE_NAME_KEY).await?)
    }

    pub async fn has_permission(&self, code: PermissionCode) -> SessionResult<bool> {
        Ok(self.permissions().await?.contains(code))
    }

    /// True when any of `codes` is granted; vacuously true for an empty slice
    pub async fn has_any_permission(&self, codes: &[PermissionCode]) -> SessionResult<bool> {
        if codes.is_empty() {
            return Ok(true);
        }
        Ok(self.permissions().await?.has_any(codes))
    }

    /// True when all of `codes` are granted; vacuously true for an empty slice
    pub async fn has_all_permissions(&self, codes: &[PermissionCode]) -> SessionResult<bool> {
        if codes.is_empty() {
            return Ok(true);
        }
        Ok(self.permissions().await?.has_all(codes))
    }

    /// Lazy stream of permission snapshots.
    ///
    /// Nothing happens until the first poll. The stream then yields the
    /// current set, and again after every `save` or `clear`. It ends when the
    /// underlying store is closed; dropping it cancels everything. Each call
    /// returns an independent stream.
    pub fn permissions_stream(&self) -> impl Stream<Item = PermissionSet> + Send + 'static {
        let store = self.store.clone();
        stream::unfold(StreamState::Pending(store), |state| async move {
            match state {
                StreamState::Pending(store) => {
                    // Subscribe before the first read so no write can slip between them
                    let changes = match store.subscribe() {
                        Ok(changes) => changes,
                        Err(e) => {
                            debug!("Permission stream not started: {}", e);
                            return None;
                        }
                    };
                    let snapshot = snapshot_or_empty(store.as_ref()).await;
                    Some((snapshot, StreamState::Listening { store, changes }))
                }
                StreamState::Listening { store, mut changes } => loop {
                    match changes.recv().await {
                        Ok(event) if event.touches(PERMISSIONS_KEY) => {
                            let snapshot = snapshot_or_empty(store.as_ref()).await;
                            return Some((snapshot, StreamState::Listening { store, changes }));
                        }
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!("Permission stream lagged by {} changes, re-reading", skipped);
                            let snapshot = snapshot_or_empty(store.as_ref()).await;
                            return Some((snapshot, StreamState::Listening { store, changes }));
                        }
                        Err(RecvError::Closed) => {
                            debug!("Permission stream ended: store closed");
                            return None;
                        }
                    }
                },
            }
        })
    }

    /// Drive [`PermissionCache::permissions_stream`] on a spawned task and
    /// hand every snapshot to `on_change`.
    ///
    /// Must be called from within a Tokio runtime. The callback runs on the
    /// runtime; blocking inside it delays later snapshots.
    pub fn subscribe<F>(&self, mut on_change: F) -> PermissionSubscription
    where
        F: FnMut(PermissionSet) + Send + 'static,
    {
        let stream = self.permissions_stream();
        let handle = tokio::spawn(async move {
            let mut stream = std::pin::pin!(stream);
            while let Some(snapshot) = stream.next().await {
                on_change(snapshot);
            }
        });
        PermissionSubscription { handle }
    }

    async fn read_id(&self, key: &str) -> SessionResult<Option<i64>> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        match raw.parse::<i64>() {
            Ok(id) => Ok(Some(id)),
            Err(e) => {
                warn!("Ignoring malformed value under {}: {}", key, e);
                Ok(None)
            }
        }
    }
}

enum StreamState {
    Pending(Arc<dyn KeyValueStore>),
    Listening {
        store: Arc<dyn KeyValueStore>,
        changes: broadcast::Receiver<ChangeEvent>,
    },
}

/// Handle for a callback registered with [`PermissionCache::subscribe`].
///
/// Dropping the handle cancels the subscription as well.
#[derive(Debug)]
pub struct PermissionSubscription {
    handle: JoinHandle<()>,
}

impl PermissionSubscription {
    /// Stop delivering snapshots; no work continues afterwards
    pub fn unsubscribe(self) {
        self.handle.abort();
    }

    /// False once the store has been closed or the subscription cancelled
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for PermissionSubscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Read the persisted set. Corrupt or unknown entries degrade to fewer
/// permissions, never to an error.
async fn load_permissions(store: &dyn KeyValueStore) -> StoreResult<PermissionSet> {
    let Some(raw) = store.get(PERMISSIONS_KEY).await? else {
        return Ok(PermissionSet::new());
    };

    let codes: Vec<String> = match serde_json::from_str(&raw) {
        Ok(codes) => codes,
        Err(e) => {
            warn!("Persisted permission list is malformed, treating as empty: {}", e);
            return Ok(PermissionSet::new());
        }
    };

    let (set, unknown) = PermissionSet::parse_lenient(codes);
    if !unknown.is_empty() {
        warn!("Dropping unknown persisted permission codes: {:?}", unknown);
    }
    Ok(set)
}

async fn snapshot_or_empty(store: &dyn KeyValueStore) -> PermissionSet {
    load_permissions(store).await.unwrap_or_else(|e| {
        warn!("Permission snapshot read failed, emitting empty set: {}", e);
        PermissionSet::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::PermissionCode::*;
    use dengue_store::MemoryStore;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn cache() -> (PermissionCache, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (PermissionCache::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_save_then_read_back() {
        let (cache, _) = cache();
        let codes = PermissionSet::from([CaseViewAll, UserViewAll]);

        cache.save(42, 3, "ADMIN", &codes).await.unwrap();

        assert_eq!(cache.permissions().await.unwrap(), codes);
        assert_eq!(cache.user_id().await.unwrap(), Some(42));
        assert_eq!(cache.role_id().await.unwrap(), Some(3));
        assert_eq!(cache.role_name().await.unwrap(), Some("ADMIN".to_string()));
    }

    #[tokio::test]
    async fn test_save_is_one_write() {
        let (cache, store) = cache();
        let mut changes = store.subscribe().unwrap();

        cache.save(1, 1, "CITIZEN", &PermissionSet::from([MapView])).await.unwrap();

        let event = changes.recv().await.unwrap();
        for key in [USER_ID_KEY, ROLE_ID_KEY, ROLE_NAME_KEY, PERMISSIONS_KEY] {
            assert!(event.touches(key));
        }
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_membership_queries() {
        let (cache, _) = cache();
        cache.save(42, 3, "ADMIN", &PermissionSet::from([CaseViewAll, UserViewAll])).await.unwrap();

        assert!(cache.has_permission(CaseViewAll).await.unwrap());
        assert!(!cache.has_permission(HospitalView).await.unwrap());
        assert!(cache.has_all_permissions(&[CaseViewAll]).await.unwrap());
        assert!(!cache.has_all_permissions(&[CaseViewAll, HospitalView]).await.unwrap());
        assert!(cache.has_any_permission(&[HospitalView, UserViewAll]).await.unwrap());
        assert!(!cache.has_any_permission(&[HospitalView]).await.unwrap());
        assert!(cache.has_any_permission(&[]).await.unwrap());
        assert!(cache.has_all_permissions(&[]).await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_twice_equals_clear_once() {
        let (cache, store) = cache();
        cache.save(42, 3, "ADMIN", &PermissionSet::from([CaseViewAll])).await.unwrap();

        cache.clear().await.unwrap();
        let after_one = store.snapshot();
        cache.clear().await.unwrap();

        assert_eq!(store.snapshot(), after_one);
        assert!(after_one.is_empty());
        assert!(cache.permissions().await.unwrap().is_empty());
        assert_eq!(cache.user_id().await.unwrap(), None);
        assert_eq!(cache.role_name().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_malformed_list_reads_as_empty() {
        let (cache, store) = cache();
        store.put(PERMISSIONS_KEY, "[\"CASE_VIEW_ALL\",".to_string()).await.unwrap();

        assert!(cache.permissions().await.unwrap().is_empty());
        assert!(!cache.has_permission(CaseViewAll).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_persisted_codes_are_dropped() {
        let (cache, store) = cache();
        store.put(PERMISSIONS_KEY, r#"["MAP_VIEW","RETIRED_CODE"]"#.to_string()).await.unwrap();

        assert_eq!(cache.permissions().await.unwrap(), PermissionSet::from([MapView]));
    }

    #[tokio::test]
    async fn test_malformed_id_reads_as_absent() {
        let (cache, store) = cache();
        store.put(USER_ID_KEY, "forty-two".to_string()).await.unwrap();

        assert_eq!(cache.user_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_stream_emits_current_then_changes() {
        let (cache, store) = cache();
        cache.save(7, 2, "HEALTH_WORKER", &PermissionSet::from([CaseCreate])).await.unwrap();

        let mut stream = Box::pin(cache.permissions_stream());
        assert_eq!(stream.next().await, Some(PermissionSet::from([CaseCreate])));

        // Unrelated writes do not produce snapshots
        store.put("unrelated", "x".to_string()).await.unwrap();
        cache.save(7, 2, "HEALTH_WORKER", &PermissionSet::from([CaseCreate, MapView])).await.unwrap();
        assert_eq!(stream.next().await, Some(PermissionSet::from([CaseCreate, MapView])));

        cache.clear().await.unwrap();
        assert_eq!(stream.next().await, Some(PermissionSet::new()));

        store.close();
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_stream_is_restartable() {
        let (cache, _) = cache();
        cache.save(1, 1, "CITIZEN", &PermissionSet::from([PublicationView])).await.unwrap();

        let first: Vec<_> = cache.permissions_stream().take(1).collect().await;
        let second: Vec<_> = cache.permissions_stream().take(1).collect().await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_subscription_delivers_until_unsubscribed() {
        let (cache, _) = cache();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = cache.subscribe(move |set| {
            let _ = tx.send(set);
        });

        assert_eq!(rx.recv().await, Some(PermissionSet::new()));
        cache.save(1, 1, "CITIZEN", &PermissionSet::from([MapView])).await.unwrap();
        assert_eq!(rx.recv().await, Some(PermissionSet::from([MapView])));

        subscription.unsubscribe();
        // The sender lives inside the aborted task, so the channel closes
        assert_eq!(timeout(Duration::from_secs(1), rx.recv()).await.unwrap(), None);
    }
}
