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

//! File-backed key-value backend
//!
//! The whole store is a single JSON document. Reads always go to disk, so the
//! file stays the single source of truth across handles and restarts. A write
//! holds the [`WriterLease`] for the file across its whole load-modify-persist
//! cycle, so writers in other handles and processes never overwrite each
//! other's keys. The new document lands through a uniquely named temp file
//! that is renamed over the original, so a crash mid-write leaves the previous
//! version intact.

use crate::batch::WriteBatch;
use crate::error::{StoreError, StoreResult};
use crate::kv::{ChangeEvent, ChangeFeed, KeyValueStore};
use crate::lease::{DEFAULT_TIMEOUT, WriterLease};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info};

const FORMAT_VERSION: u32 = 1;

/// On-disk layout of the store file
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    entries: BTreeMap<String, String>,
}

/// Durable store persisted to a single JSON file
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
    feed: ChangeFeed,
}

impl FileStore {
    /// Open (or lazily create) a store at `path`.
    ///
    /// The parent directory is created if needed and an existing file is
    /// parsed once so corruption is reported at open time.
    pub async fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let store = Self {
            path,
            write_lock: Mutex::new(()),
            feed: ChangeFeed::new(),
        };
        let entries = store.load().await?;
        info!("Opened file store at {} with {} keys", store.path.display(), entries.len());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> StoreResult<BTreeMap<String, String>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(StoreError::Io(e)),
        };

        let file: StoreFile = serde_json::from_slice(&raw).map_err(|e| StoreError::Corrupt {
            message: format!("{}: {}", self.path.display(), e),
        })?;

        if file.version != FORMAT_VERSION {
            return Err(StoreError::Corrupt {
                message: format!("{}: unsupported format version {}", self.path.display(), file.version),
            });
        }

        Ok(file.entries)
    }

    async fn persist(&self, entries: BTreeMap<String, String>) -> StoreResult<()> {
        let data = serde_json::to_vec_pretty(&StoreFile {
            version: FORMAT_VERSION,
            entries,
        })?;

        let path = self.path.clone();
        let len = data.len();
        tokio::task::spawn_blocking(move || write_replacing(&path, &data))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))??;

        debug!("Persisted {} bytes to {}", len, self.path.display());
        Ok(())
    }
}

fn write_replacing(path: &Path, data: &[u8]) -> StoreResult<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.feed.ensure_open()?;
        let mut entries = self.load().await?;
        Ok(entries.remove(key))
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

        let _guard = self.write_lock.lock().await;
        let _lease = WriterLease::acquire(&self.path, DEFAULT_TIMEOUT).await?;
        let mut entries = self.load().await?;
        batch.apply_to(&mut entries);
        self.persist(entries).await?;

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

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("nested/session.json")).await.unwrap();

        assert_eq!(store.get("anything").await.unwrap(), None);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        {
            let store = FileStore::open(&path).await.unwrap();
            store.apply(WriteBatch::new().put("a", "1").put("b", "2")).await.unwrap();
            store.remove("a").await.unwrap();
        }

        let reopened = FileStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("a").await.unwrap(), None);
        assert_eq!(reopened.get("b").await.unwrap(), Some("2".to_string()));
        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("session.json")]);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, b"{ not json").unwrap();

        assert!(matches!(FileStore::open(&path).await, Err(StoreError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn test_two_handles_share_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let writer = FileStore::open(&path).await.unwrap();
        let reader = FileStore::open(&path).await.unwrap();

        writer.put("token", "abc".to_string()).await.unwrap();

        assert_eq!(reader.get("token").await.unwrap(), Some("abc".to_string()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_handles_keep_every_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let first = std::sync::Arc::new(FileStore::open(&path).await.unwrap());
        let second = std::sync::Arc::new(FileStore::open(&path).await.unwrap());

        let mut tasks = Vec::new();
        for i in 0..25 {
            for (name, store) in [("first", first.clone()), ("second", second.clone())] {
                tasks.push(tokio::spawn(async move { store.put(&format!("{}.{}", name, i), i.to_string()).await }));
            }
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let reopened = FileStore::open(&path).await.unwrap();
        for i in 0..25 {
            assert_eq!(reopened.get(&format!("first.{}", i)).await.unwrap(), Some(i.to_string()));
            assert_eq!(reopened.get(&format!("second.{}", i)).await.unwrap(), Some(i.to_string()));
        }
        assert!(!WriterLease::lock_path_for(&path).exists());
    }
}
