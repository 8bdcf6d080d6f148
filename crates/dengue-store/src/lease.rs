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

//! Cross-process writer lease
//!
//! A lease is a sidecar `<file>.lock` created with `create_new`, so at most one
//! handle in any process holds it. The file is removed when the lease drops. A
//! lease file older than [`STALE_AFTER`] is left over from a crashed writer and
//! is broken.

use crate::error::{StoreError, StoreResult};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, warn};

/// How long [`WriterLease::acquire`] waits before giving up
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Age after which an unreleased lease file is considered abandoned
pub const STALE_AFTER: Duration = Duration::from_secs(30);

const RETRY_INTERVAL: Duration = Duration::from_millis(5);

/// Exclusive right to rewrite a store file, released on drop
#[derive(Debug)]
pub struct WriterLease {
    lock_path: PathBuf,
}

impl WriterLease {
    /// Lock path guarding `path`
    pub fn lock_path_for(path: &Path) -> PathBuf {
        let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".lock");
        path.with_file_name(name)
    }

    /// Wait until the lease for `path` is free and take it
    pub async fn acquire(path: &Path, timeout: Duration) -> StoreResult<Self> {
        let lock_path = Self::lock_path_for(path);
        let started = Instant::now();

        loop {
            match std::fs::OpenOptions::new().write(true).create_new(true).open(&lock_path) {
                Ok(mut file) => {
                    // Holder pid, informational only
                    let _ = writeln!(file, "{}", std::process::id());
                    debug!("Acquired writer lease {}", lock_path.display());
                    return Ok(Self { lock_path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&lock_path) {
                        warn!("Breaking stale writer lease {}", lock_path.display());
                        let _ = std::fs::remove_file(&lock_path);
                        continue;
                    }
                    if started.elapsed() >= timeout {
                        return Err(StoreError::Locked {
                            message: format!("timed out waiting for {}", lock_path.display()),
                        });
                    }
                    tokio::time::sleep(RETRY_INTERVAL).await;
                }
                Err(e) => return Err(StoreError::Io(e)),
            }
        }
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for WriterLease {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.lock_path);
    }
}

fn is_stale(lock_path: &Path) -> bool {
    std::fs::metadata(lock_path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_AFTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lease_is_exclusive_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let held = WriterLease::acquire(&path, DEFAULT_TIMEOUT).await.unwrap();
        assert!(held.lock_path().exists());

        let contended = WriterLease::acquire(&path, Duration::from_millis(50)).await;
        assert!(matches!(contended, Err(StoreError::Locked { .. })));

        drop(held);
        assert!(!WriterLease::lock_path_for(&path).exists());
        WriterLease::acquire(&path, Duration::from_millis(50)).await.unwrap();
    }

    #[tokio::test]
    async fn test_stale_lease_is_broken() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let lock_path = WriterLease::lock_path_for(&path);
        let abandoned = std::fs::File::create(&lock_path).unwrap();
        abandoned.set_modified(SystemTime::now() - STALE_AFTER * 2).unwrap();
        drop(abandoned);

        let lease = WriterLease::acquire(&path, Duration::from_millis(50)).await.unwrap();
        assert_eq!(lease.lock_path(), lock_path);
    }
}
