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

//! Encryption at rest for any key-value backend
//!
//! Values are sealed with ChaCha20-Poly1305 under a device-local master key.
//! Each write uses a fresh random nonce and binds the key name as associated
//! data, so a ciphertext copied under another key fails to open.

use crate::batch::{BatchOp, WriteBatch};
use crate::error::{StoreError, StoreResult};
use crate::kv::{ChangeEvent, KeyValueStore};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use ring::aead::{Aad, CHACHA20_POLY1305, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use std::fmt;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Length of the master key in bytes
pub const MASTER_KEY_LEN: usize = 32;

/// Symmetric key protecting the encrypted store
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; MASTER_KEY_LEN],
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKey").finish_non_exhaustive()
    }
}

impl MasterKey {
    /// Generate a key from the system CSPRNG
    pub fn generate() -> StoreResult<Self> {
        let mut bytes = [0u8; MASTER_KEY_LEN];
        SystemRandom::new().fill(&mut bytes).map_err(|_| StoreError::Crypto {
            message: "Failed to generate master key".to_string(),
        })?;
        Ok(Self { bytes })
    }

    pub fn from_bytes(bytes: [u8; MASTER_KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Load the key file at `path`, creating it with a fresh key on first use.
    ///
    /// A new key is written to an owner-only temp file and linked into place
    /// without replacing anything. When another process creates the file
    /// first, its key is loaded instead.
    pub async fn load_or_create<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(encoded) => Self::decode(encoded.trim()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let key = Self::generate()?;
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }

                let target = path.to_path_buf();
                let encoded = STANDARD.encode(key.bytes);
                let created = tokio::task::spawn_blocking(move || publish_new_key(&target, encoded.as_bytes()))
                    .await
                    .map_err(|e| StoreError::Io(std::io::Error::other(e)))??;

                if created {
                    info!("Created new master key at {}", path.display());
                    Ok(key)
                } else {
                    info!("Master key at {} was created concurrently, loading it", path.display());
                    let encoded = tokio::fs::read_to_string(path).await?;
                    Self::decode(encoded.trim())
                }
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn decode(encoded: &str) -> StoreResult<Self> {
        let raw = STANDARD.decode(encoded).map_err(|e| StoreError::Crypto {
            message: format!("Master key is not valid base64: {}", e),
        })?;
        let bytes: [u8; MASTER_KEY_LEN] = raw.try_into().map_err(|raw: Vec<u8>| StoreError::Crypto {
            message: format!("Master key must be {} bytes, found {}", MASTER_KEY_LEN, raw.len()),
        })?;
        Ok(Self { bytes })
    }

    fn aead_key(&self) -> StoreResult<LessSafeKey> {
        let unbound = UnboundKey::new(&CHACHA20_POLY1305, &self.bytes).map_err(|_| StoreError::Crypto {
            message: "Invalid master key".to_string(),
        })?;
        Ok(LessSafeKey::new(unbound))
    }
}

/// Returns `false` without touching `path` when it already exists
fn publish_new_key(path: &Path, data: &[u8]) -> StoreResult<bool> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    restrict_permissions(temp.path())?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;

    match temp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(StoreError::Io(e.error)),
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> StoreResult<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> StoreResult<()> {
    Ok(())
}

/// Store wrapper that seals every value before handing it to `S`
pub struct EncryptedStore<S> {
    inner: S,
    key: LessSafeKey,
    rng: SystemRandom,
}

impl<S> fmt::Debug for EncryptedStore<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedStore").finish_non_exhaustive()
    }
}

impl<S: KeyValueStore> EncryptedStore<S> {
    pub fn new(inner: S, master_key: &MasterKey) -> StoreResult<Self> {
        Ok(Self {
            inner,
            key: master_key.aead_key()?,
            rng: SystemRandom::new(),
        })
    }

    /// The wrapped backend, holding ciphertext only
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn seal(&self, key: &str, plaintext: &str) -> StoreResult<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce_bytes).map_err(|_| StoreError::Crypto {
            message: "Failed to generate nonce".to_string(),
        })?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce_bytes), Aad::from(key.as_bytes()), &mut in_out)
            .map_err(|_| StoreError::Crypto {
                message: format!("Failed to seal value for key '{}'", key),
            })?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&in_out);
        Ok(STANDARD.encode(sealed))
    }

    fn open(&self, key: &str, encoded: &str) -> StoreResult<String> {
        let sealed = STANDARD.decode(encoded).map_err(|e| StoreError::Crypto {
            message: format!("Value for key '{}' is not valid base64: {}", key, e),
        })?;
        if sealed.len() < NONCE_LEN {
            return Err(StoreError::Crypto {
                message: format!("Value for key '{}' is truncated", key),
            });
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| StoreError::Crypto {
            message: format!("Value for key '{}' has an invalid nonce", key),
        })?;

        let mut buffer = ciphertext.to_vec();
        let plaintext = self.key.open_in_place(nonce, Aad::from(key.as_bytes()), &mut buffer).map_err(|_| {
            warn!("Authentication failed while opening key '{}'", key);
            StoreError::Crypto {
                message: format!("Value for key '{}' failed authentication", key),
            }
        })?;

        String::from_utf8(plaintext.to_vec()).map_err(|e| StoreError::Crypto {
            message: format!("Value for key '{}' is not UTF-8: {}", key, e),
        })
    }
}

#[async_trait]
impl<S: KeyValueStore> KeyValueStore for EncryptedStore<S> {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        match self.inner.get(key).await? {
            Some(sealed) => self.open(key, &sealed).map(Some),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: String) -> StoreResult<()> {
        let sealed = self.seal(key, &value)?;
        self.inner.put(key, sealed).await
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.inner.remove(key).await
    }

    async fn apply(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut sealed = WriteBatch::new();
        for op in batch.into_ops() {
            sealed = match op {
                BatchOp::Put { key, value } => {
                    let value = self.seal(&key, &value)?;
                    sealed.put(key, value)
                }
                BatchOp::Remove { key } => sealed.remove(key),
            };
        }
        self.inner.apply(sealed).await
    }

    fn subscribe(&self) -> StoreResult<broadcast::Receiver<ChangeEvent>> {
        self.inner.subscribe()
    }

    fn close(&self) {
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn store() -> EncryptedStore<MemoryStore> {
        EncryptedStore::new(MemoryStore::new(), &MasterKey::generate().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_hides_plaintext() {
        let store = store();

        store.put("access_token", "secret-token".to_string()).await.unwrap();

        assert_eq!(store.get("access_token").await.unwrap(), Some("secret-token".to_string()));
        let raw = store.inner().snapshot();
        let stored = raw.get("access_token").unwrap();
        assert!(!stored.contains("secret-token"));
    }

    #[tokio::test]
    async fn test_same_value_gets_fresh_nonce() {
        let store = store();

        store.put("a", "same".to_string()).await.unwrap();
        let first = store.inner().snapshot().remove("a").unwrap();
        store.put("a", "same".to_string()).await.unwrap();
        let second = store.inner().snapshot().remove("a").unwrap();

        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_value_moved_to_other_key_fails() {
        let store = store();
        store.put("access_token", "tok".to_string()).await.unwrap();
        let sealed = store.inner().snapshot().remove("access_token").unwrap();

        store.inner().put("refresh_token", sealed).await.unwrap();

        assert!(matches!(store.get("refresh_token").await, Err(StoreError::Crypto { .. })));
    }

    #[tokio::test]
    async fn test_wrong_key_cannot_open() {
        let inner = MemoryStore::new();
        let writer = EncryptedStore::new(inner, &MasterKey::generate().unwrap()).unwrap();
        writer.put("k", "v".to_string()).await.unwrap();
        let sealed = writer.inner().snapshot().remove("k").unwrap();

        let other = store();
        other.inner().put("k", sealed).await.unwrap();

        assert!(other.get("k").await.is_err());
    }

    #[tokio::test]
    async fn test_master_key_file_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys/master.key");

        let first = MasterKey::load_or_create(&path).await.unwrap();
        let second = MasterKey::load_or_create(&path).await.unwrap();
        assert_eq!(first.bytes, second.bytes);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_first_runs_agree_on_one_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.key");

        let (a, b, c) = tokio::join!(
            MasterKey::load_or_create(&path),
            MasterKey::load_or_create(&path),
            MasterKey::load_or_create(&path),
        );
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert_eq!(a.bytes, b.bytes);
        assert_eq!(b.bytes, c.bytes);

        let reloaded = MasterKey::load_or_create(&path).await.unwrap();
        assert_eq!(reloaded.bytes, a.bytes);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_short_key_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master.key");
        std::fs::write(&path, STANDARD.encode([1u8; 8])).unwrap();

        assert!(matches!(MasterKey::load_or_create(&path).await, Err(StoreError::Crypto { .. })));
    }
}
