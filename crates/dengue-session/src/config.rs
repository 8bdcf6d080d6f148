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

//! Configuration and construction of the session context

use crate::cache::PermissionCache;
use crate::credentials::CredentialStore;
use crate::error::SessionResult;
use crate::evaluator::AccessEvaluator;
use crate::policy::PermissionPolicy;
use crate::preferences::SessionPreferences;
use crate::session::SessionManager;
use dengue_store::{EncryptedStore, FileStore, KeyValueStore, MasterKey, MemoryStore};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Where and how the session core stores its data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory holding the store files and the master key
    pub data_dir: PathBuf,

    /// Plain store for preferences and the permission cache
    pub session_file: String,

    /// Encrypted store for credentials
    pub credentials_file: String,

    /// Master key protecting the credentials file
    pub key_file: String,

    /// Keep everything in memory; nothing survives the process
    pub in_memory: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            session_file: "session.json".to_string(),
            credentials_file: "credentials.json".to_string(),
            key_file: "master.key".to_string(),
            in_memory: false,
        }
    }
}

/// Parse a boolean switch as written in an environment variable
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Read the switch `name`, treating unset or unparsable values as off
pub fn env_flag(name: &str) -> bool {
    let Ok(value) = env::var(name) else {
        return false;
    };
    parse_flag(&value).unwrap_or_else(|| {
        warn!("Ignoring {}={:?}: expected one of 1/0, true/false, yes/no, on/off", name, value);
        false
    })
}

impl SessionConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: env::var("DENGUE_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),

            session_file: env::var("DENGUE_SESSION_FILE").unwrap_or(defaults.session_file),

            credentials_file: env::var("DENGUE_CREDENTIALS_FILE").unwrap_or(defaults.credentials_file),

            key_file: env::var("DENGUE_KEY_FILE").unwrap_or(defaults.key_file),

            in_memory: env_flag("DENGUE_IN_MEMORY"),
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join(&self.session_file)
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join(&self.credentials_file)
    }

    pub fn key_path(&self) -> PathBuf {
        self.data_dir.join(&self.key_file)
    }
}

/// Explicitly constructed owner of every session component.
///
/// Build one per application session and pass it (or its parts) to whoever
/// needs them. Closing it ends all permission streams.
#[derive(Clone)]
pub struct SessionContext {
    plain: Arc<dyn KeyValueStore>,
    secure: Arc<dyn KeyValueStore>,
    manager: SessionManager,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext").field("manager", &self.manager).finish_non_exhaustive()
    }
}

impl SessionContext {
    /// Open the stores described by `config`
    pub async fn open(config: &SessionConfig) -> SessionResult<Self> {
        if config.in_memory {
            return Self::in_memory();
        }

        let plain = FileStore::open(config.session_path()).await?;
        let key = MasterKey::load_or_create(config.key_path()).await?;
        let secure = EncryptedStore::new(FileStore::open(config.credentials_path()).await?, &key)?;

        info!("Session context opened in {}", config.data_dir.display());
        Ok(Self::from_stores(Arc::new(plain), Arc::new(secure), PermissionPolicy::standard()))
    }

    /// Volatile context; credentials are still encrypted under a throwaway key
    pub fn in_memory() -> SessionResult<Self> {
        let secure = EncryptedStore::new(MemoryStore::new(), &MasterKey::generate()?)?;
        Ok(Self::from_stores(Arc::new(MemoryStore::new()), Arc::new(secure), PermissionPolicy::standard()))
    }

    /// Wire the components over caller-provided stores
    pub fn from_stores(plain: Arc<dyn KeyValueStore>, secure: Arc<dyn KeyValueStore>, policy: PermissionPolicy) -> Self {
        let cache = PermissionCache::new(plain.clone());
        let evaluator = AccessEvaluator::new(cache.clone(), Arc::new(policy));
        let manager = SessionManager::new(CredentialStore::new(secure.clone()), SessionPreferences::new(plain.clone()), cache, evaluator);
        Self { plain, secure, manager }
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    pub fn evaluator(&self) -> &AccessEvaluator {
        self.manager.evaluator()
    }

    pub fn permission_cache(&self) -> &PermissionCache {
        self.manager.permission_cache()
    }

    pub fn credentials(&self) -> &CredentialStore {
        self.manager.credentials()
    }

    pub fn preferences(&self) -> &SessionPreferences {
        self.manager.preferences()
    }

    /// Tear down both stores; open permission streams finish
    pub fn close(&self) {
        self.plain.close();
        self.secure.close();
    }
}
