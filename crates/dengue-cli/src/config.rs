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

use anyhow::Result;
use dengue_session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DengueConfig {
    pub data_dir: PathBuf,
    pub log_level: String,
    pub files: StoreFiles,
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreFiles {
    pub session: String,
    pub credentials: String,
    pub master_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub poll_interval_ms: u64,
}

impl Default for DengueConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")).join("dengue-track"),
            log_level: "warn".to_string(),
            files: StoreFiles::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl Default for StoreFiles {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            session: session.session_file,
            credentials: session.credentials_file,
            master_key: session.key_file,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { poll_interval_ms: 1000 }
    }
}

impl DengueConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn resolve_config(cli_config: Option<PathBuf>, cli_data_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(config_path) = cli_config {
            Self::load_from_file(config_path)?
        } else if let Ok(env_config) = std::env::var("DENGUE_CONFIG") {
            Self::load_from_file(env_config)?
        } else {
            Self::default()
        };

        // CLI data_dir overrides environment settings
        if let Some(data_dir) = cli_data_dir {
            config.data_dir = data_dir;
        } else if let Ok(env_data_dir) = std::env::var("DENGUE_DATA_DIR") {
            config.data_dir = PathBuf::from(env_data_dir);
        }

        std::fs::create_dir_all(&config.data_dir)?;
        Ok(config)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            data_dir: self.data_dir.clone(),
            session_file: self.files.session.clone(),
            credentials_file: self.files.credentials.clone(),
            key_file: self.files.master_key.clone(),
            in_memory: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dengue.toml");
        std::fs::write(&path, "log_level = \"debug\"\n\n[files]\nsession = \"alt-session.json\"\n").unwrap();

        let config = DengueConfig::load_from_file(&path).unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.files.session, "alt-session.json");
        assert_eq!(config.files.credentials, "credentials.json");
        assert_eq!(config.watch.poll_interval_ms, 1000);
    }

    #[test]
    fn test_flag_data_dir_wins() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("dengue.toml");
        let mut from_file = DengueConfig::default();
        from_file.data_dir = dir.path().join("from-file");
        from_file.save_to_file(&config_path).unwrap();

        let flagged = dir.path().join("from-flag");
        let config = DengueConfig::resolve_config(Some(config_path), Some(flagged.clone())).unwrap();

        assert_eq!(config.data_dir, flagged);
        assert!(flagged.is_dir());
        assert_eq!(config.session_config().session_path(), flagged.join("session.json"));
    }
}
