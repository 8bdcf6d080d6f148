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

//! Unencrypted session preferences for quick reads

use crate::error::SessionResult;
use dengue_store::{KeyValueStore, WriteBatch};
use std::sync::Arc;
use tracing::warn;

const ROLE_ID_KEY: &str = "preferences.role_id";
const ROLE_NAME_KEY: &str = "preferences.role_name";
const BEARER_TOKEN_KEY: &str = "preferences.bearer_token";

/// Role and bearer token of the signed-in actor, stored in plain text
#[derive(Clone)]
pub struct SessionPreferences {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for SessionPreferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPreferences").finish_non_exhaustive()
    }
}

impl SessionPreferences {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn save_role(&self, role_id: i64, role_name: &str) -> SessionResult<()> {
        let batch = WriteBatch::new().put(ROLE_ID_KEY, role_id.to_string()).put(ROLE_NAME_KEY, role_name);
        Ok(self.store.apply(batch).await?)
    }

    pub async fn role_id(&self) -> SessionResult<Option<i64>> {
        let Some(raw) = self.store.get(ROLE_ID_KEY).await? else {
            return Ok(None);
        };
        Ok(raw.parse::<i64>().map_err(|e| warn!("Ignoring malformed role id preference: {}", e)).ok())
    }

    pub async fn role_name(&self) -> SessionResult<Option<String>> {
        Ok(self.store.get(ROLE_NAME_KEY).await?)
    }

    pub async fn save_bearer_token(&self, token: &str) -> SessionResult<()> {
        Ok(self.store.put(BEARER_TOKEN_KEY, token.to_string()).await?)
    }

    pub async fn bearer_token(&self) -> SessionResult<Option<String>> {
        Ok(self.store.get(BEARER_TOKEN_KEY).await?)
    }

    pub async fn clear(&self) -> SessionResult<()> {
        let batch = WriteBatch::new().remove(ROLE_ID_KEY).remove(ROLE_NAME_KEY).remove(BEARER_TOKEN_KEY);
        Ok(self.store.apply(batch).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dengue_store::MemoryStore;

    #[tokio::test]
    async fn test_role_and_token() {
        let store = Arc::new(MemoryStore::new());
        let preferences = SessionPreferences::new(store.clone());

        preferences.save_role(3, "ADMIN").await.unwrap();
        preferences.save_bearer_token("Bearer abc").await.unwrap();

        assert_eq!(preferences.role_id().await.unwrap(), Some(3));
        assert_eq!(preferences.role_name().await.unwrap(), Some("ADMIN".to_string()));
        assert_eq!(preferences.bearer_token().await.unwrap(), Some("Bearer abc".to_string()));
        // Plain text on purpose
        assert_eq!(store.snapshot().get(BEARER_TOKEN_KEY).map(String::as_str), Some("Bearer abc"));

        preferences.clear().await.unwrap();
        assert_eq!(preferences.role_id().await.unwrap(), None);
        assert_eq!(preferences.bearer_token().await.unwrap(), None);
        assert!(store.is_empty());
    }
}
