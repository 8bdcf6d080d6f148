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

//! Encrypted credential storage
//!
//! Access token, refresh token and token expiry live in an encrypted store.
//! Every setter is an immediate store write.

use crate::error::SessionResult;
use chrono::{DateTime, Utc};
use dengue_store::{KeyValueStore, WriteBatch};
use std::sync::Arc;
use tracing::{debug, warn};

const ACCESS_TOKEN_KEY: &str = "credentials.access_token";
const REFRESH_TOKEN_KEY: &str = "credentials.refresh_token";
const TOKEN_EXPIRATION_KEY: &str = "credentials.token_expiration";
const USER_IDENTIFIER_KEY: &str = "credentials.user_identifier";

const TOKEN_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, TOKEN_EXPIRATION_KEY];
const ALL_KEYS: [&str; 4] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, TOKEN_EXPIRATION_KEY, USER_IDENTIFIER_KEY];

/// Token expiry in epoch milliseconds; zero means no expiry was recorded
pub type ExpiryMillis = i64;

#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// `store` is expected to encrypt at rest, e.g. an `EncryptedStore`
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn save_access_token(&self, token: &str) -> SessionResult<()> {
        Ok(self.store.put(ACCESS_TOKEN_KEY, token.to_string()).await?)
    }

    pub async fn get_access_token(&self) -> SessionResult<Option<String>> {
        Ok(self.store.get(ACCESS_TOKEN_KEY).await?)
    }

    pub async fn save_refresh_token(&self, token: &str) -> SessionResult<()> {
        Ok(self.store.put(REFRESH_TOKEN_KEY, token.to_string()).await?)
    }

    pub async fn get_refresh_token(&self) -> SessionResult<Option<String>> {
        Ok(self.store.get(REFRESH_TOKEN_KEY).await?)
    }

    pub async fn save_token_expiration(&self, expires_at: ExpiryMillis) -> SessionResult<()> {
        Ok(self.store.put(TOKEN_EXPIRATION_KEY, expires_at.to_string()).await?)
    }

    /// Recorded expiry, or `0` when none is stored
    pub async fn get_token_expiration(&self) -> SessionResult<ExpiryMillis> {
        let Some(raw) = self.store.get(TOKEN_EXPIRATION_KEY).await? else {
            return Ok(0);
        };
        Ok(raw.parse::<ExpiryMillis>().unwrap_or_else(|e| {
            warn!("Ignoring malformed token expiration: {}", e);
            0
        }))
    }

    /// Identifier the user last signed in with (email or document number)
    pub async fn save_user_identifier(&self, identifier: &str) -> SessionResult<()> {
        Ok(self.store.put(USER_IDENTIFIER_KEY, identifier.to_string()).await?)
    }

    pub async fn get_user_identifier(&self) -> SessionResult<Option<String>> {
        Ok(self.store.get(USER_IDENTIFIER_KEY).await?)
    }

    /// Expired when an expiry is recorded and is at or before `now`
    pub async fn is_access_token_expired_at(&self, now: DateTime<Utc>) -> SessionResult<bool> {
        let expires_at = self.get_token_expiration().await?;
        Ok(is_expired(expires_at, now.timestamp_millis()))
    }

    pub async fn is_access_token_expired(&self) -> SessionResult<bool> {
        self.is_access_token_expired_at(Utc::now()).await
    }

    /// Remove the access token, refresh token and expiry only
    pub async fn clear_tokens(&self) -> SessionResult<()> {
        let batch = TOKEN_KEYS.iter().fold(WriteBatch::new(), |batch, key| batch.remove(*key));
        self.store.apply(batch).await?;
        debug!("Cleared stored tokens");
        Ok(())
    }

    /// Remove every field this store manages
    pub async fn clear_all(&self) -> SessionResult<()> {
        let batch = ALL_KEYS.iter().fold(WriteBatch::new(), |batch, key| batch.remove(*key));
        self.store.apply(batch).await?;
        debug!("Cleared all stored credentials");
        Ok(())
    }
}

fn is_expired(expires_at: ExpiryMillis, now: i64) -> bool {
    expires_at != 0 && expires_at <= now
}
