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

//! Sign-in ingestion and session lifecycle

use crate::cache::PermissionCache;
use crate::credentials::{CredentialStore, ExpiryMillis};
use crate::error::{SessionError, SessionResult};
use crate::evaluator::AccessEvaluator;
use crate::permissions::PermissionSet;
use crate::preferences::SessionPreferences;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// What the authentication provider hands over after a successful sign-in
/// or token refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthGrant {
    pub user_id: i64,
    pub role_id: i64,
    pub role_name: String,
    pub permissions: Vec<String>,
    pub access_token: String,
    pub refresh_token: String,
    /// Epoch milliseconds, `0` when the provider gave no expiry
    #[serde(default)]
    pub expires_at: ExpiryMillis,
    /// Identifier the user typed to sign in, remembered for the next login
    #[serde(default)]
    pub identifier: Option<String>,
}

/// Signed-in actor: identity, permissions and credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: i64,
    pub role_id: i64,
    pub role_name: String,
    pub permissions: PermissionSet,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expiry: ExpiryMillis,
}

/// Coordinates credentials, preferences and the permission cache.
///
/// `sign_in` is the only way permissions enter the cache.
#[derive(Debug, Clone)]
pub struct SessionManager {
    credentials: CredentialStore,
    preferences: SessionPreferences,
    cache: PermissionCache,
    evaluator: AccessEvaluator,
}

impl SessionManager {
    pub fn new(credentials: CredentialStore, preferences: SessionPreferences, cache: PermissionCache, evaluator: AccessEvaluator) -> Self {
        Self {
            credentials,
            preferences,
            cache,
            evaluator,
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn preferences(&self) -> &SessionPreferences {
        &self.preferences
    }

    pub fn permission_cache(&self) -> &PermissionCache {
        &self.cache
    }

    pub fn evaluator(&self) -> &AccessEvaluator {
        &self.evaluator
    }

    /// Persist a fresh session. Unknown permission codes reject the grant
    /// before anything is written.
    #[instrument(skip(self, grant), fields(user_id = grant.user_id, role_id = grant.role_id))]
    pub async fn sign_in(&self, grant: AuthGrant) -> SessionResult<Session> {
        let permissions = PermissionSet::parse(&grant.permissions)?;

        self.store_tokens(&grant).await?;
        if let Some(identifier) = &grant.identifier {
            self.credentials.save_user_identifier(identifier).await?;
        }
        self.preferences.save_role(grant.role_id, &grant.role_name).await?;
        self.preferences.save_bearer_token(&grant.access_token).await?;
        self.cache.save(grant.user_id, grant.role_id, &grant.role_name, &permissions).await?;

        info!("User {} signed in as {} with {} permissions", grant.user_id, grant.role_name, permissions.len());
        Ok(Session::from_grant(grant, permissions))
    }

    /// Replace tokens and the permission set of the current session
    #[instrument(skip(self, grant), fields(user_id = grant.user_id))]
    pub async fn refresh(&self, grant: AuthGrant) -> SessionResult<Session> {
        let current = self.cache.user_id().await?.ok_or(SessionError::NotSignedIn)?;
        if current != grant.user_id {
            return Err(SessionError::InvalidData {
                message: format!("Refresh grant is for user {} but user {} is signed in", grant.user_id, current),
            });
        }

        let permissions = PermissionSet::parse(&grant.permissions)?;
        self.store_tokens(&grant).await?;
        self.preferences.save_role(grant.role_id, &grant.role_name).await?;
        self.preferences.save_bearer_token(&grant.access_token).await?;
        self.cache.save(grant.user_id, grant.role_id, &grant.role_name, &permissions).await?;

        info!("Session refreshed for user {}", grant.user_id);
        Ok(Session::from_grant(grant, permissions))
    }

    /// Current session, or `None` when nobody is signed in
    pub async fn current(&self) -> SessionResult<Option<Session>> {
        let (Some(user_id), Some(role_id)) = (self.cache.user_id().await?, self.cache.role_id().await?) else {
            return Ok(None);
        };

        Ok(Some(Session {
            user_id,
            role_id,
            role_name: self.cache.role_name().await?.unwrap_or_default(),
            permissions: self.cache.permissions().await?,
            access_token: self.credentials.get_access_token().await?,
            refresh_token: self.credentials.get_refresh_token().await?,
            token_expiry: self.credentials.get_token_expiration().await?,
        }))
    }

    pub async fn is_signed_in(&self) -> SessionResult<bool> {
        Ok(self.cache.user_id().await?.is_some())
    }

    /// Clear tokens, preferences and permissions. The remembered sign-in
    /// identifier survives; safe to call repeatedly.
    pub async fn sign_out(&self) -> SessionResult<()> {
        self.cache.clear().await?;
        self.preferences.clear().await?;
        self.credentials.clear_tokens().await?;
        info!("Signed out");
        Ok(())
    }

    /// Sign out and drop every stored credential, including the remembered identifier
    pub async fn forget_device(&self) -> SessionResult<()> {
        self.sign_out().await?;
        self.credentials.clear_all().await
    }

    async fn store_tokens(&self, grant: &AuthGrant) -> SessionResult<()> {
        self.credentials.save_access_token(&grant.access_token).await?;
        self.credentials.save_refresh_token(&grant.refresh_token).await?;
        self.credentials.save_token_expiration(grant.expires_at).await
    }
}

impl Session {
    fn from_grant(grant: AuthGrant, permissions: PermissionSet) -> Self {
        Self {
            user_id: grant.user_id,
            role_id: grant.role_id,
            role_name: grant.role_name,
            permissions,
            access_token: Some(grant.access_token),
            refresh_token: Some(grant.refresh_token),
            token_expiry: grant.expires_at,
        }
    }
}
