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

//! Role → permission assignments
//!
//! Each role is one JSON record under `roles.{id}`; `roles.index` lists the
//! known role ids. Assignments are replaced wholesale.

use crate::error::{ApiError, ApiResult};
use dengue_session::{PermissionCode, PermissionSet};
use dengue_store::{KeyValueStore, WriteBatch};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

const INDEX_KEY: &str = "roles.index";

pub const CITIZEN_ROLE_ID: i64 = 1;
pub const HEALTH_WORKER_ROLE_ID: i64 = 2;
pub const ADMIN_ROLE_ID: i64 = 3;

/// Stored role record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub permissions: PermissionSet,
}

/// Roles seeded on first start
pub fn default_roles() -> Vec<Role> {
    use PermissionCode::*;

    vec![
        Role {
            id: CITIZEN_ROLE_ID,
            name: "CITIZEN".to_string(),
            permissions: PermissionSet::from([CaseViewOwn, CaseCreate, MapView, HospitalView, PublicationView]),
        },
        Role {
            id: HEALTH_WORKER_ROLE_ID,
            name: "HEALTH_WORKER".to_string(),
            permissions: PermissionSet::from([
                CaseViewAll,
                CaseViewOwn,
                CaseCreate,
                CaseUpdate,
                CaseExport,
                MapView,
                HospitalView,
                PublicationView,
                PublicationCreate,
                PublicationUpdate,
                ReportView,
                StatisticsView,
            ]),
        },
        Role {
            id: ADMIN_ROLE_ID,
            name: "ADMIN".to_string(),
            permissions: PermissionCode::ALL.iter().copied().collect(),
        },
    ]
}

fn role_key(id: i64) -> String {
    format!("roles.{}", id)
}

/// Role assignments backed by a [`KeyValueStore`]
#[derive(Clone)]
pub struct RolePermissionStore {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for RolePermissionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RolePermissionStore").finish_non_exhaustive()
    }
}

impl RolePermissionStore {
    /// Open over `store`, seeding [`default_roles`] when no roles exist yet
    pub async fn open(store: Arc<dyn KeyValueStore>) -> ApiResult<Self> {
        let roles = Self { store };
        if roles.store.get(INDEX_KEY).await?.is_none() {
            roles.seed(default_roles()).await?;
        }
        Ok(roles)
    }

    async fn seed(&self, roles: Vec<Role>) -> ApiResult<()> {
        let ids: Vec<i64> = roles.iter().map(|role| role.id).collect();
        let mut batch = WriteBatch::new().put(INDEX_KEY, serde_json::to_string(&ids)?);
        for role in &roles {
            batch = batch.put(role_key(role.id), serde_json::to_string(role)?);
        }
        self.store.apply(batch).await?;
        info!("Seeded {} default roles", roles.len());
        Ok(())
    }

    async fn role_ids(&self) -> ApiResult<Vec<i64>> {
        let Some(raw) = self.store.get(INDEX_KEY).await? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw).map_err(|e| ApiError::InternalServerError {
            message: format!("Role index is corrupt: {}", e),
        })
    }

    /// Every role, ordered by id
    pub async fn roles(&self) -> ApiResult<Vec<Role>> {
        let mut roles = Vec::new();
        for id in self.role_ids().await? {
            match self.role(id).await? {
                Some(role) => roles.push(role),
                None => warn!("Role {} is indexed but has no record", id),
            }
        }
        roles.sort_by_key(|role| role.id);
        Ok(roles)
    }

    pub async fn role(&self, id: i64) -> ApiResult<Option<Role>> {
        let Some(raw) = self.store.get(&role_key(id)).await? else {
            return Ok(None);
        };
        let role = serde_json::from_str(&raw).map_err(|e| ApiError::InternalServerError {
            message: format!("Role {} record is corrupt: {}", id, e),
        })?;
        Ok(Some(role))
    }

    /// Replace the codes granted to role `id`
    pub async fn set_permissions(&self, id: i64, permissions: PermissionSet) -> ApiResult<Role> {
        let mut role = self.role(id).await?.ok_or_else(|| ApiError::NotFound {
            message: format!("Role {} not found", id),
        })?;
        role.permissions = permissions;
        self.store.put(&role_key(id), serde_json::to_string(&role)?).await?;
        info!("Role {} ({}) now holds {} permissions", role.id, role.name, role.permissions.len());
        Ok(role)
    }

    /// Whether role `id` currently holds `code`; unknown roles hold nothing
    pub async fn role_has(&self, id: i64, code: PermissionCode) -> ApiResult<bool> {
        Ok(self.role(id).await?.is_some_and(|role| role.permissions.contains(code)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dengue_store::MemoryStore;

    #[tokio::test]
    async fn test_seeds_default_roles_once() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let roles = RolePermissionStore::open(store.clone()).await.unwrap();

        let all = roles.roles().await.unwrap();
        assert_eq!(all.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(), ["CITIZEN", "HEALTH_WORKER", "ADMIN"]);
        assert_eq!(all[2].permissions.len(), PermissionCode::ALL.len());

        roles.set_permissions(CITIZEN_ROLE_ID, PermissionSet::new()).await.unwrap();
        let reopened = RolePermissionStore::open(store).await.unwrap();
        assert!(reopened.role(CITIZEN_ROLE_ID).await.unwrap().unwrap().permissions.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_role() {
        let roles = RolePermissionStore::open(Arc::new(MemoryStore::new())).await.unwrap();

        assert_eq!(roles.role(99).await.unwrap(), None);
        assert!(!roles.role_has(99, PermissionCode::MapView).await.unwrap());
        assert!(matches!(roles.set_permissions(99, PermissionSet::new()).await, Err(ApiError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_role_has_follows_updates() {
        let roles = RolePermissionStore::open(Arc::new(MemoryStore::new())).await.unwrap();
        assert!(!roles.role_has(CITIZEN_ROLE_ID, PermissionCode::ReportView).await.unwrap());

        roles.set_permissions(CITIZEN_ROLE_ID, PermissionSet::from([PermissionCode::ReportView])).await.unwrap();

        assert!(roles.role_has(CITIZEN_ROLE_ID, PermissionCode::ReportView).await.unwrap());
        assert!(!roles.role_has(CITIZEN_ROLE_ID, PermissionCode::MapView).await.unwrap());
    }
}
