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

//! Data models for the permission service

use chrono::{DateTime, Utc};
use dengue_session::{PermissionCategory, PermissionCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One permission code with its metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionDto {
    pub code: String,
    pub category: PermissionCategory,
    pub description: String,
}

impl From<PermissionCode> for PermissionDto {
    fn from(code: PermissionCode) -> Self {
        Self {
            code: code.as_str().to_string(),
            category: code.category(),
            description: code.description().to_string(),
        }
    }
}

/// A role and the codes assigned to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolePermissionsResponse {
    pub role_id: i64,
    pub role_name: String,
    pub permission_codes: Vec<String>,
}

/// Body of `PUT /api/Permission/role/{roleId}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRolePermissionsRequest {
    pub permission_codes: Vec<String>,
}

/// One row of the permission matrix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleMatrixRow {
    pub role_id: i64,
    pub role_name: String,
    /// Code → granted, for every known code
    pub granted: BTreeMap<String, bool>,
}

/// All roles against all codes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionMatrix {
    pub permissions: Vec<PermissionDto>,
    pub roles: Vec<RoleMatrixRow>,
}

/// Answer to `GET /api/Permission/check/{permissionCode}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionCheckResponse {
    pub permission_code: String,
    pub role_id: i64,
    pub granted: bool,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status
    pub status: String,

    /// Timestamp of the check
    pub timestamp: DateTime<Utc>,

    /// Service version
    pub version: String,

    /// Number of roles with stored assignments
    pub roles: usize,
}
