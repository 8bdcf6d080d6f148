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

//! Permission management handlers

use crate::auth::Claims;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{json_response, read_json, require_permission};
use crate::models::{PermissionCheckResponse, PermissionDto, PermissionMatrix, RoleMatrixRow, RolePermissionsResponse, UpdateRolePermissionsRequest};
use crate::roles::{Role, RolePermissionStore};
use dengue_session::{PermissionCode, PermissionSet};
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{Request, Response, StatusCode};
use tracing::{info, instrument};

impl From<Role> for RolePermissionsResponse {
    fn from(role: Role) -> Self {
        Self {
            role_id: role.id,
            role_name: role.name,
            permission_codes: role.permissions.to_strings(),
        }
    }
}

/// GET /api/Permission/all
#[instrument(skip(roles), fields(user = %claims.sub))]
pub async fn list_permissions(claims: &Claims, roles: &RolePermissionStore) -> ApiResult<Response<Full<Bytes>>> {
    require_permission(claims, PermissionCode::PermissionView, roles).await?;

    let permissions: Vec<PermissionDto> = PermissionCode::ALL.iter().copied().map(PermissionDto::from).collect();
    json_response(StatusCode::OK, &permissions)
}

/// GET /api/Permission/role/{roleId}
#[instrument(skip(roles), fields(user = %claims.sub))]
pub async fn get_role_permissions(claims: &Claims, role_id: i64, roles: &RolePermissionStore) -> ApiResult<Response<Full<Bytes>>> {
    require_permission(claims, PermissionCode::PermissionView, roles).await?;

    let role = roles.role(role_id).await?.ok_or_else(|| ApiError::NotFound {
        message: format!("Role {} not found", role_id),
    })?;
    json_response(StatusCode::OK, &RolePermissionsResponse::from(role))
}

/// PUT /api/Permission/role/{roleId}
#[instrument(skip(req, roles), fields(user = %claims.sub))]
pub async fn update_role_permissions<B>(req: Request<B>, claims: &Claims, role_id: i64, roles: &RolePermissionStore, max_body_size: usize) -> ApiResult<Response<Full<Bytes>>>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    require_permission(claims, PermissionCode::PermissionManage, roles).await?;

    let request: UpdateRolePermissionsRequest = read_json(req, max_body_size).await?;
    let permissions = PermissionSet::parse(&request.permission_codes)?;

    let role = roles.set_permissions(role_id, permissions).await?;
    info!("User {} replaced permissions of role {}", claims.sub, role_id);

    json_response(StatusCode::OK, &RolePermissionsResponse::from(role))
}

/// GET /api/Permission/matrix
#[instrument(skip(roles), fields(user = %claims.sub))]
pub async fn permission_matrix(claims: &Claims, roles: &RolePermissionStore) -> ApiResult<Response<Full<Bytes>>> {
    require_permission(claims, PermissionCode::PermissionView, roles).await?;

    let rows = roles
        .roles()
        .await?
        .into_iter()
        .map(|role| RoleMatrixRow {
            role_id: role.id,
            granted: PermissionCode::ALL.iter().map(|code| (code.as_str().to_string(), role.permissions.contains(*code))).collect(),
            role_name: role.name,
        })
        .collect();

    let matrix = PermissionMatrix {
        permissions: PermissionCode::ALL.iter().copied().map(PermissionDto::from).collect(),
        roles: rows,
    };
    json_response(StatusCode::OK, &matrix)
}

/// GET /api/Permission/check/{permissionCode}
#[instrument(skip(roles), fields(user = %claims.sub))]
pub async fn check_permission(claims: &Claims, permission_code: &str, roles: &RolePermissionStore) -> ApiResult<Response<Full<Bytes>>> {
    let code: PermissionCode = permission_code.parse()?;

    let response = PermissionCheckResponse {
        permission_code: code.as_str().to_string(),
        role_id: claims.role_id,
        granted: roles.role_has(claims.role_id, code).await?,
    };
    json_response(StatusCode::OK, &response)
}
