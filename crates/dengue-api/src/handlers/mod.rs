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

//! HTTP request handlers

pub mod health;
pub mod permissions;

use crate::auth::Claims;
use crate::error::{ApiError, ApiResult};
use crate::roles::RolePermissionStore;
use dengue_session::PermissionCode;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Serialize `value` as a JSON response
pub(crate) fn json_response<T: Serialize>(status: StatusCode, value: &T) -> ApiResult<Response<Full<Bytes>>> {
    let json = serde_json::to_string(value)?;

    Ok(Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(json)))?)
}

/// Read and decode a JSON body of at most `limit` bytes
pub(crate) async fn read_json<B, T>(req: Request<B>, limit: usize) -> ApiResult<T>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    T: DeserializeOwned,
{
    let body = Limited::new(req.into_body(), limit).collect().await.map_err(|e| {
        if e.downcast_ref::<LengthLimitError>().is_some() {
            ApiError::PayloadTooLarge {
                message: format!("Request body exceeds {} bytes", limit),
            }
        } else {
            ApiError::BadRequest {
                message: format!("Failed to read request body: {}", e),
            }
        }
    })?;

    Ok(serde_json::from_slice(&body.to_bytes())?)
}

/// Authorize against the caller's current role assignments, not the token
pub(crate) async fn require_permission(claims: &Claims, code: PermissionCode, roles: &RolePermissionStore) -> ApiResult<()> {
    if roles.role_has(claims.role_id, code).await? {
        Ok(())
    } else {
        Err(ApiError::Forbidden {
            message: format!("Missing required permission: {}", code),
        })
    }
}
