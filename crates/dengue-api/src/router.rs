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

//! HTTP routing for the permission service

use crate::auth::{Claims, JwtManager, extract_token_from_header};
use crate::error::{ApiError, ApiResult};
use crate::handlers::{health, permissions};
use crate::roles::RolePermissionStore;
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response};
use std::sync::Arc;
use tracing::{info, warn};

/// Paths reachable without a bearer token
const PUBLIC_PATHS: &[&str] = &["/api/health"];

/// HTTP router for the permission service
#[derive(Debug, Clone)]
pub struct Router {
    jwt: Arc<JwtManager>,
    roles: RolePermissionStore,
    max_body_size: usize,
}

impl Router {
    pub fn new(jwt: Arc<JwtManager>, roles: RolePermissionStore, max_body_size: usize) -> Self {
        Self { jwt, roles, max_body_size }
    }

    pub fn roles(&self) -> &RolePermissionStore {
        &self.roles
    }

    /// Route a request, rendering failures as problem+json
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let instance = req.uri().path().to_string();
        match self.route(req).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Request to {} failed: {}", instance, e);
                e.into_response(&instance)
            }
        }
    }

    /// Route a request to the appropriate handler
    pub async fn route<B>(&self, req: Request<B>) -> ApiResult<Response<Full<Bytes>>>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let path = req.uri().path().to_string();
        let method = req.method().clone();

        info!("Routing request: {} {}", method, path);

        if PUBLIC_PATHS.contains(&path.as_str()) {
            return match method {
                Method::GET => health::health_check(&self.roles).await,
                _ => Err(method_not_allowed(&method, &path)),
            };
        }

        let claims = self.authenticate(&req)?;
        let segments: Vec<&str> = path.split('/').collect();

        match (&method, segments.as_slice()) {
            (&Method::GET, ["", "api", "Permission", "all"]) => permissions::list_permissions(&claims, &self.roles).await,
            (&Method::GET, ["", "api", "Permission", "matrix"]) => permissions::permission_matrix(&claims, &self.roles).await,
            (&Method::GET, ["", "api", "Permission", "role", role_id]) => permissions::get_role_permissions(&claims, parse_role_id(role_id)?, &self.roles).await,
            (&Method::PUT, ["", "api", "Permission", "role", role_id]) => {
                let role_id = parse_role_id(role_id)?;
                permissions::update_role_permissions(req, &claims, role_id, &self.roles, self.max_body_size).await
            }
            (&Method::GET, ["", "api", "Permission", "check", code]) => permissions::check_permission(&claims, code, &self.roles).await,

            (_, ["", "api", "Permission", "all" | "matrix"]) | (_, ["", "api", "Permission", "role" | "check", _]) => Err(method_not_allowed(&method, &path)),

            _ => Err(ApiError::NotFound {
                message: format!("No route for {} {}", method, path),
            }),
        }
    }

    fn authenticate<B>(&self, req: &Request<B>) -> ApiResult<Claims> {
        let Some(header) = req.headers().get("authorization") else {
            warn!("Missing authorization header for protected path: {}", req.uri().path());
            return Err(ApiError::Unauthorized {
                message: "No authentication information found".to_string(),
            });
        };

        let header = header.to_str().map_err(|_| ApiError::Unauthorized {
            message: "Invalid authorization header encoding".to_string(),
        })?;
        let token = extract_token_from_header(header)?;

        self.jwt.validate_token(token).map_err(|e| {
            warn!("Token validation failed: {}", e);
            ApiError::Unauthorized {
                message: "Invalid or expired token".to_string(),
            }
        })
    }
}

fn parse_role_id(raw: &str) -> ApiResult<i64> {
    raw.parse().map_err(|_| ApiError::BadRequest {
        message: format!("Invalid role id: {}", raw),
    })
}

fn method_not_allowed(method: &Method, path: &str) -> ApiError {
    ApiError::MethodNotAllowed {
        message: format!("{} is not supported on {}", method, path),
    }
}
