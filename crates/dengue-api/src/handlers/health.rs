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

//! Health check handler

use crate::error::ApiResult;
use crate::handlers::json_response;
use crate::models::HealthResponse;
use crate::roles::RolePermissionStore;
use chrono::Utc;
use http_body_util::Full;
use hyper::{Response, StatusCode, body::Bytes};
use tracing::{info, warn};

/// GET /api/health
pub async fn health_check(roles: &RolePermissionStore) -> ApiResult<Response<Full<Bytes>>> {
    info!("Processing health check request");

    let (status, code, count) = match roles.roles().await {
        Ok(all) => ("healthy", StatusCode::OK, all.len()),
        Err(e) => {
            warn!("Role store unavailable: {}", e);
            ("unhealthy", StatusCode::SERVICE_UNAVAILABLE, 0)
        }
    };

    let health_response = HealthResponse {
        status: status.to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        roles: count,
    };

    json_response(code, &health_response)
}
