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

//! Configuration management for the permission service

use dengue_session::env_flag;
use std::env;
use std::path::PathBuf;

/// Configuration for the permission service
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the HTTP server to
    pub bind_address: String,

    /// JWT secret key for authentication
    pub jwt_secret: String,

    /// Expected `iss` claim
    pub jwt_issuer: String,

    /// Expected `aud` claim
    pub jwt_audience: String,

    /// Directory holding the role assignment store
    pub data_dir: PathBuf,

    /// Keep role assignments in memory only
    pub in_memory: bool,

    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            jwt_secret: "default-secret-change-in-production".to_string(),
            jwt_issuer: "dengue-auth".to_string(),
            jwt_audience: "dengue-track".to_string(),
            data_dir: PathBuf::from("data"),
            in_memory: false,
            max_body_size: 64 * 1024, // 64KB
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            bind_address: env::var("DENGUE_API_BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),

            jwt_secret: env::var("DENGUE_JWT_SECRET").unwrap_or_else(|_| "default-secret-change-in-production".to_string()),

            jwt_issuer: env::var("DENGUE_JWT_ISSUER").unwrap_or_else(|_| "dengue-auth".to_string()),

            jwt_audience: env::var("DENGUE_JWT_AUDIENCE").unwrap_or_else(|_| "dengue-track".to_string()),

            data_dir: env::var("DENGUE_API_DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("data")),

            in_memory: env_flag("DENGUE_API_IN_MEMORY"),

            max_body_size: env::var("DENGUE_API_MAX_BODY_SIZE").map(|v| v.parse().unwrap_or(64 * 1024)).unwrap_or(64 * 1024),
        }
    }

    /// File holding role → permission assignments
    pub fn roles_path(&self) -> PathBuf {
        self.data_dir.join("roles.json")
    }
}
