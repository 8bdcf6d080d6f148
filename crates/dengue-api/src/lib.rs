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

//! Dengue Track permission service
//!
//! REST surface over role → permission assignments, sharing the permission
//! vocabulary of `dengue-session`. Callers authenticate with an HS256 bearer
//! token carrying their user id and role.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod roles;
pub mod router;
pub mod server;
