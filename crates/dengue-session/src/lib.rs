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

//! Dengue Track permission and session state
//!
//! Governs what a signed-in actor may do:
//! - [`CredentialStore`]: encrypted access/refresh tokens and expiry
//! - [`SessionPreferences`]: role and bearer token for quick reads
//! - [`PermissionCache`]: persisted permission set with a reactive stream
//! - [`PermissionPolicy`]: menu and action requirement tables
//! - [`AccessEvaluator`]: the allow/deny gate used by presentation code
//! - [`SessionManager`]: sign-in ingestion, refresh and sign-out
//!
//! Everything hangs off an explicitly constructed [`SessionContext`].

pub mod cache;
pub mod config;
pub mod credentials;
pub mod error;
pub mod evaluator;
pub mod permissions;
pub mod policy;
pub mod preferences;
pub mod session;

pub use cache::{PermissionCache, PermissionSubscription};
pub use config::{SessionConfig, SessionContext, env_flag, parse_flag};
pub use credentials::{CredentialStore, ExpiryMillis};
pub use error::{SessionError, SessionResult};
pub use evaluator::{AccessEvaluator, requirement_met};
pub use permissions::{PermissionCategory, PermissionCode, PermissionSet};
pub use policy::{MenuItem, PermissionPolicy, UserAction};
pub use preferences::SessionPreferences;
pub use session::{AuthGrant, Session, SessionManager};
