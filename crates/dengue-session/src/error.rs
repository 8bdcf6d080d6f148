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

//! Error types for the session core

use dengue_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the session and permission components.
///
/// Absent values are never errors; they come back as `None` or an empty set.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Unknown permission code: {code}")]
    InvalidPermission { code: String },

    #[error("Invalid session data: {message}")]
    InvalidData { message: String },

    #[error("No active session")]
    NotSignedIn,
}

/// Type alias for session results
pub type SessionResult<T> = Result<T, SessionError>;
