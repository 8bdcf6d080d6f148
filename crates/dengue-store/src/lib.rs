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

//! Dengue Track device-local storage
//!
//! Durable key-value storage for the session core. Every backend implements
//! [`KeyValueStore`], publishes a [`ChangeEvent`] for each committed write and
//! applies a [`WriteBatch`] as a single atomic update.
//!
//! - [`MemoryStore`]: ordered map, nothing survives the process
//! - [`FileStore`]: one JSON document on disk, rewritten through a temp file
//! - [`EncryptedStore`]: AEAD-sealed values on top of any other backend

pub mod batch;
pub mod encrypted;
pub mod error;
pub mod file;
pub mod kv;
pub mod lease;
pub mod memory;

pub use batch::{BatchOp, WriteBatch};
pub use encrypted::{EncryptedStore, MasterKey};
pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use kv::{ChangeEvent, ChangeFeed, KeyValueStore};
pub use lease::WriterLease;
pub use memory::MemoryStore;
