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

use crate::config::DengueConfig;
use anyhow::Result;
use std::path::Path;

use super::CommandContext;

pub fn show_config(ctx: &CommandContext) -> Result<()> {
    let session = ctx.config.session_config();

    println!("=== Dengue Track Configuration ===");
    println!("Data Directory: {}", ctx.config.data_dir.display());
    println!("Log Level: {}", ctx.config.log_level);
    println!();

    println!("Store Files:");
    println!("  Session: {}", session.session_path().display());
    println!("  Credentials: {}", session.credentials_path().display());
    println!("  Master Key: {}", session.key_path().display());
    println!();

    println!("Watch:");
    println!("  Poll Interval: {}ms", ctx.config.watch.poll_interval_ms);

    Ok(())
}

/// Write the default configuration to `path`, refusing to overwrite
pub fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(anyhow::anyhow!("{} already exists", path.display()));
    }
    DengueConfig::default().save_to_file(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
