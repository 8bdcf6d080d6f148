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

use super::CommandContext;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use dengue_session::AuthGrant;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::info;

/// Read an auth grant from `source` (`-` for stdin) and start a session with it
pub async fn sign_in(ctx: &CommandContext, source: &Path) -> Result<()> {
    let raw = if source == Path::new("-") {
        let mut raw = String::new();
        tokio::io::stdin().read_to_string(&mut raw).await.context("Failed to read grant from stdin")?;
        raw
    } else {
        tokio::fs::read_to_string(source).await.with_context(|| format!("Failed to read grant from {}", source.display()))?
    };

    let grant: AuthGrant = serde_json::from_str(&raw).context("Grant is not a valid auth grant document")?;
    let session = ctx.session.manager().sign_in(grant).await?;

    info!("Signed in user {}", session.user_id);
    println!("Signed in as user {} ({}, role {})", session.user_id, session.role_name, session.role_id);
    println!("{} permissions granted", session.permissions.len());
    Ok(())
}

pub async fn sign_out(ctx: &CommandContext, forget: bool) -> Result<()> {
    if forget {
        ctx.session.manager().forget_device().await?;
        println!("Signed out and forgot this device");
    } else {
        ctx.session.manager().sign_out().await?;
        println!("Signed out");
    }
    Ok(())
}

pub async fn clear_tokens(ctx: &CommandContext) -> Result<()> {
    ctx.session.credentials().clear_tokens().await?;
    println!("Stored tokens cleared; permissions left untouched");
    Ok(())
}

pub async fn show_status(ctx: &CommandContext, json: bool) -> Result<()> {
    let session = ctx.session.manager().current().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
        return Ok(());
    }

    let Some(session) = session else {
        println!("Not signed in");
        if let Some(identifier) = ctx.session.credentials().get_user_identifier().await? {
            println!("Last identifier: {}", identifier);
        }
        return Ok(());
    };

    println!("=== Dengue Track Session ===");
    println!("User: {}", session.user_id);
    println!("Role: {} ({})", session.role_name, session.role_id);
    println!("Access token: {}", if session.access_token.is_some() { "present" } else { "absent" });
    println!("Refresh token: {}", if session.refresh_token.is_some() { "present" } else { "absent" });
    println!("Token expiry: {}", describe_expiry(session.token_expiry));
    if session.access_token.is_some() && ctx.session.credentials().is_access_token_expired().await? {
        println!("  (access token has expired)");
    }
    println!();

    println!("Permissions ({}):", session.permissions.len());
    for code in session.permissions.iter() {
        println!("  {:<20} {}", code.as_str(), code.description());
    }

    Ok(())
}

fn describe_expiry(expires_at: i64) -> String {
    if expires_at == 0 {
        return "none recorded".to_string();
    }
    match DateTime::<Utc>::from_timestamp_millis(expires_at) {
        Some(at) => at.to_rfc3339(),
        None => format!("{} (out of range)", expires_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_expiry() {
        assert_eq!(describe_expiry(0), "none recorded");
        assert_eq!(describe_expiry(1_700_000_000_000), "2023-11-14T22:13:20+00:00");
    }
}
