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
use anyhow::Result;
use chrono::Local;
use dengue_session::{MenuItem, PermissionSet, UserAction};
use std::time::Duration;

pub async fn show_menu(ctx: &CommandContext) -> Result<()> {
    let evaluator = ctx.session.evaluator();
    let visible = evaluator.visible_menu().await;
    let actions = evaluator.allowed_actions().await;

    println!("Menu:");
    for item in MenuItem::ALL {
        let marker = if visible.contains(item) { "+" } else { "-" };
        println!("  {} {}", marker, item);
    }
    println!();

    println!("Actions:");
    for action in UserAction::ALL {
        let marker = if actions.contains(action) { "+" } else { "-" };
        println!("  {} {}", marker, action);
    }

    Ok(())
}

/// Print the decision; the caller maps `false` to a non-zero exit status
pub async fn check_menu(ctx: &CommandContext, item: MenuItem) -> Result<bool> {
    let allowed = ctx.session.evaluator().can_open(item).await;
    println!("{}: {}", item, if allowed { "allowed" } else { "denied" });
    Ok(allowed)
}

pub async fn check_action(ctx: &CommandContext, action: UserAction) -> Result<bool> {
    let allowed = ctx.session.evaluator().can_perform(action).await;
    println!("{}: {}", action, if allowed { "allowed" } else { "denied" });
    Ok(allowed)
}

/// Print the permission set now and whenever it changes, until Ctrl-C.
///
/// Other processes write the session file directly, so this polls instead of
/// relying on the in-process change feed.
pub async fn watch(ctx: &CommandContext) -> Result<()> {
    let cache = ctx.session.permission_cache();
    let mut ticker = tokio::time::interval(Duration::from_millis(ctx.config.watch.poll_interval_ms.max(100)));
    let mut last: Option<PermissionSet> = None;

    println!("Watching permissions in {} (Ctrl-C to stop)", ctx.config.data_dir.display());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let current = cache.permissions().await?;
                if last.as_ref() != Some(&current) {
                    print_snapshot(&current);
                    last = Some(current);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                ctx.session.close();
                return Ok(());
            }
        }
    }
}

fn print_snapshot(permissions: &PermissionSet) {
    let codes = permissions.to_strings();
    let listed = if codes.is_empty() { "(none)".to_string() } else { codes.join(", ") };
    println!("[{}] {}", Local::now().format("%H:%M:%S"), listed);
}
