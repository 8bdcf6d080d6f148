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

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::CommandContext;
use config::DengueConfig;
use dengue_session::{MenuItem, UserAction};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dengue", about = "Dengue Track session and permission tool")]
pub struct Cli {
    /// Path to configuration file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Data directory location (overrides $DENGUE_DATA_DIR)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for configuration inspection
#[derive(Subcommand, Debug)]
#[command(about = "Inspect or create CLI configuration")]
pub enum ConfigCommands {
    /// Show current effective configuration
    Show,
    /// Write a default configuration file
    Init { path: PathBuf },
}

/// Top-level commands for dengue
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a session from an auth grant JSON document (`-` reads stdin)
    SignIn { grant: PathBuf },

    /// End the current session
    SignOut {
        /// Also forget the remembered sign-in identifier
        #[arg(long)]
        forget: bool,
    },

    /// Show the current session
    Status {
        /// Print the session as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove stored tokens but keep the cached permissions
    ClearTokens,

    /// List menu items and actions with their access decision
    Menu,

    /// Check whether a menu item may be opened
    CheckMenu { item: MenuItem },

    /// Check whether an action may be performed
    CheckAction { action: UserAction },

    /// Print the permission set whenever it changes
    Watch,

    /// Inspect or create configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // `config init` must work before any data directory exists
    if let Commands::Config {
        command: ConfigCommands::Init { path },
    } = &cli.command
    {
        commands::config::init_config(path)?;
        return Ok(ExitCode::SUCCESS);
    }

    let config = DengueConfig::resolve_config(cli.config, cli.data_dir)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with_writer(std::io::stderr)
        .init();

    let ctx = CommandContext::new(config).await?;

    let allowed = match cli.command {
        Commands::SignIn { grant } => {
            commands::session::sign_in(&ctx, &grant).await?;
            true
        }
        Commands::SignOut { forget } => {
            commands::session::sign_out(&ctx, forget).await?;
            true
        }
        Commands::Status { json } => {
            commands::session::show_status(&ctx, json).await?;
            true
        }
        Commands::ClearTokens => {
            commands::session::clear_tokens(&ctx).await?;
            true
        }
        Commands::Menu => {
            commands::access::show_menu(&ctx).await?;
            true
        }
        Commands::CheckMenu { item } => commands::access::check_menu(&ctx, item).await?,
        Commands::CheckAction { action } => commands::access::check_action(&ctx, action).await?,
        Commands::Watch => {
            commands::access::watch(&ctx).await?;
            true
        }
        Commands::Config { command: ConfigCommands::Show } => {
            commands::config::show_config(&ctx)?;
            true
        }
        Commands::Config { command: ConfigCommands::Init { .. } } => true,
    };

    Ok(if allowed { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_menu_items_and_actions() {
        let cli = Cli::try_parse_from(["dengue", "check-menu", "case_map"]).unwrap();
        assert!(matches!(cli.command, Commands::CheckMenu { item: MenuItem::CaseMap }));

        let cli = Cli::try_parse_from(["dengue", "--data-dir", "/tmp/x", "check-action", "export_cases"]).unwrap();
        assert!(matches!(cli.command, Commands::CheckAction { action: UserAction::ExportCases }));
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/x")));

        assert!(Cli::try_parse_from(["dengue", "check-menu", "secret_lab"]).is_err());
    }
}
