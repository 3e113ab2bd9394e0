// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Haven - care-home messaging from the terminal.
//!
//! This is the binary entry point for the Haven client.

mod account;
mod app;
mod doctor;
mod partners;
mod session_file;
mod shell;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use haven_chat::RoleFilter;
use haven_config::HavenConfig;
use haven_core::{HavenError, UserId};

use crate::app::App;

/// Haven - care-home messaging from the terminal.
#[derive(Parser, Debug)]
#[command(name = "haven", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in and save the session for later commands.
    Login {
        #[arg(long)]
        email: String,
    },
    /// Sign out and forget the saved session.
    Logout,
    /// Show the signed-in user.
    Session,
    /// List the people you can message.
    Partners {
        /// Only show one role (staff, family, admin, resident) or `all`.
        #[arg(long, default_value = "all")]
        role: RoleFilter,
    },
    /// Open a conversation and chat interactively.
    Chat {
        /// User id of the other participant.
        #[arg(long = "with", value_name = "USER_ID")]
        peer: String,
    },
    /// Run diagnostic checks.
    Doctor {
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => haven_config::load_and_validate_path(path),
        None => haven_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            haven_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging.level);

    if let Err(e) = run(cli.command, config).await {
        eprintln!("{}: {e}", "error".red());
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: HavenConfig) -> Result<(), HavenError> {
    let app = App::connect(config)?;
    let result = match command {
        Commands::Login { email } => account::run_login(&app, &email).await,
        Commands::Logout => account::run_logout(&app).await,
        Commands::Session => account::run_session(&app).await,
        Commands::Partners { role } => partners::run_partners(&app, role).await,
        Commands::Chat { peer } => shell::run_chat(&app, UserId::new(peer)).await,
        Commands::Doctor { plain } => doctor::run_doctor(&app, plain).await,
    };
    app.shutdown().await;
    result
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("haven={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use haven_core::Role;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_chat_with_global_config() {
        let cli = Cli::try_parse_from(["haven", "chat", "--with", "u2", "--config", "/tmp/h.toml"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/h.toml")));
        match cli.command {
            Commands::Chat { peer } => assert_eq!(peer, "u2"),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn partners_role_filter_parses() {
        let cli = Cli::try_parse_from(["haven", "partners", "--role", "Staff"]).unwrap();
        match cli.command {
            Commands::Partners { role } => assert_eq!(role, RoleFilter::Only(Role::Staff)),
            other => panic!("unexpected command {other:?}"),
        }

        let cli = Cli::try_parse_from(["haven", "partners"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Partners {
                role: RoleFilter::All
            }
        ));

        assert!(Cli::try_parse_from(["haven", "partners", "--role", "janitor"]).is_err());
    }

    #[test]
    fn login_requires_email() {
        assert!(Cli::try_parse_from(["haven", "login"]).is_err());
    }
}
