//! dbxauth - Dropbox OAuth 2.0 PKCE token fetcher
//!
//! Main entry point for the dbxauth CLI.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};

mod commands;
mod logging;

use commands::{config, login, pkce};

/// Exit status for failures other than a missing authorization code.
const EXIT_ERROR: u8 = 2;

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// dbxauth - fetch a Dropbox access/refresh token pair via OAuth 2.0 PKCE
#[derive(Parser)]
#[command(name = "dbxauth")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Config directory (default: platform config dir / dbxauth)
    #[arg(long, global = true, env = "DBXAUTH_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Login options when no subcommand is given
    #[command(flatten)]
    pub login: login::LoginArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the browser authorization and exchange the code for tokens (default)
    Login(login::LoginArgs),

    /// Generate or check a PKCE verifier/challenge pair
    Pkce(pkce::PkceArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let matches = Cli::command().get_matches();
    reject_misplaced_login_args(&matches);
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Top-level login flags only apply when no subcommand is given; with one,
/// they would be dropped silently.
fn reject_misplaced_login_args(matches: &ArgMatches) {
    if matches.subcommand_name().is_none() {
        return;
    }
    let misplaced = login::ARG_IDS
        .iter()
        .find(|id| matches.value_source(id) == Some(ValueSource::CommandLine));
    if let Some(id) = misplaced {
        Cli::command()
            .error(
                ErrorKind::ArgumentConflict,
                format!(
                    "'--{}' is a login option; pass it after `login` or omit the subcommand",
                    id.replace('_', "-")
                ),
            )
            .exit();
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config_dir = cli.config_dir.or_else(dbxauth_config::xdg_config_dir);
    let loaded = dbxauth_config::load_config_with_options(None, config_dir.as_deref())?;

    // Console (human-readable, stderr) + rotating JSON file
    let _guard = logging::init(cli.verbose, &loaded.config.logging, config_dir.as_deref());

    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        config_dir,
        loaded,
    };

    match cli.command {
        Some(Commands::Login(args)) => login::run(args, &ctx).await,
        Some(Commands::Pkce(args)) => pkce::run(args, &ctx).await,
        Some(Commands::Config(args)) => config::run(args, &ctx).await,
        None => login::run(cli.login, &ctx).await,
    }
}
