//! Config command - configuration management.

use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::{Args, Subcommand};

use dbxauth_config::{self, ConfigError};

use super::{Context, effective_config};

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration and which files were loaded
    Show,

    /// Show the user configuration file path
    Path,

    /// Write a config file with the current effective values
    Init {
        /// Create project-local config (./dbxauth.toml) instead of user config
        #[arg(long)]
        local: bool,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<ExitCode> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Path => cmd_path(ctx),
        ConfigCommand::Init { local, force } => cmd_init(ctx, local, force),
    }?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = &ctx.loaded;
    let effective = effective_config(&loaded.config);

    if ctx.json_output {
        let output = serde_json::json!({
            "loaded_from": loaded
                .loaded_from()
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>(),
            "warnings": loaded.warnings,
            "oauth": {
                "client_id": effective.oauth.client_id,
                "redirect_uri": effective.oauth.redirect_uri,
                "authorize_url": effective.oauth.authorize_url,
                "token_url": effective.oauth.token_url,
                "token_access_type": effective.oauth.token_access_type,
            },
            "callback": { "timeout_secs": effective.callback.timeout_secs },
            "logging": {
                "file": effective.logging.file,
                "directory": effective.logging.directory,
            },
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("# dbxauth Configuration\n");

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("# No config files loaded (using defaults)");
    } else {
        for path in sources {
            println!("# Loaded: {}", path.display());
        }
    }
    if ctx.verbose {
        for source in loaded.sources.iter().filter(|s| !s.loaded) {
            println!("# Not found: {}", source.path.display());
        }
    }
    for warning in &loaded.warnings {
        println!("# Warning: {}", warning);
    }
    println!();
    print!("{}", effective.to_toml()?);

    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    let dir = ctx.config_dir.as_ref().ok_or(ConfigError::NoConfigDir)?;
    println!("{}", dbxauth_config::user_config_path(dir).display());
    Ok(())
}

fn cmd_init(ctx: &Context, local: bool, force: bool) -> Result<()> {
    let path = if local {
        dbxauth_config::project_config_path(&std::env::current_dir()?)
    } else {
        let dir = ctx.config_dir.as_ref().ok_or(ConfigError::NoConfigDir)?;
        dbxauth_config::user_config_path(dir)
    };

    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    dbxauth_config::save_config(&effective_config(&ctx.loaded.config), &path)?;
    tracing::info!(path = %path.display(), "Config written");
    println!("Wrote {}", path.display());

    Ok(())
}
