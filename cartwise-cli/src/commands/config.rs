//! Config command - manage configuration.

use anyhow::{Context, Result};
use cartwise_store::{StoreConfig, default_config_dir};
use clap::{Args, Subcommand};
use tracing::info;

use super::{config_path, load_config};
use crate::output::JsonFormatter;
use crate::{Cli, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration.
    Show,

    /// Show configuration paths.
    Path,

    /// Write the default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Reset to defaults.
    Reset,
}

/// Runs the config command.
pub async fn run(args: &ConfigArgs, cli: &Cli) -> Result<()> {
    match &args.action {
        ConfigAction::Show => show_config(cli).await,
        ConfigAction::Path => show_paths(cli).await,
        ConfigAction::Init { force } => init_config(*force, cli).await,
        ConfigAction::Reset => reset_config(cli).await,
    }
}

async fn show_config(cli: &Cli) -> Result<()> {
    let config = load_config(cli).await?;

    match cli.format {
        OutputFormat::Text => {
            println!("Cartwise Configuration");
            println!("{}", "─".repeat(40));
            println!();
            println!("Data dir:      {}", config.data_dir.display());
            println!("Database:      {}", config.database_path().display());
            println!("Fallback file: {}", config.fallback_path().display());
            println!("In memory:     {}", config.in_memory);
            println!();
            println!("Retry attempts: {}", config.retry.max_attempts);
            println!("Retry base:     {} ms", config.retry.base_delay_ms);
            println!("Retry cap:      {} ms", config.retry.max_delay_ms);
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&config)?);
        }
    }

    Ok(())
}

async fn show_paths(cli: &Cli) -> Result<()> {
    let config_dir = default_config_dir();
    let config_file = config_path(cli);
    let config = load_config(cli).await?;

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Config dir:    {}", config_dir.display());
            println!("Config file:   {}", config_file.display());
            println!("Database:      {}", config.database_path().display());
            println!("Fallback file: {}", config.fallback_path().display());
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_dir": config_dir.display().to_string(),
                "config_file": config_file.display().to_string(),
                "database": config.database_path().display().to_string(),
                "fallback_file": config.fallback_path().display().to_string(),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&paths)?);
        }
    }

    Ok(())
}

async fn init_config(force: bool, cli: &Cli) -> Result<()> {
    let path = config_path(cli);
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite",
            path.display()
        );
    }

    StoreConfig::default()
        .save(&path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(path = %path.display(), "Config written");
    if !cli.quiet {
        println!("Wrote default configuration to {}", path.display());
    }
    Ok(())
}

async fn reset_config(cli: &Cli) -> Result<()> {
    let path = config_path(cli);

    if path.exists() {
        tokio::fs::remove_file(&path).await?;
        info!(path = %path.display(), "Config reset");
        println!("Configuration reset to defaults");
    } else {
        println!("No configuration file to reset");
    }

    Ok(())
}
