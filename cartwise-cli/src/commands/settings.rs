//! Settings command - show or change profile settings.

use anyhow::Result;
use cartwise_core::{SettingsPatch, ThemeMode};
use clap::{Args, Subcommand};
use tracing::info;

use super::{open_store, written};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the settings command.
#[derive(Args)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub action: Option<SettingsAction>,
}

/// Settings subcommands.
#[derive(Subcommand)]
pub enum SettingsAction {
    /// Show current settings (default).
    Show,

    /// Change one or more settings.
    Set {
        /// Theme: light, dark or system.
        #[arg(long)]
        theme: Option<ThemeMode>,
        /// Default currency for new lists.
        #[arg(long)]
        currency: Option<String>,
        /// Sales tax as a fraction, e.g. 0.08.
        #[arg(long)]
        tax_rate: Option<f64>,
        /// Haptic feedback.
        #[arg(long)]
        haptics: Option<bool>,
    },
}

/// Runs the settings command.
pub async fn run(args: &SettingsArgs, cli: &Cli) -> Result<()> {
    match args.action.as_ref().unwrap_or(&SettingsAction::Show) {
        SettingsAction::Show => show_settings(cli).await,
        SettingsAction::Set {
            theme,
            currency,
            tax_rate,
            haptics,
        } => {
            let patch = SettingsPatch {
                theme: *theme,
                default_currency: currency.clone(),
                tax_rate: *tax_rate,
                haptics_enabled: *haptics,
            };
            update_settings(patch, cli).await
        }
    }
}

async fn show_settings(cli: &Cli) -> Result<()> {
    let store = open_store(cli).await?;
    let settings = store.settings().await;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_settings(&settings));
        }
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(&settings)?),
    }
    Ok(())
}

async fn update_settings(patch: SettingsPatch, cli: &Cli) -> Result<()> {
    if patch.is_empty() {
        anyhow::bail!("Nothing to change. Use --theme, --currency, --tax-rate or --haptics");
    }

    let store = open_store(cli).await?;
    let settings = written(store.update_settings(patch).await, "settings", cli)?;
    info!(currency = %settings.default_currency, theme = %settings.theme, "Settings updated");

    match cli.format {
        OutputFormat::Text => {
            if !cli.quiet {
                let formatter = TextFormatter::new(!cli.no_color);
                println!("{}", formatter.format_settings(&settings));
            }
        }
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(&settings)?),
    }
    Ok(())
}
