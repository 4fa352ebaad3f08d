//! CLI command implementations.

pub mod budget;
pub mod config;
pub mod item;
pub mod list;
pub mod queue;
pub mod settings;
pub mod stats;
pub mod sync;

use anyhow::{Context, Result};
use cartwise_store::{Store, StoreConfig, WriteOutcome, default_config_path};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

use crate::Cli;

/// A command named a record that does not exist.
#[derive(Debug)]
pub struct NotFound(pub String);

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} not found", self.0)
    }
}

impl std::error::Error for NotFound {}

/// Config file used for this run.
pub fn config_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(default_config_path)
}

/// Loads the store configuration and applies command-line overrides.
pub async fn load_config(cli: &Cli) -> Result<StoreConfig> {
    let path = config_path(cli);
    let mut config = StoreConfig::load(&path)
        .await
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    if let Some(dir) = &cli.data_dir {
        config.data_dir.clone_from(dir);
    }
    if cli.in_memory {
        config.in_memory = true;
    }
    Ok(config)
}

/// Opens the store for this run.
pub async fn open_store(cli: &Cli) -> Result<Store> {
    let config = load_config(cli).await?;
    debug!(data_dir = %config.data_dir.display(), in_memory = config.in_memory, "Opening store");
    let store = Store::open(&config).await?;
    if store.is_degraded() && !cli.quiet {
        eprintln!("Warning: database unavailable, changes will be queued");
    }
    Ok(store)
}

/// Unwraps a write outcome, turning rejections into errors.
///
/// A queued write still succeeds, with a note on stderr.
pub fn written<T>(outcome: WriteOutcome<T>, what: &str, cli: &Cli) -> Result<T> {
    match outcome {
        WriteOutcome::Persisted(record) => Ok(record),
        WriteOutcome::Queued(record) => {
            if !cli.quiet {
                eprintln!("Note: {what} saved offline; run `cartwise sync` to replay");
            }
            Ok(record)
        }
        WriteOutcome::NotFound => Err(NotFound(what.to_string()).into()),
        WriteOutcome::Failed(e) => Err(e.into()),
    }
}
