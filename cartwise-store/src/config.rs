//! Store configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::persistence::{default_data_dir, load_json, save_json};

/// Where and how the store keeps its data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the database and fallback files.
    pub data_dir: PathBuf,
    /// SQLite database file name, relative to `data_dir`.
    pub database_file: String,
    /// Fallback key-value file name, relative to `data_dir`.
    pub fallback_file: String,
    /// Keep everything in memory (nothing touches disk).
    pub in_memory: bool,
    /// Offline queue replay policy.
    pub retry: RetryPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: "cartwise.db".to_string(),
            fallback_file: "fallback.json".to_string(),
            in_memory: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl StoreConfig {
    /// A configuration that keeps all state in memory.
    pub fn in_memory() -> Self {
        Self {
            in_memory: true,
            ..Self::default()
        }
    }

    /// A configuration rooted at `data_dir`.
    pub fn at(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Full path of the SQLite database.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    /// Full path of the fallback key-value file.
    pub fn fallback_path(&self) -> PathBuf {
        self.data_dir.join(&self.fallback_file)
    }

    /// Loads configuration from a JSON file, or defaults when it is missing.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        info!(path = %path.display(), "Loading config");
        let config: Self = load_json(path).await?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<(), StoreError> {
        save_json(path, self).await
    }

    /// Checks the configuration for values the store cannot work with.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Config` describing the first problem found.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.database_file.trim().is_empty() {
            return Err(StoreError::Config("database_file must not be empty".to_string()));
        }
        if self.fallback_file.trim().is_empty() {
            return Err(StoreError::Config("fallback_file must not be empty".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(StoreError::Config("retry.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Retry policy for offline queue replay.
///
/// A failed replay is retried after `base_delay_ms * 2^(attempts - 1)`,
/// capped at `max_delay_ms`. After `max_attempts` failures the operation is
/// moved to the dead-letter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Failed replays before an operation is dead-lettered.
    pub max_attempts: u32,
    /// First backoff delay in milliseconds.
    pub base_delay_ms: u64,
    /// Backoff ceiling in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 300_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that retries immediately, handy for tests and manual syncs.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Delay before the next replay after `attempts` failures.
    pub fn backoff(&self, attempts: u32) -> Duration {
        if attempts == 0 || self.base_delay_ms == 0 {
            return Duration::ZERO;
        }
        let factor = 1_u64.checked_shl(attempts - 1).unwrap_or(u64::MAX);
        let delay = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(delay)
    }

    /// Whether an operation with `attempts` failures should be dead-lettered.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}
