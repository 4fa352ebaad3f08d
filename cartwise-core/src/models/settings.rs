//! Profile settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::normalize_currency;
use crate::error::CoreError;

/// Theme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThemeMode {
    /// Always use light theme.
    Light,
    /// Always use dark theme.
    Dark,
    /// Follow system appearance.
    #[default]
    System,
}

impl ThemeMode {
    /// All available modes.
    pub fn all() -> &'static [ThemeMode] {
        &[ThemeMode::Light, ThemeMode::Dark, ThemeMode::System]
    }
}

impl std::fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThemeMode::Light => write!(f, "light"),
            ThemeMode::Dark => write!(f, "dark"),
            ThemeMode::System => write!(f, "system"),
        }
    }
}

impl std::str::FromStr for ThemeMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(ThemeMode::Light),
            "dark" => Ok(ThemeMode::Dark),
            "system" | "auto" => Ok(ThemeMode::System),
            other => Err(CoreError::validation(format!("unknown theme {other:?}"))),
        }
    }
}

/// User preferences. There is exactly one logical row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileSettings {
    /// Theme preference.
    pub theme: ThemeMode,
    /// Currency used for new lists.
    pub default_currency: String,
    /// Sales tax as a fraction in `[0, 1]`.
    pub tax_rate: f64,
    /// Haptic feedback toggle.
    pub haptics_enabled: bool,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl ProfileSettings {
    /// Storage key of the singleton row.
    pub const KEY: &'static str = "profile";

    /// Merges a patch into the settings.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` for a tax rate outside `[0, 1]` or a
    /// malformed currency code.
    pub fn apply(&mut self, patch: &SettingsPatch, now: DateTime<Utc>) -> Result<(), CoreError> {
        let currency = patch
            .default_currency
            .as_deref()
            .map(normalize_currency)
            .transpose()?;
        if let Some(rate) = patch.tax_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(CoreError::validation(format!(
                    "tax rate must be between 0 and 1, got {rate}"
                )));
            }
        }

        if let Some(theme) = patch.theme {
            self.theme = theme;
        }
        if let Some(currency) = currency {
            self.default_currency = currency;
        }
        if let Some(rate) = patch.tax_rate {
            self.tax_rate = rate;
        }
        if let Some(haptics) = patch.haptics_enabled {
            self.haptics_enabled = haptics;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Amount including tax.
    pub fn with_tax(&self, amount: f64) -> f64 {
        amount * (1.0 + self.tax_rate)
    }
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            theme: ThemeMode::default(),
            default_currency: "USD".to_string(),
            tax_rate: 0.0,
            haptics_enabled: true,
            updated_at: Utc::now(),
        }
    }
}

/// Merge patch for settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    /// New theme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeMode>,
    /// New default currency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_currency: Option<String>,
    /// New tax rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<f64>,
    /// New haptics toggle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub haptics_enabled: Option<bool>,
}

impl SettingsPatch {
    /// Returns true when the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.theme.is_none()
            && self.default_currency.is_none()
            && self.tax_rate.is_none()
            && self.haptics_enabled.is_none()
    }
}
