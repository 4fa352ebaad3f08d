//! Domain models for Cartwise.
//!
//! All entities serialize as camelCase JSON records, which is the form both
//! storage engines persist.
//!
//! ## Submodules
//!
//! - [`list`] - Shopping lists with soft delete
//! - [`item`] - List items and purchase state
//! - [`product_stat`] - Per-product usage statistics
//! - [`budget`] - Spending budgets
//! - [`settings`] - Profile settings singleton
//! - [`offline`] - Deferred write operations

mod budget;
mod item;
mod list;
mod offline;
mod product_stat;
mod settings;

pub use budget::{Budget, BudgetPatch, BudgetPeriod, NewBudget};
pub use item::{Item, ItemPatch, NewItem};
pub use list::{ListPatch, NewList, ShoppingList};
pub use offline::{OfflineOperation, OperationKind};
pub use product_stat::ProductStat;
pub use settings::{ProfileSettings, SettingsPatch, ThemeMode};

use crate::error::CoreError;

/// Trims a display name and rejects it when nothing is left.
pub(crate) fn normalize_name(field: &str, value: &str) -> Result<String, CoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Normalizes an ISO 4217 style currency code ("eur" -> "EUR").
pub(crate) fn normalize_currency(value: &str) -> Result<String, CoreError> {
    let code = value.trim().to_ascii_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CoreError::validation(format!(
            "currency must be a three-letter code, got {value:?}"
        )));
    }
    Ok(code)
}

/// Rejects negative, NaN and infinite amounts.
pub(crate) fn check_amount(field: &str, value: f64) -> Result<f64, CoreError> {
    if !value.is_finite() || value < 0.0 {
        return Err(CoreError::validation(format!(
            "{field} must be a finite, non-negative amount"
        )));
    }
    Ok(value)
}

/// Serde helper for patch fields that can be set, cleared, or left alone.
///
/// A missing key deserializes to `None` (via `#[serde(default)]`), while an
/// explicit `null` becomes `Some(None)`.
pub(crate) mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name_trims() {
        assert_eq!(normalize_name("name", "  Milk ").unwrap(), "Milk");
        assert!(normalize_name("name", "   ").is_err());
    }

    #[test]
    fn test_normalize_currency() {
        assert_eq!(normalize_currency("eur").unwrap(), "EUR");
        assert!(normalize_currency("EURO").is_err());
        assert!(normalize_currency("E1R").is_err());
    }

    #[test]
    fn test_check_amount() {
        assert!(check_amount("price", 0.0).is_ok());
        assert!(check_amount("price", -0.01).is_err());
        assert!(check_amount("price", f64::NAN).is_err());
        assert!(check_amount("price", f64::INFINITY).is_err());
    }
}
