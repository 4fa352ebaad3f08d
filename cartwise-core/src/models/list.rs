//! Shopping list types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{normalize_currency, normalize_name};
use crate::error::CoreError;
use crate::ids::new_id;

// ============================================================================
// Shopping List
// ============================================================================

/// A named shopping list.
///
/// Lists are never physically removed by normal operations. Deleting a list
/// stamps `deleted_at`, after which every regular read treats it as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingList {
    /// Unique identifier.
    pub id: String,
    /// Display name (never empty).
    pub name: String,
    /// Three-letter currency code, upper case.
    pub currency: String,
    /// When the list was created.
    pub created_at: DateTime<Utc>,
    /// When the list was last modified.
    pub updated_at: DateTime<Utc>,
    /// Soft-deletion marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ShoppingList {
    /// Builds a new list from creation input, assigning id and timestamps.
    ///
    /// `default_currency` is used when the input does not name one.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` for an empty name or a malformed
    /// currency code.
    pub fn create(
        input: &NewList,
        default_currency: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        let currency = input.currency.as_deref().unwrap_or(default_currency);
        Ok(Self {
            id: new_id(),
            name: normalize_name("list name", &input.name)?,
            currency: normalize_currency(currency)?,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    /// Returns true once the list has been soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Merges a patch into this list and refreshes `updated_at`.
    ///
    /// The list is left untouched when validation fails.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if a provided field is invalid.
    pub fn apply(&mut self, patch: &ListPatch, now: DateTime<Utc>) -> Result<(), CoreError> {
        let name = patch
            .name
            .as_deref()
            .map(|n| normalize_name("list name", n))
            .transpose()?;
        let currency = patch
            .currency
            .as_deref()
            .map(normalize_currency)
            .transpose()?;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(currency) = currency {
            self.currency = currency;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Stamps the soft-deletion marker.
    pub fn mark_deleted(&mut self, now: DateTime<Utc>) {
        self.deleted_at = Some(now);
        self.updated_at = now;
    }
}

// ============================================================================
// Inputs
// ============================================================================

/// Input for creating a list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewList {
    /// Display name.
    pub name: String,
    /// Currency code; the profile default is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl NewList {
    /// Creates input with just a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            currency: None,
        }
    }

    /// Sets the currency code.
    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }
}

/// Merge patch for a list. Only provided fields change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPatch {
    /// New display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New currency code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
