//! List item types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{check_amount, double_option, normalize_name};
use crate::error::CoreError;
use crate::ids::new_id;

/// A line on a shopping list.
///
/// `purchased_at` is only ever set while `purchased` is true. The store keeps
/// the two in step when purchase state changes, but nothing stops a caller
/// from writing an inconsistent record directly into an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Unique identifier.
    pub id: String,
    /// Owning list.
    pub list_id: String,
    /// Product name (never empty). Also the key of its [`ProductStat`](super::ProductStat).
    pub name: String,
    /// How many units, at least one.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// Unit price in the list currency.
    #[serde(default)]
    pub price: f64,
    /// Whether the item has been bought.
    #[serde(default)]
    pub purchased: bool,
    /// When the item was bought.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchased_at: Option<DateTime<Utc>>,
    /// Free-form category label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Free-text note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Icon identifier or emoji.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// When the item was created.
    pub created_at: DateTime<Utc>,
    /// When the item was last modified.
    pub updated_at: DateTime<Utc>,
}

fn default_quantity() -> u32 {
    1
}

fn check_quantity(quantity: u32) -> Result<u32, CoreError> {
    if quantity == 0 {
        return Err(CoreError::validation("quantity must be at least 1"));
    }
    Ok(quantity)
}

/// Blank strings are treated as "no value" for optional text fields.
fn clean_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

impl Item {
    /// Builds a new item from creation input, assigning id and timestamps.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` for an empty name or list id, a zero
    /// quantity, or a negative price.
    pub fn create(input: &NewItem, now: DateTime<Utc>) -> Result<Self, CoreError> {
        if input.list_id.trim().is_empty() {
            return Err(CoreError::validation("item must belong to a list"));
        }
        let purchased = input.purchased;
        Ok(Self {
            id: new_id(),
            list_id: input.list_id.clone(),
            name: normalize_name("item name", &input.name)?,
            quantity: check_quantity(input.quantity.unwrap_or(1))?,
            price: check_amount("price", input.price.unwrap_or(0.0))?,
            purchased,
            purchased_at: purchased.then_some(now),
            category: clean_text(input.category.as_deref()),
            note: clean_text(input.note.as_deref()),
            icon: clean_text(input.icon.as_deref()),
            created_at: now,
            updated_at: now,
        })
    }

    /// Price times quantity.
    pub fn line_total(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }

    /// The date spending is attributed to: purchase time, else creation time.
    pub fn effective_date(&self) -> DateTime<Utc> {
        self.purchased_at.unwrap_or(self.created_at)
    }

    /// Merges a patch into this item and refreshes `updated_at`.
    ///
    /// Marking an item purchased stamps `purchased_at` (unless the patch
    /// supplies one); un-marking clears it. The item is left untouched when
    /// validation fails.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if a provided field is invalid.
    pub fn apply(&mut self, patch: &ItemPatch, now: DateTime<Utc>) -> Result<(), CoreError> {
        let name = patch
            .name
            .as_deref()
            .map(|n| normalize_name("item name", n))
            .transpose()?;
        let quantity = patch.quantity.map(check_quantity).transpose()?;
        let price = patch.price.map(|p| check_amount("price", p)).transpose()?;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(quantity) = quantity {
            self.quantity = quantity;
        }
        if let Some(price) = price {
            self.price = price;
        }
        if let Some(category) = &patch.category {
            self.category = clean_text(category.as_deref());
        }
        if let Some(note) = &patch.note {
            self.note = clean_text(note.as_deref());
        }
        if let Some(icon) = &patch.icon {
            self.icon = clean_text(icon.as_deref());
        }

        match patch.purchased {
            Some(true) => {
                self.purchased = true;
                self.purchased_at = patch
                    .purchased_at
                    .or(self.purchased_at)
                    .or(Some(now));
            }
            Some(false) => {
                self.purchased = false;
                self.purchased_at = None;
            }
            None => {
                if self.purchased && patch.purchased_at.is_some() {
                    self.purchased_at = patch.purchased_at;
                }
            }
        }

        self.updated_at = now;
        Ok(())
    }
}

// ============================================================================
// Inputs
// ============================================================================

/// Input for creating an item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    /// Owning list.
    pub list_id: String,
    /// Product name.
    pub name: String,
    /// Defaults to 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    /// Defaults to 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Create the item already purchased.
    #[serde(default)]
    pub purchased: bool,
    /// Category label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Free-text note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Icon identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl NewItem {
    /// Creates input for `name` on `list_id` with defaults for everything else.
    pub fn new(list_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            list_id: list_id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the unit price.
    #[must_use]
    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    /// Sets the quantity.
    #[must_use]
    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = Some(quantity);
        self
    }

    /// Sets the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// Merge patch for an item.
///
/// `category`, `note` and `icon` are doubly optional: `Some(None)` clears the
/// field, `None` leaves it alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    /// New product name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New quantity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    /// New unit price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// New purchase state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchased: Option<bool>,
    /// Explicit purchase time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchased_at: Option<DateTime<Utc>>,
    /// Set or clear the category.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option::deserialize"
    )]
    pub category: Option<Option<String>>,
    /// Set or clear the note.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option::deserialize"
    )]
    pub note: Option<Option<String>>,
    /// Set or clear the icon.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option::deserialize"
    )]
    pub icon: Option<Option<String>>,
}

impl ItemPatch {
    /// A patch that only changes purchase state.
    pub fn purchased(purchased: bool) -> Self {
        Self {
            purchased: Some(purchased),
            ..Self::default()
        }
    }

    /// Whether applying this patch should refresh the product statistics.
    pub fn touches_product_stats(&self) -> bool {
        self.name.is_some() || self.price.is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================
