//! Per-product usage statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Usage statistics for a product, keyed by item name.
///
/// `total_spend` accumulates the unit price of each recorded use, not
/// price times quantity, so `average_price` is the mean unit price seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductStat {
    /// Item name this entry tracks.
    pub name: String,
    /// How many times the product was added or repriced.
    pub used_count: u32,
    /// Sum of recorded unit prices.
    pub total_spend: f64,
    /// Last time the product was recorded.
    pub last_used: DateTime<Utc>,
    /// `total_spend / used_count`.
    pub average_price: f64,
    /// Most recently seen category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ProductStat {
    /// Starts statistics for a product seen for the first time.
    pub fn first_use(
        name: impl Into<String>,
        price: f64,
        category: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.into(),
            used_count: 1,
            total_spend: price,
            last_used: now,
            average_price: price,
            category: category.map(ToString::to_string),
        }
    }

    /// Records another use of the product.
    ///
    /// A `None` category keeps whatever was recorded before.
    pub fn record_use(&mut self, price: f64, category: Option<&str>, now: DateTime<Utc>) {
        self.used_count = self.used_count.saturating_add(1);
        self.total_spend += price;
        self.average_price = self.total_spend / f64::from(self.used_count);
        self.last_used = now;
        if let Some(category) = category {
            self.category = Some(category.to_string());
        }
    }

    /// Folds one use into an optional existing entry.
    pub fn upsert(
        existing: Option<Self>,
        name: &str,
        price: f64,
        category: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        match existing {
            Some(mut stat) => {
                stat.record_use(price, category, now);
                stat
            }
            None => Self::first_use(name, price, category, now),
        }
    }
}
