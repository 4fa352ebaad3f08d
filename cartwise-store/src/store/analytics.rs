//! Aggregates computed from stored records.

use cartwise_core::analytics::{budget_status, list_summary};
use cartwise_core::{BudgetStatus, ListSummary, ProfileAnalytics, ShoppingList};
use chrono::{DateTime, Utc};

use super::Store;
use crate::engine::Collection;

impl Store {
    /// Profile statistics over every stored record.
    pub async fn analytics(&self, now: DateTime<Utc>) -> ProfileAnalytics {
        let lists: Vec<ShoppingList> = self.read_all(Collection::Lists).await;
        let items = self.items().await;
        let stats = self.product_stats().await;
        ProfileAnalytics::compute(&lists, &items, &stats, now)
    }

    /// Totals for a visible list.
    pub async fn list_summary(&self, list_id: &str) -> Option<ListSummary> {
        self.list(list_id).await?;
        Some(list_summary(&self.items_for_list(list_id).await))
    }

    /// Every budget evaluated against purchased items at `now`.
    pub async fn budget_statuses(&self, now: DateTime<Utc>) -> Vec<BudgetStatus> {
        let items = self.items().await;
        self.budgets()
            .await
            .iter()
            .map(|budget| budget_status(budget, &items, now))
            .collect()
    }
}
