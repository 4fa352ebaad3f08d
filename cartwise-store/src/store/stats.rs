//! Product statistics.

use cartwise_core::{OperationKind, ProductStat};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::payload::{StatUsePayload, encode};
use super::{Mutation, Store, encode_record};
use crate::engine::Collection;

impl Store {
    /// Every product statistic, most used first.
    pub async fn product_stats(&self) -> Vec<ProductStat> {
        let mut stats: Vec<ProductStat> = self.read_all(Collection::ProductStats).await;
        stats.sort_by(|a, b| {
            b.used_count
                .cmp(&a.used_count)
                .then_with(|| a.name.cmp(&b.name))
        });
        stats
    }

    /// Statistics for one product name.
    pub async fn product_stat(&self, name: &str) -> Option<ProductStat> {
        self.read_one(Collection::ProductStats, name).await
    }

    /// Folds one use of a product into its statistics.
    ///
    /// Failures are logged; they never fail the item write that caused them.
    /// When the current statistic cannot be read the use is queued, so replay
    /// folds it into whatever the primary holds by then.
    pub(super) async fn record_product_use(
        &self,
        name: &str,
        price: f64,
        category: Option<&str>,
        now: DateTime<Utc>,
    ) {
        let (existing, readable) = match self.lookup(Collection::ProductStats, name).await {
            Ok(existing) => (existing, true),
            Err(e) => {
                debug!(name, error = %e, "Product statistic unreadable, queueing use");
                (None, false)
            }
        };
        let stat = ProductStat::upsert(existing, name, price, category, now);

        let encoded = encode_record(&stat).and_then(|value| {
            let payload = encode(&StatUsePayload {
                name: name.to_string(),
                price,
                category: category.map(ToString::to_string),
            })?;
            Ok((value, payload))
        });
        let (value, payload) = match encoded {
            Ok(pair) => pair,
            Err(e) => {
                warn!(name, error = %e, "Could not encode product statistic");
                return;
            }
        };

        let mutation = Mutation::Put(&value);
        let kind = OperationKind::UpsertProductStat;
        let result = if readable {
            self.write(Collection::ProductStats, name, mutation, kind, payload)
                .await
        } else {
            self.defer(Collection::ProductStats, name, mutation, kind, payload)
                .await
        };
        match result {
            Ok(_) => debug!(name, used_count = stat.used_count, "Product use recorded"),
            Err(e) => warn!(name, error = %e, "Product use lost"),
        }
    }
}
