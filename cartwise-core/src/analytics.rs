//! Spending aggregators.
//!
//! Pure functions that fold stored lists, items and product statistics into
//! the summaries shown on the profile and statistics screens. Nothing here is
//! persisted; every call recomputes from the records passed in.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{Budget, BudgetPeriod, Item, ProductStat, ShoppingList};

/// Label used for purchased items without a category.
pub const UNCATEGORIZED: &str = "Other";

/// How many categories [`top_categories`] keeps.
pub const TOP_CATEGORY_LIMIT: usize = 5;

/// How many products [`frequent_items`] keeps.
pub const FREQUENT_ITEM_LIMIT: usize = 10;

/// Length of the [`monthly_spending`] series.
pub const MONTHS_IN_SERIES: usize = 12;

// ============================================================================
// Output Types
// ============================================================================

/// Spend for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySpend {
    /// Category label.
    pub category: String,
    /// Units bought.
    pub quantity: u64,
    /// Money spent.
    pub spend: f64,
}

/// Spend for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySpend {
    /// `YYYY-MM` key.
    pub month: String,
    /// Money spent in the month.
    pub amount: f64,
}

/// A frequently bought product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequentItem {
    /// Product name.
    pub name: String,
    /// Recorded uses.
    pub count: u32,
    /// Accumulated spend from the product statistics.
    pub total_spend: f64,
}

/// Totals for the items of one list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSummary {
    /// Number of items.
    pub item_count: usize,
    /// Items already bought.
    pub purchased_count: usize,
    /// Items still to buy.
    pub remaining_count: usize,
    /// Price times quantity over every item.
    pub total_value: f64,
    /// Price times quantity over bought items.
    pub purchased_value: f64,
}

/// Every profile aggregate in one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileAnalytics {
    /// Number of visible lists.
    pub list_count: usize,
    /// Number of items across all lists.
    pub item_count: usize,
    /// Number of bought items.
    pub purchased_count: usize,
    /// See [`total_spend`].
    pub total_spend: f64,
    /// See [`average_list_value`].
    pub average_list_value: f64,
    /// See [`top_categories`].
    pub top_categories: Vec<CategorySpend>,
    /// See [`monthly_spending`].
    pub monthly_spending: Vec<MonthlySpend>,
    /// See [`frequent_items`].
    pub frequent_items: Vec<FrequentItem>,
}

impl ProfileAnalytics {
    /// Computes every aggregate from the full collections.
    pub fn compute(
        lists: &[ShoppingList],
        items: &[Item],
        stats: &[ProductStat],
        now: DateTime<Utc>,
    ) -> Self {
        let list_count = lists.iter().filter(|l| !l.is_deleted()).count();
        Self {
            list_count,
            item_count: items.len(),
            purchased_count: items.iter().filter(|i| i.purchased).count(),
            total_spend: total_spend(items),
            average_list_value: average_list_value(items, list_count),
            top_categories: top_categories(items),
            monthly_spending: monthly_spending(items, now),
            frequent_items: frequent_items(stats),
        }
    }
}

// ============================================================================
// Aggregators
// ============================================================================

fn purchased(items: &[Item]) -> impl Iterator<Item = &Item> {
    items.iter().filter(|i| i.purchased)
}

/// Sum of price times quantity over purchased items.
pub fn total_spend(items: &[Item]) -> f64 {
    purchased(items).map(Item::line_total).sum()
}

/// Total spend divided by the number of lists, or 0 with no lists.
pub fn average_list_value(items: &[Item], list_count: usize) -> f64 {
    if list_count == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let count = list_count as f64;
    total_spend(items) / count
}

/// Purchased items grouped by category, highest spend first, top five.
pub fn top_categories(items: &[Item]) -> Vec<CategorySpend> {
    let mut groups: HashMap<&str, CategorySpend> = HashMap::new();
    for item in purchased(items) {
        let label = item.category.as_deref().unwrap_or(UNCATEGORIZED);
        let entry = groups.entry(label).or_insert_with(|| CategorySpend {
            category: label.to_string(),
            quantity: 0,
            spend: 0.0,
        });
        entry.quantity += u64::from(item.quantity);
        entry.spend += item.line_total();
    }

    let mut categories: Vec<CategorySpend> = groups.into_values().collect();
    categories.sort_by(|a, b| {
        b.spend
            .total_cmp(&a.spend)
            .then_with(|| a.category.cmp(&b.category))
    });
    categories.truncate(TOP_CATEGORY_LIMIT);
    categories
}

fn month_key(year: i32, month: u32) -> String {
    format!("{year:04}-{month:02}")
}

/// Spend per calendar month for the twelve months ending with `now`'s month.
///
/// Always returns exactly twelve entries, oldest first, including months
/// with no spend. Items are attributed to their purchase date, falling back
/// to their creation date.
pub fn monthly_spending(items: &[Item], now: DateTime<Utc>) -> Vec<MonthlySpend> {
    let mut totals: HashMap<String, f64> = HashMap::new();
    for item in purchased(items) {
        let date = item.effective_date();
        *totals.entry(month_key(date.year(), date.month())).or_default() += item.line_total();
    }

    let mut year = now.year();
    let mut month = now.month();
    let mut series = Vec::with_capacity(MONTHS_IN_SERIES);
    for _ in 0..MONTHS_IN_SERIES {
        let key = month_key(year, month);
        let amount = totals.get(&key).copied().unwrap_or(0.0);
        series.push(MonthlySpend { month: key, amount });
        if month == 1 {
            month = 12;
            year -= 1;
        } else {
            month -= 1;
        }
    }
    series.reverse();
    series
}

/// Products ordered by use count, top ten.
pub fn frequent_items(stats: &[ProductStat]) -> Vec<FrequentItem> {
    let mut sorted: Vec<&ProductStat> = stats.iter().collect();
    sorted.sort_by(|a, b| b.used_count.cmp(&a.used_count).then_with(|| a.name.cmp(&b.name)));
    sorted
        .into_iter()
        .take(FREQUENT_ITEM_LIMIT)
        .map(|s| FrequentItem {
            name: s.name.clone(),
            count: s.used_count,
            total_spend: s.total_spend,
        })
        .collect()
}

/// Counts and totals for one list's items.
pub fn list_summary(items: &[Item]) -> ListSummary {
    let purchased_count = items.iter().filter(|i| i.purchased).count();
    ListSummary {
        item_count: items.len(),
        purchased_count,
        remaining_count: items.len() - purchased_count,
        total_value: items.iter().map(Item::line_total).sum(),
        purchased_value: total_spend(items),
    }
}

/// Start of the budget period containing `now` (Monday, the 1st, or Jan 1).
pub fn period_start(period: BudgetPeriod, now: DateTime<Utc>) -> DateTime<Utc> {
    let date = now.date_naive();
    let start = match period {
        BudgetPeriod::Weekly => {
            date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
        }
        BudgetPeriod::Monthly => date.with_day(1).unwrap_or(date),
        BudgetPeriod::Yearly => date.with_ordinal(1).unwrap_or(date),
    };
    Utc.from_utc_datetime(&start.and_time(chrono::NaiveTime::MIN))
}

/// Spend on purchased items covered by `budget` within its current period.
pub fn budget_spend(budget: &Budget, items: &[Item], now: DateTime<Utc>) -> f64 {
    let start = period_start(budget.period, now);
    purchased(items)
        .filter(|i| budget.covers(i.category.as_deref()))
        .filter(|i| {
            let date = i.effective_date();
            date >= start && date <= now
        })
        .map(Item::line_total)
        .sum()
}

/// A budget with its spend recomputed from purchased items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetStatus {
    /// Budget id.
    pub budget_id: String,
    /// Budget name.
    pub name: String,
    /// Target amount.
    pub amount: f64,
    /// Spend in the current period.
    pub spent: f64,
    /// Amount left, never negative.
    pub remaining: f64,
    /// Fraction of the target spent.
    pub progress: f64,
    /// Whether spend passed the target.
    pub over: bool,
}

/// Evaluates `budget` against `items` for the period containing `now`.
pub fn budget_status(budget: &Budget, items: &[Item], now: DateTime<Utc>) -> BudgetStatus {
    let mut current = budget.clone();
    current.spent = budget_spend(budget, items, now);
    BudgetStatus {
        budget_id: current.id.clone(),
        name: current.name.clone(),
        amount: current.amount,
        spent: current.spent,
        remaining: current.remaining(),
        progress: current.progress(),
        over: current.is_over(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemPatch, NewItem};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn bought(name: &str, price: f64, qty: u32, category: Option<&str>, when: DateTime<Utc>) -> Item {
        let mut input = NewItem::new("list-1", name).with_price(price).with_quantity(qty);
        input.category = category.map(ToString::to_string);
        let mut item = Item::create(&input, when).unwrap();
        item.apply(
            &ItemPatch {
                purchased: Some(true),
                purchased_at: Some(when),
                ..ItemPatch::default()
            },
            when,
        )
        .unwrap();
        item
    }

    fn open(name: &str, price: f64, qty: u32) -> Item {
        Item::create(
            &NewItem::new("list-1", name).with_price(price).with_quantity(qty),
            at(2026, 10, 1),
        )
        .unwrap()
    }

    #[test]
    fn test_total_spend_ignores_unpurchased() {
        let items = vec![
            bought("Milk", 2.0, 2, None, at(2026, 10, 2)),
            open("Bread", 1.5, 2),
        ];
        assert!((total_spend(&items) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_average_list_value() {
        let items = vec![bought("Milk", 3.0, 2, None, at(2026, 10, 2))];
        assert!((average_list_value(&items, 3) - 2.0).abs() < 1e-9);
        assert!(average_list_value(&items, 0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_top_categories_groups_and_limits() {
        let when = at(2026, 10, 2);
        let mut items = vec![
            bought("Milk", 2.0, 1, Some("Dairy"), when),
            bought("Cheese", 5.0, 1, Some("Dairy"), when),
            bought("Soap", 1.0, 3, None, when),
        ];
        for (i, cat) in ["A", "B", "C", "D", "E"].iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let price = 0.1 * (i as f64 + 1.0);
            items.push(bought("x", price, 1, Some(cat), when));
        }

        let top = top_categories(&items);
        assert_eq!(top.len(), TOP_CATEGORY_LIMIT);
        assert_eq!(top[0].category, "Dairy");
        assert!((top[0].spend - 7.0).abs() < 1e-9);
        assert_eq!(top[0].quantity, 2);
        assert_eq!(top[1].category, UNCATEGORIZED);
        assert_eq!(top[1].quantity, 3);
    }

    #[test]
    fn test_monthly_series_shape() {
        let now = at(2026, 3, 15);
        let series = monthly_spending(&[], now);
        assert_eq!(series.len(), MONTHS_IN_SERIES);
        assert_eq!(series.first().unwrap().month, "2025-04");
        assert_eq!(series.last().unwrap().month, "2026-03");
        assert!(series.iter().all(|m| m.amount.abs() < f64::EPSILON));
    }

    #[test]
    fn test_monthly_series_buckets_by_effective_date() {
        let now = at(2026, 3, 15);
        let items = vec![
            bought("Milk", 2.0, 3, None, at(2026, 3, 1)),
            bought("Eggs", 3.0, 1, None, at(2026, 1, 20)),
            bought("Tea", 4.0, 1, None, at(2025, 1, 20)),
            open("Bread", 1.5, 2),
        ];
        let series = monthly_spending(&items, now);

        let amount = |key: &str| series.iter().find(|m| m.month == key).unwrap().amount;
        assert!((amount("2026-03") - 6.0).abs() < 1e-9);
        assert!((amount("2026-01") - 3.0).abs() < 1e-9);
        // Outside the window.
        assert!(series.iter().all(|m| m.month != "2025-01"));
    }

    #[test]
    fn test_frequent_items_order() {
        let now = Utc::now();
        let mut stats: Vec<ProductStat> = (0..12)
            .map(|i| ProductStat::first_use(format!("p{i:02}"), 1.0, None, now))
            .collect();
        stats[5].record_use(1.0, None, now);
        stats[5].record_use(1.0, None, now);
        stats[7].record_use(1.0, None, now);

        let frequent = frequent_items(&stats);
        assert_eq!(frequent.len(), FREQUENT_ITEM_LIMIT);
        assert_eq!(frequent[0].name, "p05");
        assert_eq!(frequent[0].count, 3);
        assert_eq!(frequent[1].name, "p07");
    }

    #[test]
    fn test_list_summary() {
        let items = vec![
            bought("Milk", 2.0, 1, None, at(2026, 10, 2)),
            open("Bread", 1.5, 2),
            open("Eggs", 3.0, 1),
        ];
        let summary = list_summary(&items);
        assert_eq!(summary.purchased_count, 1);
        assert_eq!(summary.remaining_count, 2);
        assert!((summary.total_value - 8.0).abs() < 1e-9);
        assert!((summary.purchased_value - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_period_start() {
        // 2026-10-15 is a Thursday.
        let now = at(2026, 10, 15);
        assert_eq!(
            period_start(BudgetPeriod::Weekly, now),
            Utc.with_ymd_and_hms(2026, 10, 12, 0, 0, 0).unwrap()
        );
        assert_eq!(
            period_start(BudgetPeriod::Monthly, now),
            Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            period_start(BudgetPeriod::Yearly, now),
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_budget_spend_respects_period_and_categories() {
        let now = at(2026, 10, 15);
        let budget = Budget::create(
            &crate::models::NewBudget {
                name: "Dairy".to_string(),
                amount: 50.0,
                period: BudgetPeriod::Monthly,
                categories: vec!["Dairy".to_string()],
            },
            now,
        )
        .unwrap();
        let items = vec![
            bought("Milk", 2.0, 2, Some("Dairy"), at(2026, 10, 3)),
            bought("Cheese", 5.0, 1, Some("Dairy"), at(2026, 9, 30)),
            bought("Soap", 1.0, 1, Some("Household"), at(2026, 10, 4)),
        ];
        assert!((budget_spend(&budget, &items, now) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_budget_status_flags_overspend() {
        let now = at(2026, 10, 15);
        let budget = Budget::create(
            &crate::models::NewBudget {
                name: "Week".to_string(),
                amount: 5.0,
                period: BudgetPeriod::Weekly,
                categories: Vec::new(),
            },
            now,
        )
        .unwrap();
        let items = vec![bought("Wine", 4.0, 2, None, at(2026, 10, 13))];

        let status = budget_status(&budget, &items, now);
        assert!((status.spent - 8.0).abs() < 1e-9);
        assert!(status.over);
        assert!(status.remaining.abs() < 1e-9);
        assert!((status.progress - 1.6).abs() < 1e-9);
    }
}
