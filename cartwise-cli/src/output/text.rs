//! Text output formatting with progress bars and colors.

use cartwise_core::{
    BudgetStatus, Item, ListSummary, OfflineOperation, ProductStat, ProfileAnalytics,
    ProfileSettings, ShoppingList,
};
use cartwise_store::ReplayReport;
use chrono::{DateTime, Local, Utc};

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";

// Progress bar characters
const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    bar_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            bar_width: 10,
        }
    }

    /// Set the progress bar width.
    #[allow(dead_code)]
    pub fn with_bar_width(mut self, width: usize) -> Self {
        self.bar_width = width;
        self
    }

    // ========================================================================
    // Lists and items
    // ========================================================================

    /// Formats the overview of all lists.
    pub fn format_lists(&self, lists: &[(ShoppingList, ListSummary)]) -> String {
        if lists.is_empty() {
            return self.dim("No lists yet. Create one with `cartwise list create <NAME>`");
        }

        let mut lines = Vec::new();
        lines.push(self.bold("Shopping Lists"));
        lines.push("─".repeat(50));

        for (list, summary) in lists {
            lines.push(format!(
                "{:<24} {} {:>2}/{:<2} {}",
                list.name,
                self.progress_bar(completion(summary)),
                summary.purchased_count,
                summary.item_count,
                self.format_money(summary.total_value, &list.currency),
            ));
            lines.push(format!("  {}", self.dim(&list.id)));
        }

        lines.join("\n")
    }

    /// Formats a list with its items and totals.
    pub fn format_list_detail(
        &self,
        list: &ShoppingList,
        items: &[Item],
        summary: &ListSummary,
    ) -> String {
        let mut lines = Vec::new();

        lines.push(format!("{} ({})", self.bold(&list.name), list.currency));
        lines.push(self.dim(&format!(
            "{} · updated {}",
            list.id,
            format_timestamp(list.updated_at)
        )));
        lines.push("─".repeat(50));

        if items.is_empty() {
            lines.push(self.dim("No items"));
        } else {
            for item in items {
                lines.push(self.format_item_line(item, Some(&list.currency)));
            }
        }

        lines.push(String::new());
        lines.push(format!(
            "{} {}/{} bought",
            self.progress_bar(completion(summary)),
            summary.purchased_count,
            summary.item_count
        ));
        lines.push(format!(
            "Total:     {}",
            self.format_money(summary.total_value, &list.currency)
        ));
        lines.push(format!(
            "Purchased: {}",
            self.green(&self.format_money(summary.purchased_value, &list.currency))
        ));

        lines.join("\n")
    }

    /// Formats one item as a checklist line.
    pub fn format_item_line(&self, item: &Item, currency: Option<&str>) -> String {
        let check = if item.purchased {
            self.green("[x]")
        } else {
            "[ ]".to_string()
        };
        let name = if item.purchased {
            self.dim(&item.name)
        } else {
            item.name.clone()
        };

        let mut line = format!("{check} {name}");
        if item.quantity > 1 {
            line.push_str(&format!(" ×{}", item.quantity));
        }
        if item.price > 0.0 {
            let total = match currency {
                Some(currency) => self.format_money(item.line_total(), currency),
                None => format!("{:.2}", item.line_total()),
            };
            line.push_str(&format!("  {total}"));
        }
        if let Some(category) = &item.category {
            line.push_str(&format!("  {}", self.cyan(category)));
        }
        line.push_str(&format!("  {}", self.dim(&item.id)));
        if let Some(note) = &item.note {
            line.push_str(&format!("\n      {}", self.dim(note)));
        }

        line
    }

    // ========================================================================
    // Budgets and statistics
    // ========================================================================

    /// Formats budgets with their spend for the current period.
    pub fn format_budgets(&self, statuses: &[BudgetStatus]) -> String {
        if statuses.is_empty() {
            return self.dim("No budgets. Add one with `cartwise budget add <NAME> <AMOUNT>`");
        }

        let mut lines = Vec::new();
        lines.push(self.bold("Budgets"));
        lines.push("─".repeat(50));

        for status in statuses {
            let bar = self.color_for_spend(status.progress, &self.progress_bar(status.progress));
            let left = if status.over {
                self.red(&format!("over by {:.2}", -status.remaining))
            } else {
                format!("{:.2} left", status.remaining)
            };
            lines.push(format!(
                "{:<16} {} {:.2} / {:.2}  {}",
                status.name, bar, status.spent, status.amount, left
            ));
            lines.push(format!("  {}", self.dim(&status.budget_id)));
        }

        lines.join("\n")
    }

    /// Formats the profile statistics.
    pub fn format_analytics(&self, analytics: &ProfileAnalytics, currency: &str) -> String {
        let mut lines = Vec::new();

        lines.push(self.bold("Spending Statistics"));
        lines.push("─".repeat(40));
        lines.push(format!("Lists:          {}", analytics.list_count));
        lines.push(format!(
            "Items:          {} ({} bought)",
            analytics.item_count, analytics.purchased_count
        ));
        lines.push(format!(
            "Total spend:    {}",
            self.green(&self.format_money(analytics.total_spend, currency))
        ));
        lines.push(format!(
            "Avg list value: {}",
            self.format_money(analytics.average_list_value, currency)
        ));

        if !analytics.top_categories.is_empty() {
            lines.push(String::new());
            lines.push(self.dim("Top categories:"));
            for category in &analytics.top_categories {
                lines.push(format!(
                    "  {:<16} {:>4} × {}",
                    category.category,
                    category.quantity,
                    self.format_money(category.spend, currency)
                ));
            }
        }

        if !analytics.monthly_spending.is_empty() {
            lines.push(String::new());
            lines.push(self.dim("Monthly spending:"));
            let peak = analytics
                .monthly_spending
                .iter()
                .map(|m| m.amount)
                .fold(0.0_f64, f64::max);
            for month in &analytics.monthly_spending {
                let fraction = if peak > 0.0 { month.amount / peak } else { 0.0 };
                lines.push(format!(
                    "  {}  {} {}",
                    month.month,
                    self.progress_bar(fraction),
                    self.format_money(month.amount, currency)
                ));
            }
        }

        if !analytics.frequent_items.is_empty() {
            lines.push(String::new());
            lines.push(self.dim("Frequently bought:"));
            for item in &analytics.frequent_items {
                lines.push(format!("  {:<20} {:>3}×", item.name, item.count));
            }
        }

        lines.join("\n")
    }

    /// Formats per-product statistics.
    pub fn format_product_stats(&self, stats: &[ProductStat]) -> String {
        if stats.is_empty() {
            return self.dim("No product statistics yet");
        }

        let mut lines = Vec::new();
        lines.push(format!(
            "{:<20} {:>5} {:>10} {:<12} {}",
            self.bold("Product"),
            self.bold("Uses"),
            self.bold("Avg price"),
            self.bold("Category"),
            self.bold("Last used")
        ));

        for stat in stats {
            lines.push(format!(
                "{:<20} {:>5} {:>10.2} {:<12} {}",
                stat.name,
                stat.used_count,
                stat.average_price,
                stat.category.as_deref().unwrap_or("−"),
                self.dim(&format_timestamp(stat.last_used))
            ));
        }

        lines.join("\n")
    }

    // ========================================================================
    // Settings and offline queue
    // ========================================================================

    /// Formats profile settings.
    pub fn format_settings(&self, settings: &ProfileSettings) -> String {
        let haptics = if settings.haptics_enabled {
            self.green("on")
        } else {
            self.dim("off")
        };

        [
            self.bold("Profile Settings"),
            "─".repeat(40),
            format!("Theme:    {}", settings.theme),
            format!("Currency: {}", settings.default_currency),
            format!("Tax rate: {:.2}%", settings.tax_rate * 100.0),
            format!("Haptics:  {haptics}"),
        ]
        .join("\n")
    }

    /// Formats pending and dead-lettered operations.
    pub fn format_queue(&self, pending: &[OfflineOperation], dead: &[OfflineOperation]) -> String {
        let mut lines = Vec::new();

        lines.push(format!("{} ({})", self.bold("Pending writes"), pending.len()));
        if pending.is_empty() {
            lines.push(self.dim("  Nothing queued"));
        }
        for op in pending {
            lines.push(self.format_operation(op));
        }

        if !dead.is_empty() {
            lines.push(String::new());
            lines.push(format!("{} ({})", self.red("Dead letters"), dead.len()));
            for op in dead {
                lines.push(self.format_operation(op));
            }
        }

        lines.join("\n")
    }

    /// Formats the counts from a replay pass.
    pub fn format_replay(&self, report: &ReplayReport) -> String {
        if report.total() == 0 {
            return self.dim("Offline queue is empty");
        }

        let mut parts = vec![self.green(&format!("{} replayed", report.replayed))];
        if report.requeued > 0 {
            parts.push(self.yellow(&format!("{} retrying", report.requeued)));
        }
        if report.deferred > 0 {
            parts.push(self.yellow(&format!("{} deferred", report.deferred)));
        }
        if report.dropped > 0 {
            parts.push(self.dim(&format!("{} dropped", report.dropped)));
        }
        if report.dead_lettered > 0 {
            parts.push(self.red(&format!("{} dead-lettered", report.dead_lettered)));
        }
        parts.join(", ")
    }

    fn format_operation(&self, op: &OfflineOperation) -> String {
        let mut line = format!(
            "  {:<20} {} {}",
            op.kind.as_str(),
            self.dim(&format_timestamp(op.enqueued_at)),
            self.dim(&op.id)
        );
        if op.attempts > 0 {
            line.push_str(&format!(" attempts={}", op.attempts));
        }
        if let Some(error) = &op.last_error {
            line.push_str(&format!("\n      {}", self.red(error)));
        }
        line
    }

    // ========================================================================
    // Bars and numbers
    // ========================================================================

    /// Formats a progress bar for a fraction in `[0, 1]`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn progress_bar(&self, fraction: f64) -> String {
        let fraction = fraction.clamp(0.0, 1.0);
        let filled = (fraction * self.bar_width as f64).round() as usize;
        let empty = self.bar_width.saturating_sub(filled);

        format!(
            "{}{}",
            BAR_FULL.to_string().repeat(filled),
            BAR_EMPTY.to_string().repeat(empty)
        )
    }

    /// Formats an amount with its currency symbol.
    pub fn format_money(&self, amount: f64, currency: &str) -> String {
        match currency_symbol(currency) {
            Some(symbol) => format!("{symbol}{amount:.2}"),
            None => format!("{amount:.2} {currency}"),
        }
    }

    // ========================================================================
    // Color/style helpers
    // ========================================================================

    fn color_for_spend(&self, fraction: f64, text: &str) -> String {
        if !self.use_colors {
            return text.to_string();
        }

        if fraction >= 1.0 {
            self.red(text)
        } else if fraction >= 0.8 {
            self.yellow(text)
        } else {
            self.green(text)
        }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }
}

#[allow(clippy::cast_precision_loss)]
fn completion(summary: &ListSummary) -> f64 {
    if summary.item_count == 0 {
        0.0
    } else {
        summary.purchased_count as f64 / summary.item_count as f64
    }
}

fn currency_symbol(currency: &str) -> Option<&'static str> {
    match currency {
        "USD" | "CAD" | "AUD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "JPY" => Some("¥"),
        _ => None,
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

// ============================================================================
// Tests
// ============================================================================
