//! Budget types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{check_amount, normalize_name};
use crate::error::CoreError;
use crate::ids::new_id;

/// How often a budget resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    /// Resets every week.
    Weekly,
    /// Resets every month.
    #[default]
    Monthly,
    /// Resets every year.
    Yearly,
}

impl BudgetPeriod {
    /// All available periods.
    pub fn all() -> &'static [BudgetPeriod] {
        &[BudgetPeriod::Weekly, BudgetPeriod::Monthly, BudgetPeriod::Yearly]
    }
}

impl std::fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BudgetPeriod::Weekly => write!(f, "weekly"),
            BudgetPeriod::Monthly => write!(f, "monthly"),
            BudgetPeriod::Yearly => write!(f, "yearly"),
        }
    }
}

impl std::str::FromStr for BudgetPeriod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" | "week" => Ok(BudgetPeriod::Weekly),
            "monthly" | "month" => Ok(BudgetPeriod::Monthly),
            "yearly" | "year" => Ok(BudgetPeriod::Yearly),
            other => Err(CoreError::validation(format!("unknown budget period {other:?}"))),
        }
    }
}

/// A spending target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Target amount.
    pub amount: f64,
    /// Reset period.
    pub period: BudgetPeriod,
    /// Categories counted against this budget.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Spend accumulated so far.
    #[serde(default)]
    pub spent: f64,
    /// When the budget was created.
    pub created_at: DateTime<Utc>,
    /// When the budget was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Budget {
    /// Builds a new budget from creation input.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` for an empty name or negative amount.
    pub fn create(input: &NewBudget, now: DateTime<Utc>) -> Result<Self, CoreError> {
        Ok(Self {
            id: new_id(),
            name: normalize_name("budget name", &input.name)?,
            amount: check_amount("budget amount", input.amount)?,
            period: input.period,
            categories: input.categories.clone(),
            spent: 0.0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Merges a patch into this budget.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if a provided field is invalid.
    pub fn apply(&mut self, patch: &BudgetPatch, now: DateTime<Utc>) -> Result<(), CoreError> {
        let name = patch
            .name
            .as_deref()
            .map(|n| normalize_name("budget name", n))
            .transpose()?;
        let amount = patch
            .amount
            .map(|a| check_amount("budget amount", a))
            .transpose()?;
        let spent = patch
            .spent
            .map(|s| check_amount("budget spend", s))
            .transpose()?;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(amount) = amount {
            self.amount = amount;
        }
        if let Some(spent) = spent {
            self.spent = spent;
        }
        if let Some(period) = patch.period {
            self.period = period;
        }
        if let Some(categories) = &patch.categories {
            self.categories.clone_from(categories);
        }
        self.updated_at = now;
        Ok(())
    }

    /// What is left before the target is reached, never negative.
    pub fn remaining(&self) -> f64 {
        (self.amount - self.spent).max(0.0)
    }

    /// Fraction of the target spent. Exceeds 1.0 when over budget.
    pub fn progress(&self) -> f64 {
        if self.amount > 0.0 {
            self.spent / self.amount
        } else {
            0.0
        }
    }

    /// Returns true when spend has passed the target.
    pub fn is_over(&self) -> bool {
        self.spent > self.amount
    }

    /// Whether an item in `category` counts toward this budget.
    ///
    /// A budget with no categories covers everything.
    pub fn covers(&self, category: Option<&str>) -> bool {
        if self.categories.is_empty() {
            return true;
        }
        category.is_some_and(|c| self.categories.iter().any(|b| b.eq_ignore_ascii_case(c)))
    }
}

/// Input for creating a budget.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBudget {
    /// Display name.
    pub name: String,
    /// Target amount.
    pub amount: f64,
    /// Reset period.
    #[serde(default)]
    pub period: BudgetPeriod,
    /// Categories counted against the budget.
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Merge patch for a budget.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetPatch {
    /// New name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New target amount.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    /// New period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<BudgetPeriod>,
    /// Replacement category list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    /// Overwrite accumulated spend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spent: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groceries() -> Budget {
        Budget::create(
            &NewBudget {
                name: "Groceries".to_string(),
                amount: 200.0,
                period: BudgetPeriod::Monthly,
                categories: vec!["Dairy".to_string(), "Bakery".to_string()],
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_remaining_and_progress() {
        let mut budget = groceries();
        budget.spent = 50.0;
        assert!((budget.remaining() - 150.0).abs() < f64::EPSILON);
        assert!((budget.progress() - 0.25).abs() < f64::EPSILON);
        assert!(!budget.is_over());

        budget.spent = 250.0;
        assert!(budget.remaining().abs() < f64::EPSILON);
        assert!(budget.is_over());
    }

    #[test]
    fn test_zero_amount_progress() {
        let mut budget = groceries();
        budget.amount = 0.0;
        assert!(budget.progress().abs() < f64::EPSILON);
    }

    #[test]
    fn test_covers_categories() {
        let budget = groceries();
        assert!(budget.covers(Some("dairy")));
        assert!(!budget.covers(Some("Electronics")));
        assert!(!budget.covers(None));

        let mut catch_all = groceries();
        catch_all.categories.clear();
        assert!(catch_all.covers(None));
    }

    #[test]
    fn test_period_parse_and_display() {
        for period in BudgetPeriod::all() {
            let parsed: BudgetPeriod = period.to_string().parse().unwrap();
            assert_eq!(parsed, *period);
        }
        assert!("fortnightly".parse::<BudgetPeriod>().is_err());
    }

    #[test]
    fn test_negative_amount_rejected() {
        let result = Budget::create(
            &NewBudget {
                name: "Bad".to_string(),
                amount: -1.0,
                ..NewBudget::default()
            },
            Utc::now(),
        );
        assert!(result.is_err());
    }
}
