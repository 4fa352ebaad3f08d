// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Cartwise Core
//!
//! Core types, models, and aggregators for the Cartwise shopping list engine.
//!
//! This crate provides the foundational abstractions used across all other
//! Cartwise crates, including:
//!
//! - Domain models (lists, items, product statistics, budgets, settings)
//! - Creation inputs and merge patches for every mutable entity
//! - Offline operation records
//! - Identifier generation
//! - Pure spending aggregators
//!
//! ## Key Types
//!
//! ### Entities
//! - [`ShoppingList`] - A named list with a currency, soft-deletable
//! - [`Item`] - A line on a list with quantity, price and purchase state
//! - [`ProductStat`] - Usage statistics keyed by item name
//! - [`Budget`] - A spending target for a period and set of categories
//! - [`ProfileSettings`] - Singleton user preferences
//!
//! ### Offline
//! - [`OfflineOperation`] - A deferred write awaiting replay
//! - [`OperationKind`] - Which store operation a deferred write replays
//!
//! ### Analytics
//! - [`ProfileAnalytics`] - Every aggregate in one value
//! - [`ListSummary`] - Totals for a single list

pub mod analytics;
pub mod error;
pub mod ids;
pub mod models;

// Re-export error types
pub use error::CoreError;

// Re-export all model types
pub use models::{
    // Lists
    ListPatch,
    NewList,
    ShoppingList,
    // Items
    Item,
    ItemPatch,
    NewItem,
    // Product statistics
    ProductStat,
    // Budgets
    Budget,
    BudgetPatch,
    BudgetPeriod,
    NewBudget,
    // Settings
    ProfileSettings,
    SettingsPatch,
    ThemeMode,
    // Offline
    OfflineOperation,
    OperationKind,
};

pub use analytics::{
    BudgetStatus, CategorySpend, FrequentItem, ListSummary, MonthlySpend, ProfileAnalytics,
};
pub use ids::new_id;
