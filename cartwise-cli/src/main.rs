// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! Cartwise CLI - offline-first shopping lists from the command line.
//!
//! # Examples
//!
//! ```bash
//! # Show lists (default command)
//! cartwise
//!
//! # Create a list and add items
//! cartwise list create "Weekly Groceries" --currency EUR
//! cartwise item add <LIST_ID> Milk --price 2.00
//! cartwise item check <ITEM_ID>
//!
//! # Spending statistics as JSON
//! cartwise stats --format json --pretty
//!
//! # Replay writes that were queued while the database was unavailable
//! cartwise sync
//! ```

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{budget, config, item, list, queue, settings, stats, sync};

// ============================================================================
// CLI Definition
// ============================================================================

/// Cartwise CLI - offline-first shopping lists.
#[derive(Parser)]
#[command(name = "cartwise")]
#[command(about = "Offline-first shopping list CLI")]
#[command(long_about = r#"
Cartwise keeps shopping lists, items, budgets and spending statistics in a
local SQLite database. When the database cannot be written, changes are
queued and replayed later with `cartwise sync`.

Examples:
  cartwise                                  # Show lists
  cartwise list create "Weekly Groceries"   # New list
  cartwise item add <LIST_ID> Milk -p 2     # Add an item
  cartwise stats                            # Spending statistics
  cartwise --format json list show <ID>     # JSON output
"#)]
#[command(version)]
#[command(author = "Cartwise Contributors")]
pub struct Cli {
    /// Subcommand to run. If none, runs 'list ls' by default.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Data directory (overrides the config file).
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Keep everything in memory for this run.
    #[arg(long, global = true)]
    pub in_memory: bool,

    /// Config file path.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Manage shopping lists.
    #[command(visible_alias = "l")]
    List(list::ListArgs),

    /// Manage items on a list.
    #[command(visible_alias = "i")]
    Item(item::ItemArgs),

    /// Manage budgets.
    #[command(visible_alias = "b")]
    Budget(budget::BudgetArgs),

    /// Show spending statistics.
    #[command(visible_alias = "s")]
    Stats(stats::StatsArgs),

    /// Show or change profile settings.
    Settings(settings::SettingsArgs),

    /// Replay queued offline writes.
    Sync,

    /// Show queued and dead-lettered writes.
    Queue(queue::QueueArgs),

    /// Manage configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
#[allow(dead_code)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// The named list, item or budget does not exist.
    NotFound = 2,
    /// Input was rejected by validation.
    InvalidInput = 3,
}

impl ExitCode {
    /// Picks the exit code for a command error.
    fn for_error(error: &anyhow::Error) -> Self {
        if error.downcast_ref::<commands::NotFound>().is_some() {
            return ExitCode::NotFound;
        }
        match error.downcast_ref::<cartwise_store::StoreError>() {
            Some(e) if e.is_validation() => ExitCode::InvalidInput,
            _ => ExitCode::Error,
        }
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return; // No logging in quiet mode
    }

    let filter = if verbose {
        EnvFilter::new("cartwise=debug,info")
    } else {
        EnvFilter::new("cartwise=warn")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Some(Commands::List(args)) => list::run(args, &cli).await,
        Some(Commands::Item(args)) => item::run(args, &cli).await,
        Some(Commands::Budget(args)) => budget::run(args, &cli).await,
        Some(Commands::Stats(args)) => stats::run(args, &cli).await,
        Some(Commands::Settings(args)) => settings::run(args, &cli).await,
        Some(Commands::Sync) => sync::run(&cli).await,
        Some(Commands::Queue(args)) => queue::run(args, &cli).await,
        Some(Commands::Config(args)) => config::run(args, &cli).await,
        None => {
            // Default to listing lists
            list::run(&list::ListArgs::default(), &cli).await
        }
    };

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(ExitCode::for_error(&e) as i32);
    }

    Ok(())
}
