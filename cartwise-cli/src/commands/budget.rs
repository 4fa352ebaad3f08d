//! Budget command - manage spending budgets.

use anyhow::Result;
use cartwise_core::{BudgetPeriod, NewBudget};
use chrono::Utc;
use clap::{Args, Subcommand};

use super::{open_store, written};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the budget command.
#[derive(Args)]
pub struct BudgetArgs {
    #[command(subcommand)]
    pub action: Option<BudgetAction>,
}

/// Budget subcommands.
#[derive(Subcommand)]
pub enum BudgetAction {
    /// Show budgets with current spend (default).
    Ls,

    /// Add a budget.
    Add {
        /// Budget name.
        name: String,
        /// Target amount.
        amount: f64,
        /// Period: weekly, monthly or yearly.
        #[arg(long, short, default_value = "monthly")]
        period: BudgetPeriod,
        /// Category counted against the budget (repeatable; none means all).
        #[arg(long = "category", short)]
        categories: Vec<String>,
    },

    /// Remove a budget.
    Rm {
        /// Budget id.
        id: String,
    },
}

/// Runs the budget command.
pub async fn run(args: &BudgetArgs, cli: &Cli) -> Result<()> {
    match args.action.as_ref().unwrap_or(&BudgetAction::Ls) {
        BudgetAction::Ls => show_budgets(cli).await,
        BudgetAction::Add {
            name,
            amount,
            period,
            categories,
        } => {
            let input = NewBudget {
                name: name.clone(),
                amount: *amount,
                period: *period,
                categories: categories.clone(),
            };
            add_budget(input, cli).await
        }
        BudgetAction::Rm { id } => remove_budget(id, cli).await,
    }
}

async fn show_budgets(cli: &Cli) -> Result<()> {
    let store = open_store(cli).await?;
    let statuses = store.budget_statuses(Utc::now()).await;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_budgets(&statuses));
        }
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(&statuses)?),
    }
    Ok(())
}

async fn add_budget(input: NewBudget, cli: &Cli) -> Result<()> {
    let store = open_store(cli).await?;
    let budget = written(store.create_budget(input).await, "budget", cli)?;

    match cli.format {
        OutputFormat::Text => {
            if !cli.quiet {
                println!(
                    "Created {} budget {} ({})",
                    budget.period, budget.name, budget.id
                );
            }
        }
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(&budget)?),
    }
    Ok(())
}

async fn remove_budget(id: &str, cli: &Cli) -> Result<()> {
    let store = open_store(cli).await?;
    let budget = written(store.delete_budget(id).await, &format!("budget {id}"), cli)?;

    match cli.format {
        OutputFormat::Text => {
            if !cli.quiet {
                println!("Removed budget {}", budget.name);
            }
        }
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(&budget)?),
    }
    Ok(())
}
