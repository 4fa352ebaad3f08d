//! List command - manage shopping lists.

use anyhow::Result;
use cartwise_core::{ListPatch, NewList};
use clap::{Args, Subcommand};
use tracing::info;

use super::{NotFound, open_store, written};
use crate::output::{JsonFormatter, ListDetailOutput, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the list command.
#[derive(Args, Default)]
pub struct ListArgs {
    #[command(subcommand)]
    pub action: Option<ListAction>,
}

/// List subcommands.
#[derive(Subcommand)]
pub enum ListAction {
    /// Show all lists (default).
    Ls,

    /// Create a list.
    Create {
        /// List name.
        name: String,
        /// Currency code (defaults to the settings currency).
        #[arg(long, short)]
        currency: Option<String>,
    },

    /// Show a list with its items.
    Show {
        /// List id.
        id: String,
    },

    /// Rename a list or change its currency.
    Rename {
        /// List id.
        id: String,
        /// New name.
        name: String,
        /// New currency code.
        #[arg(long, short)]
        currency: Option<String>,
    },

    /// Delete a list (its items are hidden, not removed).
    Delete {
        /// List id.
        id: String,
    },
}

/// Runs the list command.
pub async fn run(args: &ListArgs, cli: &Cli) -> Result<()> {
    match args.action.as_ref().unwrap_or(&ListAction::Ls) {
        ListAction::Ls => show_lists(cli).await,
        ListAction::Create { name, currency } => create_list(name, currency.as_deref(), cli).await,
        ListAction::Show { id } => show_list(id, cli).await,
        ListAction::Rename { id, name, currency } => {
            rename_list(id, name, currency.as_deref(), cli).await
        }
        ListAction::Delete { id } => delete_list(id, cli).await,
    }
}

async fn show_lists(cli: &Cli) -> Result<()> {
    let store = open_store(cli).await?;
    let lists = store.lists().await;

    match cli.format {
        OutputFormat::Text => {
            let mut rows = Vec::with_capacity(lists.len());
            for list in &lists {
                let summary = store.list_summary(&list.id).await.unwrap_or_default();
                rows.push((list.clone(), summary));
            }
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_lists(&rows));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&lists)?);
        }
    }

    Ok(())
}

async fn create_list(name: &str, currency: Option<&str>, cli: &Cli) -> Result<()> {
    let store = open_store(cli).await?;
    let mut input = NewList::named(name);
    if let Some(currency) = currency {
        input = input.with_currency(currency);
    }

    let list = written(store.create_list(input).await, "list", cli)?;
    info!(id = %list.id, "List created");

    match cli.format {
        OutputFormat::Text => {
            if !cli.quiet {
                println!("Created list {} ({})", list.name, list.id);
            }
        }
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(&list)?),
    }
    Ok(())
}

async fn show_list(id: &str, cli: &Cli) -> Result<()> {
    let store = open_store(cli).await?;
    let list = store
        .list(id)
        .await
        .ok_or_else(|| NotFound(format!("list {id}")))?;
    let items = store.items_for_list(id).await;
    let summary = store.list_summary(id).await.unwrap_or_default();

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_list_detail(&list, &items, &summary));
        }
        OutputFormat::Json => {
            let output = ListDetailOutput {
                list,
                items,
                summary,
            };
            println!("{}", JsonFormatter::new(cli.pretty).format(&output)?);
        }
    }
    Ok(())
}

async fn rename_list(id: &str, name: &str, currency: Option<&str>, cli: &Cli) -> Result<()> {
    let store = open_store(cli).await?;
    let patch = ListPatch {
        name: Some(name.to_string()),
        currency: currency.map(ToString::to_string),
    };
    let list = written(store.update_list(id, patch).await, &format!("list {id}"), cli)?;

    match cli.format {
        OutputFormat::Text => {
            if !cli.quiet {
                println!("Renamed list to {}", list.name);
            }
        }
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(&list)?),
    }
    Ok(())
}

async fn delete_list(id: &str, cli: &Cli) -> Result<()> {
    let store = open_store(cli).await?;
    let list = written(store.delete_list(id).await, &format!("list {id}"), cli)?;
    info!(id = %list.id, "List deleted");

    match cli.format {
        OutputFormat::Text => {
            if !cli.quiet {
                println!("Deleted list {}", list.name);
            }
        }
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(&list)?),
    }
    Ok(())
}
