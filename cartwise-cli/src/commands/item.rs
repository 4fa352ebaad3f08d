//! Item command - manage items on a list.

use anyhow::Result;
use cartwise_core::{Item, ItemPatch, NewItem};
use clap::{Args, Subcommand};
use tracing::info;

use super::{open_store, written};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the item command.
#[derive(Args)]
pub struct ItemArgs {
    #[command(subcommand)]
    pub action: ItemAction,
}

/// Item subcommands.
#[derive(Subcommand)]
pub enum ItemAction {
    /// Add an item to a list.
    Add {
        /// List id.
        list_id: String,
        /// Product name.
        name: String,
        /// Quantity.
        #[arg(long = "qty", short = 'n')]
        quantity: Option<u32>,
        /// Unit price.
        #[arg(long, short)]
        price: Option<f64>,
        /// Category label.
        #[arg(long, short)]
        category: Option<String>,
        /// Free-text note.
        #[arg(long)]
        note: Option<String>,
        /// Icon or emoji.
        #[arg(long)]
        icon: Option<String>,
    },

    /// Change an item.
    Edit {
        /// Item id.
        id: String,
        /// New product name.
        #[arg(long)]
        name: Option<String>,
        /// New quantity.
        #[arg(long = "qty", short = 'n')]
        quantity: Option<u32>,
        /// New unit price.
        #[arg(long, short)]
        price: Option<f64>,
        /// New category.
        #[arg(long, short, conflicts_with = "clear_category")]
        category: Option<String>,
        /// Remove the category.
        #[arg(long)]
        clear_category: bool,
        /// New note.
        #[arg(long, conflicts_with = "clear_note")]
        note: Option<String>,
        /// Remove the note.
        #[arg(long)]
        clear_note: bool,
    },

    /// Mark an item purchased.
    Check {
        /// Item id.
        id: String,
    },

    /// Mark an item not purchased.
    Uncheck {
        /// Item id.
        id: String,
    },

    /// Remove an item.
    Rm {
        /// Item id.
        id: String,
    },
}

/// Runs the item command.
pub async fn run(args: &ItemArgs, cli: &Cli) -> Result<()> {
    match &args.action {
        ItemAction::Add {
            list_id,
            name,
            quantity,
            price,
            category,
            note,
            icon,
        } => {
            let input = NewItem {
                list_id: list_id.clone(),
                name: name.clone(),
                quantity: *quantity,
                price: *price,
                purchased: false,
                category: category.clone(),
                note: note.clone(),
                icon: icon.clone(),
            };
            add_item(input, cli).await
        }
        ItemAction::Edit {
            id,
            name,
            quantity,
            price,
            category,
            clear_category,
            note,
            clear_note,
        } => {
            let patch = ItemPatch {
                name: name.clone(),
                quantity: *quantity,
                price: *price,
                category: clearable(category.as_ref(), *clear_category),
                note: clearable(note.as_ref(), *clear_note),
                ..ItemPatch::default()
            };
            update_item(id, patch, "Updated", cli).await
        }
        ItemAction::Check { id } => update_item(id, ItemPatch::purchased(true), "Checked", cli).await,
        ItemAction::Uncheck { id } => {
            update_item(id, ItemPatch::purchased(false), "Unchecked", cli).await
        }
        ItemAction::Rm { id } => remove_item(id, cli).await,
    }
}

/// Maps a set/clear flag pair onto a patch field.
fn clearable(value: Option<&String>, clear: bool) -> Option<Option<String>> {
    if clear {
        Some(None)
    } else {
        value.map(|v| Some(v.clone()))
    }
}

async fn add_item(input: NewItem, cli: &Cli) -> Result<()> {
    let store = open_store(cli).await?;
    let what = format!("list {}", input.list_id);
    let item = written(store.create_item(input).await, &what, cli)?;
    info!(id = %item.id, "Item added");
    print_item(&item, "Added", cli)
}

async fn update_item(id: &str, patch: ItemPatch, verb: &str, cli: &Cli) -> Result<()> {
    let store = open_store(cli).await?;
    let item = written(store.update_item(id, patch).await, &format!("item {id}"), cli)?;
    print_item(&item, verb, cli)
}

async fn remove_item(id: &str, cli: &Cli) -> Result<()> {
    let store = open_store(cli).await?;
    let item = written(store.delete_item(id).await, &format!("item {id}"), cli)?;
    print_item(&item, "Removed", cli)
}

fn print_item(item: &Item, verb: &str, cli: &Cli) -> Result<()> {
    match cli.format {
        OutputFormat::Text => {
            if !cli.quiet {
                let formatter = TextFormatter::new(!cli.no_color);
                println!("{verb}: {}", formatter.format_item_line(item, None));
            }
        }
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(item)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clearable() {
        let value = "Dairy".to_string();
        assert_eq!(clearable(Some(&value), false), Some(Some(value.clone())));
        assert_eq!(clearable(Some(&value), true), Some(None));
        assert_eq!(clearable(None, false), None);
    }
}
