//! Stats command - spending statistics.

use anyhow::Result;
use chrono::Utc;
use clap::Args;

use super::open_store;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the stats command.
#[derive(Args)]
pub struct StatsArgs {
    /// Show per-product statistics instead of the profile summary.
    #[arg(long)]
    pub products: bool,

    /// Limit the number of products shown.
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

/// Runs the stats command.
pub async fn run(args: &StatsArgs, cli: &Cli) -> Result<()> {
    let store = open_store(cli).await?;

    if args.products {
        let mut stats = store.product_stats().await;
        if let Some(limit) = args.limit {
            stats.truncate(limit);
        }
        match cli.format {
            OutputFormat::Text => {
                let formatter = TextFormatter::new(!cli.no_color);
                println!("{}", formatter.format_product_stats(&stats));
            }
            OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(&stats)?),
        }
        return Ok(());
    }

    let analytics = store.analytics(Utc::now()).await;
    let settings = store.settings().await;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!(
                "{}",
                formatter.format_analytics(&analytics, &settings.default_currency)
            );
        }
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(&analytics)?),
    }

    Ok(())
}
