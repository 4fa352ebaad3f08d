//! Queue command - inspect deferred writes.

use anyhow::Result;
use clap::Args;
use tracing::info;

use super::open_store;
use crate::output::{JsonFormatter, QueueOutput, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the queue command.
#[derive(Args)]
pub struct QueueArgs {
    /// Discard dead-lettered writes.
    #[arg(long)]
    pub clear_dead: bool,
}

/// Runs the queue command.
pub async fn run(args: &QueueArgs, cli: &Cli) -> Result<()> {
    let store = open_store(cli).await?;

    if args.clear_dead {
        let cleared = store.clear_dead_letters().await?;
        info!(count = cleared, "Dead letters cleared");
        if !cli.quiet {
            println!("Cleared {cleared} dead-lettered write(s)");
        }
        return Ok(());
    }

    let output = QueueOutput {
        pending: store.offline_queue().await,
        dead_letters: store.dead_letters().await,
    };

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_queue(&output.pending, &output.dead_letters));
        }
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(&output)?),
    }

    Ok(())
}
