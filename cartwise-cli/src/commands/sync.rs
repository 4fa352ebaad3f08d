//! Sync command - replay queued offline writes.

use anyhow::Result;
use tracing::{info, warn};

use super::open_store;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Runs the sync command.
pub async fn run(cli: &Cli) -> Result<()> {
    let store = open_store(cli).await?;
    let report = store.process_offline_queue().await;

    if report.dead_lettered > 0 {
        warn!(count = report.dead_lettered, "Writes moved to the dead-letter queue");
    }
    info!(
        replayed = report.replayed,
        requeued = report.requeued,
        deferred = report.deferred,
        "Offline queue processed"
    );

    match cli.format {
        OutputFormat::Text => {
            if !cli.quiet {
                let formatter = TextFormatter::new(!cli.no_color);
                println!("{}", formatter.format_replay(&report));
            }
        }
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(&report)?),
    }

    Ok(())
}
