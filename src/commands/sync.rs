// ABOUTME: The `sync` command - one run, or a run every interval until Ctrl+C
// ABOUTME: A failed single run surfaces as a non-zero exit

use anyhow::Result;
use std::time::Duration;

use crate::config::{Config, ConfigSources};
use crate::sync::SyncDaemon;

pub struct SyncOptions {
    pub sources: ConfigSources,
    /// Repeat the run this often instead of exiting after one.
    pub interval: Option<Duration>,
}

pub async fn sync(opts: SyncOptions) -> Result<()> {
    let daemon = SyncDaemon::new(Config::load(&opts.sources)?);
    let config = daemon.config();
    tracing::info!(
        "[{}] Syncing into {}",
        config.run.mode_label(),
        config.database.describe()
    );

    match opts.interval {
        None => {
            let report = daemon.run_cycle().await?;
            tracing::info!(
                "Finished in {}ms: {} rows written",
                report.duration_ms,
                report.rows_written
            );
            Ok(())
        }
        Some(every) => {
            let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);

            let shutdown_tx_clone = shutdown_tx.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => tracing::info!("Received shutdown signal"),
                    Err(e) => tracing::error!("Failed to listen for Ctrl+C: {}", e),
                }
                let _ = shutdown_tx_clone.send(());
            });

            daemon.run(every, shutdown_rx).await
        }
    }
}
