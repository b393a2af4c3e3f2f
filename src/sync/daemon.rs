// ABOUTME: Runs the synchronizer once or on a fixed interval
// ABOUTME: Owns connection setup, the dry-run preview fallback and the repeat loop

use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

use super::job::{log_preview, SyncReport, Synchronizer};
use crate::config::Config;
use crate::finn::{FinnClient, ListingSource, SearchRequest};
use crate::store::{ListingStore, MysqlStore};

pub struct SyncDaemon {
    config: Config,
}

impl SyncDaemon {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// One full run against finn.no and the configured MySQL table.
    pub async fn run_cycle(&self) -> Result<SyncReport> {
        let client = FinnClient::new(self.config.run.request_timeout)?;
        let database = &self.config.database;
        self.run_cycle_with(&client, || MysqlStore::connect(database)).await
    }

    /// One full run: page through search, then open the store and persist.
    ///
    /// Paging finishes before `open_store` is called, so a search failure
    /// never writes anything. In dry-run mode a store that cannot be opened
    /// falls back to logging a preview of the fetched listings.
    pub async fn run_cycle_with<S, St, F, Fut>(
        &self,
        source: &S,
        open_store: F,
    ) -> Result<SyncReport>
    where
        S: ListingSource + ?Sized,
        St: ListingStore,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<St>>,
    {
        let run = &self.config.run;
        let mode = run.mode_label();

        if run.dry_run {
            tracing::info!("*** DRY RUN - nothing will be written to the database ***");
        }

        let request = SearchRequest::new(&run.search_base_url, &self.config.criteria)?;
        tracing::info!("Search URL: {}", request);

        let synchronizer = Synchronizer::new(source, &request, run);

        let listings = synchronizer
            .fetch_listings()
            .await
            .context("Fetching listings from finn.no failed")?;

        if listings.is_empty() {
            tracing::warn!("[{}] The search returned no listings", mode);
            return Ok(SyncReport {
                dry_run: run.dry_run,
                ..SyncReport::default()
            });
        }

        let mut store = match open_store().await {
            Ok(store) => store,
            Err(e) if run.dry_run => {
                tracing::warn!(
                    "[{}] No database connection, cannot compare with stored listings: {:#}",
                    mode,
                    e
                );
                log_preview(&listings, mode);
                return Ok(SyncReport {
                    dry_run: true,
                    fetched: listings.len(),
                    ..SyncReport::default()
                });
            }
            Err(e) => return Err(e),
        };

        let result = synchronizer.persist(&listings, &mut store).await;

        if let Err(e) = store.close().await {
            tracing::warn!("{:#}", e);
        }

        result
    }

    /// Run a cycle every `every` until `shutdown` fires. A failed cycle is
    /// logged and the next tick runs as usual.
    pub async fn run(
        &self,
        every: Duration,
        mut shutdown: tokio::sync::broadcast::Receiver<()>,
    ) -> Result<()> {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0u64;

        tracing::info!("Starting scheduled sync every {:?}", every);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, stopping scheduled sync");
                    break;
                }
                _ = ticker.tick() => {
                    cycles += 1;
                    tracing::info!("Starting sync cycle {}", cycles);

                    tokio::select! {
                        biased;
                        _ = shutdown.recv() => {
                            tracing::info!("Shutdown signal received during sync cycle, aborting");
                            break;
                        }
                        result = self.run_cycle() => {
                            match result {
                                Ok(report) => {
                                    tracing::info!(
                                        "Sync cycle {} completed: {} listings, {} rows written in {}ms",
                                        cycles,
                                        report.fetched,
                                        report.rows_written,
                                        report.duration_ms
                                    );
                                }
                                Err(e) => {
                                    tracing::error!("Sync cycle {} failed: {:#}", cycles, e);
                                }
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
