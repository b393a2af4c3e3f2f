// ABOUTME: The listing synchronisation run - page through search, then diff and persist
// ABOUTME: Classifies each listing as new, updated, unchanged or skipped

use anyhow::Result;
use std::time::Instant;

use super::diff::{diff_records, FieldChange};
use crate::config::RunOptions;
use crate::finn::{ListingSource, ListingSummary, Paginator, SearchRequest};
use crate::store::{is_row_rejection, ListingRecord, ListingStore};
use crate::utils::format_price;

/// What happened to one listing during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    New,
    Updated(Vec<FieldChange>),
    Unchanged,
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingOutcome {
    pub id: String,
    pub outcome: Outcome,
}

/// Result of one run.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub dry_run: bool,
    /// Unique listings returned by the search.
    pub fetched: usize,
    pub outcomes: Vec<ListingOutcome>,
    /// Listing rows inserted or updated.
    pub rows_written: usize,
    pub duration_ms: u64,
}

impl SyncReport {
    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.outcome)).count()
    }

    pub fn new_count(&self) -> usize {
        self.count(|o| matches!(o, Outcome::New))
    }

    pub fn updated_count(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Updated(_)))
    }

    pub fn unchanged_count(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Unchanged))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped(_)))
    }

    /// Every change line of the run, in listing order.
    pub fn change_lines(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.outcome {
                Outcome::Updated(changes) => Some(changes),
                _ => None,
            })
            .flat_map(|changes| changes.iter().map(|c| c.to_string()))
            .collect()
    }
}

/// Runs the search → detail → diff → persist pipeline against a source and a store.
pub struct Synchronizer<'a, S: ListingSource + ?Sized> {
    source: &'a S,
    request: &'a SearchRequest,
    options: &'a RunOptions,
}

impl<'a, S: ListingSource + ?Sized> Synchronizer<'a, S> {
    pub fn new(source: &'a S, request: &'a SearchRequest, options: &'a RunOptions) -> Self {
        Self {
            source,
            request,
            options,
        }
    }

    fn mode(&self) -> &'static str {
        self.options.mode_label()
    }

    /// Walk every result page. Any page failure fails the whole fetch.
    pub async fn fetch_listings(&self) -> Result<Vec<ListingSummary>> {
        let mut paginator = Paginator::new(self.source, self.request, self.options.page_delay);
        paginator.collect_all().await
    }

    /// Fetch everything, then diff and persist.
    pub async fn run<St: ListingStore + ?Sized>(&self, store: &mut St) -> Result<SyncReport> {
        let listings = self.fetch_listings().await?;
        self.persist(&listings, store).await
    }

    /// Fetch detail for each listing, compare with the store and write
    /// changes. Writes are suppressed in dry-run mode. A statement the store
    /// rejects skips that listing; any other store error ends the run.
    pub async fn persist<St: ListingStore + ?Sized>(
        &self,
        listings: &[ListingSummary],
        store: &mut St,
    ) -> Result<SyncReport> {
        let start = Instant::now();
        let mode = self.mode();
        let mut report = SyncReport {
            dry_run: self.options.dry_run,
            fetched: listings.len(),
            ..SyncReport::default()
        };

        tracing::info!("[{}] Comparing {} listings with the database", mode, listings.len());

        for summary in listings {
            let outcome = self.sync_listing(summary, store, &mut report).await?;
            report.outcomes.push(ListingOutcome {
                id: summary.id.clone(),
                outcome,
            });
        }

        if !self.options.dry_run && self.options.record_last_run {
            if let Err(e) = store.mark_run_finished().await {
                tracing::warn!("[{}] Could not record last run: {:#}", mode, e);
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "[{}] Summary: {} new, {} changed, {} unchanged, {} skipped of {} listings",
            mode,
            report.new_count(),
            report.updated_count(),
            report.unchanged_count(),
            report.skipped_count(),
            report.fetched
        );

        Ok(report)
    }

    async fn sync_listing<St: ListingStore + ?Sized>(
        &self,
        summary: &ListingSummary,
        store: &mut St,
        report: &mut SyncReport,
    ) -> Result<Outcome> {
        let mode = self.mode();

        let detail = match self.source.listing_detail(summary).await {
            Ok(detail) => detail,
            Err(e) => {
                tracing::warn!(
                    "[{}] Skipping listing {}: could not fetch details: {:#}",
                    mode,
                    summary.id,
                    e
                );
                return Ok(Outcome::Skipped(format!("detail fetch failed: {:#}", e)));
            }
        };

        let Some(candidate) = ListingRecord::from_parts(summary, &detail) else {
            tracing::error!(
                "[{}] Cannot save listing {}: no valid price",
                mode,
                summary.id
            );
            return Ok(Outcome::Skipped("missing price".to_string()));
        };

        let existing = match store.find(&candidate.id).await {
            Ok(existing) => existing,
            Err(e) if is_row_rejection(&e) => {
                return Ok(rejected(mode, "lookup", &candidate.id, e));
            }
            Err(e) => return Err(e),
        };

        let outcome = match existing {
            None => {
                tracing::info!(
                    "[{}] New listing {}: {} ({})",
                    mode,
                    candidate.id,
                    candidate.title,
                    candidate
                        .price
                        .map(format_price)
                        .unwrap_or_default()
                );
                Outcome::New
            }
            Some(existing) => {
                let changes = diff_records(&existing, &candidate);
                if changes.is_empty() {
                    tracing::debug!("[{}] Listing {} unchanged", mode, candidate.id);
                    return Ok(Outcome::Unchanged);
                }
                let lines: Vec<String> = changes.iter().map(|c| c.to_string()).collect();
                tracing::info!(
                    "[{}] Changes for listing {}: {}",
                    mode,
                    candidate.id,
                    lines.join(", ")
                );
                Outcome::Updated(changes)
            }
        };

        if self.options.dry_run {
            return Ok(outcome);
        }

        match store.upsert(&candidate).await {
            Ok(()) => report.rows_written += 1,
            Err(e) if is_row_rejection(&e) => {
                return Ok(rejected(mode, "write", &candidate.id, e));
            }
            Err(e) => return Err(e),
        }

        if self.options.price_history {
            if let (Outcome::Updated(changes), Some(price)) = (&outcome, candidate.price) {
                if changes.iter().any(FieldChange::is_price) {
                    if let Err(e) = store.record_price_change(&candidate.id, price).await {
                        tracing::warn!(
                            "[{}] Could not record price history for {}: {:#}",
                            mode,
                            candidate.id,
                            e
                        );
                    }
                }
            }
        }

        Ok(outcome)
    }
}

fn rejected(mode: &str, action: &str, id: &str, err: anyhow::Error) -> Outcome {
    tracing::error!(
        "[{}] Store {} failed for listing {}: {:#}",
        mode,
        action,
        id,
        err
    );
    Outcome::Skipped(format!("store {} failed: {:#}", action, err))
}

/// Log the first few fetched listings when there is no database to compare with.
pub fn log_preview(listings: &[ListingSummary], mode: &str) {
    tracing::info!("[{}] Fetched {} listings from finn.no:", mode, listings.len());
    for summary in listings.iter().take(5) {
        tracing::info!(
            "  {} - {} - {} - {}",
            summary.id,
            summary.title,
            summary
                .price
                .map(format_price)
                .unwrap_or_else(|| "no price".to_string()),
            summary
                .model
                .map(|y| y.to_string())
                .unwrap_or_else(|| "?".to_string())
        );
    }
    if listings.len() > 5 {
        tracing::info!("  ... and {} more.", listings.len() - 5);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(id: &str, outcome: Outcome) -> ListingOutcome {
        ListingOutcome {
            id: id.to_string(),
            outcome,
        }
    }

    #[test]
    fn test_report_counts() {
        let report = SyncReport {
            fetched: 4,
            outcomes: vec![
                outcome("1", Outcome::New),
                outcome("2", Outcome::Unchanged),
                outcome("3", Outcome::Skipped("detail fetch failed".to_string())),
                outcome("4", Outcome::Unchanged),
            ],
            ..SyncReport::default()
        };
        assert_eq!(report.new_count(), 1);
        assert_eq!(report.updated_count(), 0);
        assert_eq!(report.unchanged_count(), 2);
        assert_eq!(report.skipped_count(), 1);
        assert!(report.change_lines().is_empty());
    }
}
