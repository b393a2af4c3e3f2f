// ABOUTME: Sequential, offset-based paging over the finn.no search results
// ABOUTME: Stops on an empty page or once the reported match count is reached

use anyhow::{bail, Result};
use std::collections::HashMap;
use std::time::Duration;

use super::client::ListingSource;
use super::models::ListingSummary;
use super::query::SearchRequest;

/// Upper bound on pages per run, in case the API stops honouring `offset`.
pub const MAX_PAGES: usize = 500;

/// Lazily walks the result pages of one search. Pages are requested one at a
/// time, with `delay` between requests. `restart` rewinds to the first page.
pub struct Paginator<'a, S: ListingSource + ?Sized> {
    source: &'a S,
    request: &'a SearchRequest,
    delay: Duration,
    offset: usize,
    pages_fetched: usize,
    total: Option<u64>,
    exhausted: bool,
}

impl<'a, S: ListingSource + ?Sized> Paginator<'a, S> {
    pub fn new(source: &'a S, request: &'a SearchRequest, delay: Duration) -> Self {
        Self {
            source,
            request,
            delay,
            offset: 0,
            pages_fetched: 0,
            total: None,
            exhausted: false,
        }
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Match count reported by the first page, if any.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn restart(&mut self) {
        self.offset = 0;
        self.pages_fetched = 0;
        self.total = None;
        self.exhausted = false;
    }

    /// Fetch the next page. `Ok(None)` once the results are exhausted; any
    /// fetch error is returned as-is and ends the walk.
    pub async fn next_page(&mut self) -> Result<Option<Vec<ListingSummary>>> {
        if self.exhausted {
            return Ok(None);
        }
        if self.pages_fetched >= MAX_PAGES {
            bail!(
                "Gave up after {} pages at offset {}; the search API does not seem to advance",
                MAX_PAGES,
                self.offset
            );
        }

        if self.pages_fetched > 0 && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let page = match self.source.search_page(self.request, self.offset).await {
            Ok(page) => page,
            Err(e) => {
                self.exhausted = true;
                return Err(e);
            }
        };
        self.pages_fetched += 1;

        if self.pages_fetched == 1 {
            self.total = page.total;
            tracing::info!(
                "Search reports {} matches, page size {}",
                self.total
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                page.doc_count
            );
        }

        if page.doc_count == 0 {
            self.exhausted = true;
            return Ok(None);
        }

        self.offset += page.doc_count;
        if let Some(total) = self.total {
            if self.offset as u64 >= total {
                self.exhausted = true;
            }
        }

        tracing::debug!(
            "Page {} gave {} listings (offset now {})",
            self.pages_fetched,
            page.summaries.len(),
            self.offset
        );

        Ok(Some(page.summaries))
    }

    /// Walk every page and merge duplicates by id. A later sighting replaces
    /// the earlier one but keeps its position.
    pub async fn collect_all(&mut self) -> Result<Vec<ListingSummary>> {
        let mut listings: Vec<ListingSummary> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        while let Some(page) = self.next_page().await? {
            for summary in page {
                match positions.get(&summary.id) {
                    Some(&index) => {
                        tracing::debug!("Listing {} seen twice in this run", summary.id);
                        listings[index] = summary;
                    }
                    None => {
                        positions.insert(summary.id.clone(), listings.len());
                        listings.push(summary);
                    }
                }
            }
        }

        tracing::info!(
            "Fetched {} unique listings over {} pages",
            listings.len(),
            self.pages_fetched
        );

        Ok(listings)
    }
}
