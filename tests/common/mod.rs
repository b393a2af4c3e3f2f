// ABOUTME: In-memory stand-ins for the finn.no API and the listing table
// ABOUTME: Shared by the integration tests; pages are served in order as raw JSON

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use finn_bobil_sync::config::{
    Config, ConfigSources, RunOptions, SearchCriteria, DEFAULT_SEARCH_BASE_URL,
};
use finn_bobil_sync::finn::{
    ApiError, ListingDetail, ListingSource, ListingSummary, SearchPage, SearchRequest,
};
use finn_bobil_sync::store::{ListingRecord, ListingStore, RowRejected};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

/// A search result doc as the API sends it.
pub fn doc(id: &str, heading: &str, price: i64) -> Value {
    json!({
        "id": id,
        "heading": heading,
        "canonical_url": format!("https://www.finn.no/mobility/item/{}", id),
        "price": { "amount": price },
        "year": 2014,
        "mileage": 64500,
        "timestamp": 1_710_405_000_000i64,
    })
}

/// A results envelope without a match count, so paging runs to the empty page.
pub fn page(docs: Vec<Value>) -> Value {
    json!({ "docs": docs })
}

pub fn empty_page() -> Value {
    page(Vec::new())
}

pub fn detail(transmission: &str) -> ListingDetail {
    ListingDetail {
        transmission: transmission.to_string(),
        payload: "450 kg".to_string(),
        body_type: "Halvintegrert".to_string(),
        description: "Pen og velholdt bobil".to_string(),
    }
}

pub fn request() -> SearchRequest {
    SearchRequest::new(DEFAULT_SEARCH_BASE_URL, &SearchCriteria::default())
        .expect("default search request")
}

pub fn live_options() -> RunOptions {
    RunOptions {
        page_delay: Duration::ZERO,
        ..RunOptions::default()
    }
}

pub fn dry_run_options() -> RunOptions {
    RunOptions {
        dry_run: true,
        ..live_options()
    }
}

/// A full config for daemon-level runs. The database settings are never dialled.
pub fn config(dry_run: bool) -> Config {
    let sources = ConfigSources {
        supervisor_options: Some(
            json!({
                "databasehost": "db.invalid",
                "databaseusername": "finn",
                "databasename": "finn_no",
                "dry_run": dry_run,
                "page_delay_ms": 0,
            })
            .to_string(),
        ),
        ..ConfigSources::default()
    };
    Config::load(&sources).expect("test config")
}

/// Serves scripted pages one call at a time. Past the script it returns an
/// empty page. Detail pages default to `ListingDetail::default()`.
#[derive(Default)]
pub struct FakeSource {
    pages: Vec<Value>,
    /// Call index -> HTTP status answered instead of the scripted page.
    failing_pages: HashMap<usize, u16>,
    details: HashMap<String, std::result::Result<ListingDetail, String>>,
    offsets: Mutex<Vec<usize>>,
    detail_calls: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new(pages: Vec<Value>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    pub fn with_detail(mut self, id: &str, detail: ListingDetail) -> Self {
        self.details.insert(id.to_string(), Ok(detail));
        self
    }

    /// Answer the `index`-th page request with an HTTP error.
    pub fn with_failing_page(mut self, index: usize, status: u16) -> Self {
        self.failing_pages.insert(index, status);
        self
    }

    pub fn with_failing_detail(mut self, id: &str, reason: &str) -> Self {
        self.details.insert(id.to_string(), Err(reason.to_string()));
        self
    }

    /// Offsets requested so far, in order.
    pub fn offsets(&self) -> Vec<usize> {
        self.offsets.lock().unwrap().clone()
    }

    pub fn page_calls(&self) -> usize {
        self.offsets.lock().unwrap().len()
    }

    pub fn detail_calls(&self) -> Vec<String> {
        self.detail_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListingSource for FakeSource {
    async fn search_page(&self, request: &SearchRequest, offset: usize) -> Result<SearchPage> {
        let index = {
            let mut offsets = self.offsets.lock().unwrap();
            offsets.push(offset);
            offsets.len() - 1
        };
        if let Some(&status) = self.failing_pages.get(&index) {
            return Err(ApiError::Status {
                status,
                url: request.page_url(offset).to_string(),
                body: "<html>Forbidden</html>".to_string(),
            }
            .into());
        }
        let body = self.pages.get(index).cloned().unwrap_or_else(empty_page);
        Ok(SearchPage::from_json(body)?)
    }

    async fn listing_detail(&self, summary: &ListingSummary) -> Result<ListingDetail> {
        self.detail_calls.lock().unwrap().push(summary.id.clone());
        match self.details.get(&summary.id) {
            Some(Ok(detail)) => Ok(detail.clone()),
            Some(Err(reason)) => Err(anyhow!("HTTP 503 for {}: {}", summary.url, reason)),
            None => Ok(ListingDetail::default()),
        }
    }
}

/// The listing table, the price history and the run stamp, held in memory.
#[derive(Default)]
pub struct MemoryStore {
    pub rows: HashMap<String, ListingRecord>,
    /// Upserts issued, including overwrites.
    pub writes: usize,
    pub price_history: Vec<(String, i64)>,
    pub finished_runs: usize,
    pub closed: bool,
    /// Ids whose upsert the server refuses, as with a too-long column value.
    rejected: HashSet<String>,
    /// Id at which the connection drops; every later call fails too.
    drop_connection_at: Option<String>,
    connection_lost: bool,
}

impl MemoryStore {
    pub fn rejecting(mut self, id: &str) -> Self {
        self.rejected.insert(id.to_string());
        self
    }

    pub fn dropping_connection_at(mut self, id: &str) -> Self {
        self.drop_connection_at = Some(id.to_string());
        self
    }

    fn check_connection(&mut self, id: &str) -> Result<()> {
        if self.drop_connection_at.as_deref() == Some(id) {
            self.connection_lost = true;
        }
        if self.connection_lost {
            return Err(anyhow!("Lost connection to MySQL server during query"));
        }
        Ok(())
    }

    pub fn mutations(&self) -> usize {
        self.writes + self.price_history.len() + self.finished_runs
    }
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn find(&mut self, id: &str) -> Result<Option<ListingRecord>> {
        self.check_connection(id)?;
        Ok(self.rows.get(id).cloned())
    }

    async fn upsert(&mut self, record: &ListingRecord) -> Result<()> {
        self.check_connection(&record.id)?;
        if self.rejected.contains(&record.id) {
            return Err(anyhow::Error::new(RowRejected {
                id: record.id.clone(),
                reason: "ERROR 22001 (1406): Data too long for column 'Beskrivelse'".to_string(),
            })
            .context(format!("Failed to save listing {}", record.id)));
        }
        self.writes += 1;
        self.rows.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn record_price_change(&mut self, id: &str, price: i64) -> Result<()> {
        self.price_history.push((id.to_string(), price));
        Ok(())
    }

    async fn mark_run_finished(&mut self) -> Result<()> {
        self.finished_runs += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
