// ABOUTME: Persisted listing rows and the store seam the synchronizer writes through
// ABOUTME: One ListingRecord per Finnkode; rows are never deleted by a run

pub mod mysql;

use anyhow::Result;
use async_trait::async_trait;

use crate::finn::{ListingDetail, ListingSummary};
use crate::utils::{format_mileage, UNKNOWN};

pub use mysql::MysqlStore;

/// The server refused a statement for one listing. The connection is still
/// usable, so the run moves on to the next listing.
#[derive(Debug, thiserror::Error)]
#[error("statement for listing {id} was rejected: {reason}")]
pub struct RowRejected {
    pub id: String,
    pub reason: String,
}

/// Whether `err` is confined to a single row rather than the connection.
pub fn is_row_rejection(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<RowRejected>())
}

/// Column names of the listing table, also used as field labels in change logs.
pub mod columns {
    pub const ID: &str = "Finnkode";
    pub const TITLE: &str = "Annonsenavn";
    pub const MODEL: &str = "Modell";
    pub const MILEAGE: &str = "Kilometerstand";
    pub const TRANSMISSION: &str = "Girkasse";
    pub const DESCRIPTION: &str = "Beskrivelse";
    pub const PAYLOAD: &str = "Nyttelast";
    pub const BODY_TYPE: &str = "Typebobil";
    pub const UPDATED: &str = "Oppdatert";
    pub const URL: &str = "URL";
    pub const PRICE: &str = "Pris";
}

/// A listing row keyed by its Finnkode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRecord {
    pub id: String,
    pub title: String,
    pub model: String,
    pub mileage: String,
    pub transmission: String,
    pub description: String,
    pub payload: String,
    pub body_type: String,
    pub updated: String,
    pub url: String,
    /// `None` only for stored rows whose price could not be read back.
    pub price: Option<i64>,
}

impl ListingRecord {
    /// Merge a search summary with its detail page. Returns `None` when the
    /// summary carries no price, since the table requires one.
    pub fn from_parts(summary: &ListingSummary, detail: &ListingDetail) -> Option<Self> {
        let price = summary.price?;
        Some(Self {
            id: summary.id.clone(),
            title: summary.title.clone(),
            model: summary
                .model
                .map(|year| year.to_string())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            mileage: format_mileage(summary.mileage),
            transmission: detail.transmission.clone(),
            description: detail.description.clone(),
            payload: detail.payload.clone(),
            body_type: detail.body_type.clone(),
            updated: summary.updated.clone(),
            url: summary.url.clone(),
            price: Some(price),
        })
    }
}

/// Lookup and upsert access to the listing table. One implementation holds
/// one connection for the duration of a run.
///
/// `find` and `upsert` report statement failures for a single listing as
/// [`RowRejected`]; any other error means the store is no longer usable.
#[async_trait]
pub trait ListingStore: Send {
    async fn find(&mut self, id: &str) -> Result<Option<ListingRecord>>;

    /// Insert the row, or overwrite every column of an existing one.
    async fn upsert(&mut self, record: &ListingRecord) -> Result<()>;

    /// Append to the price history.
    async fn record_price_change(&mut self, id: &str, price: i64) -> Result<()>;

    /// Stamp the time of the last completed run.
    async fn mark_run_finished(&mut self) -> Result<()>;

    /// Release the connection once the run is done.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
