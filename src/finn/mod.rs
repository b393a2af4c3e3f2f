// ABOUTME: finn.no mobility search access - query building, paging and detail pages
// ABOUTME: Everything that talks to or understands the remote classifieds API

pub mod client;
pub mod detail;
pub mod models;
pub mod paginator;
pub mod query;

pub use client::{FinnClient, ListingSource};
pub use detail::parse_detail_page;
pub use models::{ListingDetail, ListingSummary, SearchPage};
pub use paginator::Paginator;
pub use query::SearchRequest;

/// Failures of the remote API that end a run.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("finn.no returned HTTP {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },
    #[error("finn.no did not return JSON for {url} (possibly an HTML error page): {reason}")]
    NotJson { url: String, reason: String },
    #[error("finn.no response is not a JSON object (got {kind})")]
    UnexpectedBody { kind: &'static str },
    #[error("finn.no response is missing the 'docs' field; keys present: {keys:?}. The API layout may have changed")]
    MissingDocs { keys: Vec<String> },
}
