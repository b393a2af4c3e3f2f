// ABOUTME: HTTP client for the finn.no search API and listing pages
// ABOUTME: Defines the ListingSource seam the synchronizer fetches through

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use super::detail::parse_detail_page;
use super::models::{ListingDetail, ListingSummary, SearchPage};
use super::query::SearchRequest;
use super::ApiError;
use crate::utils::truncate_for_log;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36";

/// Where listings come from. Each call is one request; callers decide ordering.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch the result page starting at `offset`.
    async fn search_page(&self, request: &SearchRequest, offset: usize) -> Result<SearchPage>;

    /// Fetch the fields that only the listing page carries.
    async fn listing_detail(&self, summary: &ListingSummary) -> Result<ListingDetail>;
}

pub struct FinnClient {
    client: Client,
}

impl FinnClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ListingSource for FinnClient {
    async fn search_page(&self, request: &SearchRequest, offset: usize) -> Result<SearchPage> {
        let url = request.page_url(offset);
        tracing::debug!("Fetching search page at offset {}", offset);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Failed to reach finn.no search API at {}", url))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read search response from {}", url))?;

        Ok(decode_search_response(url.as_str(), status, &body)?)
    }

    async fn listing_detail(&self, summary: &ListingSummary) -> Result<ListingDetail> {
        let response = self
            .client
            .get(&summary.url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch listing page {}", summary.url))?;

        let response = response
            .error_for_status()
            .with_context(|| format!("Listing page {} returned an error status", summary.url))?;

        let html = response
            .text()
            .await
            .with_context(|| format!("Failed to read listing page {}", summary.url))?;

        Ok(parse_detail_page(&html))
    }
}

/// Turn a search response into a page. Any non-2xx status is an error,
/// whatever the body says.
fn decode_search_response(
    url: &str,
    status: StatusCode,
    body: &str,
) -> Result<SearchPage, ApiError> {
    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            url: url.to_string(),
            body: truncate_for_log(body, 300),
        });
    }

    let json: serde_json::Value = serde_json::from_str(body).map_err(|e| ApiError::NotJson {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    SearchPage::from_json(json)
}
