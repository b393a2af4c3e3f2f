// ABOUTME: Builds the finn.no search request from SearchCriteria
// ABOUTME: Encodes every configured filter under the API's own parameter names

use anyhow::{Context, Result};
use std::fmt;
use url::Url;

use crate::config::SearchCriteria;

/// A fully-qualified search request. Filters are kept in the order they are
/// encoded so the request can be inspected and re-paged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    base: Url,
    params: Vec<(String, String)>,
}

impl SearchRequest {
    pub fn new(base_url: &str, criteria: &SearchCriteria) -> Result<Self> {
        let base = Url::parse(base_url)
            .with_context(|| format!("Invalid search base URL '{}'", base_url))?;

        let mut params: Vec<(String, String)> = Vec::new();
        for location in &criteria.locations {
            params.push(("location".to_string(), location.clone()));
        }
        for segment in &criteria.mobile_home_segments {
            params.push(("mobile_home_segment".to_string(), segment.clone()));
        }

        let thresholds = [
            ("price_from", criteria.price_from),
            ("price_to", criteria.price_to),
            ("mileage_to", criteria.mileage_to),
            ("year_from", criteria.year_from),
            ("no_of_sleepers_from", criteria.no_of_sleepers_from),
            ("weight_to", criteria.weight_to),
        ];
        for (key, value) in thresholds {
            if let Some(value) = value {
                params.push((key.to_string(), value.to_string()));
            }
        }
        params.push(("sort".to_string(), criteria.sort.as_param().to_string()));

        Ok(Self { base, params })
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// The search URL without paging.
    pub fn url(&self) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut().extend_pairs(self.params.iter());
        url
    }

    /// The search URL for the page starting at `offset`.
    pub fn page_url(&self, offset: usize) -> Url {
        let mut url = self.url();
        url.query_pairs_mut()
            .append_pair("offset", &offset.to_string());
        url
    }
}

impl fmt::Display for SearchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}
