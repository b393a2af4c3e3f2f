// ABOUTME: Wire shapes of the finn.no search API and the listing values built from them
// ABOUTME: Validates the results envelope and turns docs into ListingSummary values

use chrono::{Local, TimeZone};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::ApiError;
use crate::utils::UNKNOWN;

/// How `Oppdatert` is rendered, e.g. `14. Mar. 2025 09:30`.
pub const DATE_FORMAT: &str = "%d. %b. %Y %H:%M";

/// One listing as it appears on a search result page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingSummary {
    pub id: String,
    pub title: String,
    pub price: Option<i64>,
    pub url: String,
    /// Rendered last-updated time, `Ukjent` when the API gave none.
    pub updated: String,
    /// Model year.
    pub model: Option<i64>,
    pub mileage: Option<i64>,
}

/// Fields that only the listing page itself carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingDetail {
    pub transmission: String,
    pub payload: String,
    pub body_type: String,
    pub description: String,
}

pub const NOT_GIVEN: &str = "Ikke oppgitt";
pub const NOT_AVAILABLE: &str = "Ikke tilgjengelig";

impl Default for ListingDetail {
    fn default() -> Self {
        Self {
            transmission: NOT_GIVEN.to_string(),
            payload: NOT_GIVEN.to_string(),
            body_type: NOT_GIVEN.to_string(),
            description: NOT_AVAILABLE.to_string(),
        }
    }
}

/// A parsed result page.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub summaries: Vec<ListingSummary>,
    /// Number of docs on the page, including any that were skipped.
    pub doc_count: usize,
    /// `metadata.result_size.match_count`, when reported.
    pub total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawDoc {
    #[serde(default, deserialize_with = "flexible_id")]
    id: Option<String>,
    #[serde(default)]
    heading: Option<String>,
    #[serde(default)]
    canonical_url: Option<String>,
    #[serde(default)]
    price: Option<RawPrice>,
    #[serde(default)]
    year: Option<i64>,
    #[serde(default)]
    mileage: Option<i64>,
    #[serde(default)]
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawPrice {
    #[serde(default)]
    amount: Option<i64>,
}

fn flexible_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

impl SearchPage {
    /// Validate the envelope and extract summaries. A body that is not an
    /// object, or has no `docs` array, is an API error.
    pub fn from_json(body: Value) -> Result<Self, ApiError> {
        let object = match body {
            Value::Object(map) => map,
            other => {
                return Err(ApiError::UnexpectedBody {
                    kind: json_kind(&other),
                })
            }
        };

        let docs = match object.get("docs") {
            Some(Value::Array(docs)) => docs,
            _ => {
                return Err(ApiError::MissingDocs {
                    keys: object.keys().cloned().collect(),
                })
            }
        };

        let total = object
            .get("metadata")
            .and_then(|m| m.get("result_size"))
            .and_then(|r| r.get("match_count"))
            .and_then(Value::as_u64)
            .filter(|count| *count > 0);

        let mut summaries = Vec::with_capacity(docs.len());
        for doc in docs {
            match serde_json::from_value::<RawDoc>(doc.clone()) {
                Ok(raw) => {
                    if let Some(summary) = raw.into_summary() {
                        summaries.push(summary);
                    }
                }
                Err(e) => {
                    tracing::warn!("Skipping search result that could not be read: {}", e);
                }
            }
        }

        Ok(Self {
            summaries,
            doc_count: docs.len(),
            total,
        })
    }
}

impl RawDoc {
    fn into_summary(self) -> Option<ListingSummary> {
        let heading = self.heading.unwrap_or_default();
        let (id, url) = match (self.id, self.canonical_url) {
            (Some(id), Some(url)) if !url.trim().is_empty() => (id, url),
            _ => {
                let label = if heading.is_empty() { "unknown" } else { heading.as_str() };
                tracing::warn!("Skipping search result without id/url: {}", label);
                return None;
            }
        };

        Some(ListingSummary {
            id,
            title: heading,
            price: self.price.and_then(|p| p.amount),
            url,
            updated: format_timestamp(self.timestamp),
            model: self.year,
            mileage: self.mileage,
        })
    }
}

/// Render an epoch-milliseconds timestamp in local time.
pub fn format_timestamp(millis: Option<i64>) -> String {
    millis
        .and_then(|ms| Local.timestamp_millis_opt(ms).single())
        .map(|dt| dt.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
