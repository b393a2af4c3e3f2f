// ABOUTME: Extracts ListingDetail from a finn.no listing page
// ABOUTME: Reads the dl.emptycheck attribute list and the og:description meta tag

use scraper::{Html, Selector};
use std::collections::BTreeMap;

use super::models::{ListingDetail, NOT_AVAILABLE, NOT_GIVEN};

const TRANSMISSION: &str = "Girkasse";
const PAYLOAD: &str = "Nyttelast";
const BODY_TYPE: &str = "Type bobil";

/// All `dt`/`dd` pairs of the attribute list, keyed by label.
pub fn attribute_pairs(document: &Html) -> BTreeMap<String, String> {
    let mut attributes = BTreeMap::new();

    let (Some(list), Some(items)) = (
        Selector::parse("dl.emptycheck").ok(),
        Selector::parse("dt, dd").ok(),
    ) else {
        return attributes;
    };

    let Some(dl) = document.select(&list).next() else {
        return attributes;
    };

    let mut pending_key: Option<String> = None;
    for element in dl.select(&items) {
        let text = element.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        match element.value().name() {
            "dt" => pending_key = Some(text),
            "dd" => {
                if let Some(key) = pending_key.take() {
                    attributes.insert(key, text);
                }
            }
            _ => {}
        }
    }

    attributes
}

fn meta_description(document: &Html) -> Option<String> {
    let selector = Selector::parse("meta[property='og:description']").ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
}

/// Parse a listing page. Missing values fall back to the placeholders the
/// table already uses, so a sparse page never fails the listing.
pub fn parse_detail_page(html: &str) -> ListingDetail {
    let document = Html::parse_document(html);
    let attributes = attribute_pairs(&document);

    for (key, value) in &attributes {
        tracing::trace!("attribute {}: {}", key, value);
    }

    let attribute = |key: &str| {
        attributes
            .get(key)
            .filter(|value| !value.is_empty())
            .cloned()
            .unwrap_or_else(|| NOT_GIVEN.to_string())
    };

    ListingDetail {
        transmission: attribute(TRANSMISSION),
        payload: attribute(PAYLOAD),
        body_type: attribute(BODY_TYPE),
        description: meta_description(&document).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
    }
}
