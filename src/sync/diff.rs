// ABOUTME: Field-by-field comparison of a stored listing against a fresh candidate
// ABOUTME: Produces one FieldChange per differing column, labelled by column name

use std::fmt;

use crate::store::{columns, ListingRecord};
use crate::utils::truncate_for_log;

/// Longest text value shown in a change line.
const MAX_SHOWN_CHARS: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub old: String,
    pub new: String,
    numeric: bool,
}

impl FieldChange {
    pub fn is_price(&self) -> bool {
        self.field == columns::PRICE
    }
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.numeric {
            write!(f, "{}: {} → {}", self.field, self.old, self.new)
        } else {
            write!(
                f,
                "{}: '{}' → '{}'",
                self.field,
                truncate_for_log(&self.old, MAX_SHOWN_CHARS),
                truncate_for_log(&self.new, MAX_SHOWN_CHARS)
            )
        }
    }
}

fn text_change(
    changes: &mut Vec<FieldChange>,
    field: &'static str,
    old: &str,
    new: &str,
) {
    if old != new {
        changes.push(FieldChange {
            field,
            old: old.to_string(),
            new: new.to_string(),
            numeric: false,
        });
    }
}

fn show_price(price: Option<i64>) -> String {
    price
        .map(|p| p.to_string())
        .unwrap_or_else(|| "ukjent".to_string())
}

/// Compare every tracked column. The key is not compared.
pub fn diff_records(old: &ListingRecord, new: &ListingRecord) -> Vec<FieldChange> {
    let mut changes = Vec::new();

    text_change(&mut changes, columns::TITLE, &old.title, &new.title);
    text_change(&mut changes, columns::MODEL, &old.model, &new.model);
    text_change(&mut changes, columns::MILEAGE, &old.mileage, &new.mileage);
    text_change(
        &mut changes,
        columns::TRANSMISSION,
        &old.transmission,
        &new.transmission,
    );
    text_change(
        &mut changes,
        columns::DESCRIPTION,
        &old.description,
        &new.description,
    );
    text_change(&mut changes, columns::PAYLOAD, &old.payload, &new.payload);
    text_change(&mut changes, columns::BODY_TYPE, &old.body_type, &new.body_type);
    text_change(&mut changes, columns::UPDATED, &old.updated, &new.updated);
    text_change(&mut changes, columns::URL, &old.url, &new.url);

    if old.price != new.price {
        changes.push(FieldChange {
            field: columns::PRICE,
            old: show_price(old.price),
            new: show_price(new.price),
            numeric: true,
        });
    }

    changes
}
