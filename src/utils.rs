// ABOUTME: Small helpers shared by the fetch and persist stages
// ABOUTME: Number normalisation, Norwegian-style formatting, identifier quoting

/// Placeholder stored when the search API does not report a value.
pub const UNKNOWN: &str = "Ukjent";

/// Strip every non-digit character and parse the remainder.
///
/// Prices and mileages show up both as plain numbers and as display strings
/// such as `"500 000 kr"`. Returns `None` when no digits remain.
///
/// # Examples
///
/// ```
/// use finn_bobil_sync::utils::parse_digits;
/// assert_eq!(parse_digits("500 000 kr"), Some(500000));
/// assert_eq!(parse_digits("64 500 km"), Some(64500));
/// assert_eq!(parse_digits("Solgt"), None);
/// ```
pub fn parse_digits(value: &str) -> Option<i64> {
    let digits: String = value.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Group an integer by thousands with a plain space, e.g. `64500` -> `"64 500"`.
pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    if value < 0 {
        grouped.insert(0, '-');
    }
    grouped
}

/// Format a price for log output.
///
/// # Examples
///
/// ```
/// use finn_bobil_sync::utils::format_price;
/// assert_eq!(format_price(489000), "489 000 kr");
/// ```
pub fn format_price(price: i64) -> String {
    format!("{} kr", group_thousands(price))
}

/// Format a mileage the way the `Kilometerstand` column stores it.
///
/// # Examples
///
/// ```
/// use finn_bobil_sync::utils::format_mileage;
/// assert_eq!(format_mileage(Some(64500)), "64 500 km");
/// assert_eq!(format_mileage(None), "Ukjent");
/// ```
pub fn format_mileage(mileage: Option<i64>) -> String {
    match mileage {
        Some(km) => format!("{} km", group_thousands(km)),
        None => UNKNOWN.to_string(),
    }
}

/// Quote a MySQL identifier (database, table, column)
///
/// MySQL uses backticks for identifier quoting. Escapes embedded backticks
/// by doubling them.
///
/// # Examples
///
/// ```
/// use finn_bobil_sync::utils::quote_mysql_ident;
/// assert_eq!(quote_mysql_ident("bobil"), "`bobil`");
/// assert_eq!(quote_mysql_ident("bo`bil"), "`bo``bil`");
/// ```
pub fn quote_mysql_ident(identifier: &str) -> String {
    let mut quoted = String::with_capacity(identifier.len() + 2);
    quoted.push('`');
    for ch in identifier.chars() {
        if ch == '`' {
            quoted.push('`');
        }
        quoted.push(ch);
    }
    quoted.push('`');
    quoted
}

/// Shorten a response body for inclusion in an error message.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push('…');
    }
    out
}
