//! Transaction date parsing.

use chrono::NaiveDate;

/// Accepted date formats, tried in order; the first successful parse wins.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    // Two-digit years first: %Y would otherwise swallow "24" as year 24.
    "%m/%d/%y",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%d-%m-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
];

/// Parse a raw date string against the accepted formats.
///
/// Unparseable dates yield `None`; they never fail the record.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let trimmed = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}
