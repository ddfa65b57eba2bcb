//! Currency amount parsing for noisy OCR text.

use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;

lazy_static! {
    /// First numeric run in a raw amount string, allowing grouping
    /// separators and either decimal separator.
    static ref AMOUNT: Regex = Regex::new(r"-?\d[\d\s\u{00a0}.,]*").unwrap();

    /// Comma used purely as a grouping separator (1,234 or 12,345,678).
    static ref GROUPED: Regex = Regex::new(r"^-?\d{1,3}(,\d{3})+$").unwrap();
}

/// Parse a raw currency string into a decimal amount.
///
/// Locale symbols and grouping separators are stripped and the decimal
/// separator is normalized, so "$1,234.56", "1 234,56 zł" and "1234.56"
/// all yield 1234.56. Returns `None` when no valid number remains.
/// Sign is preserved; rejecting negative amounts is the caller's rule.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let matched = AMOUNT.find(s)?.as_str();
    let cleaned: String = matched
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    let cleaned = cleaned.trim_end_matches(['.', ',']);

    let normalized = if cleaned.contains(',') && !cleaned.contains('.') {
        if GROUPED.is_match(cleaned) {
            cleaned.replace(',', "")
        } else {
            cleaned.replace(',', ".")
        }
    } else if cleaned.contains(',') && cleaned.contains('.') {
        // The separator appearing last is the decimal one.
        match (cleaned.rfind(','), cleaned.rfind('.')) {
            (Some(comma), Some(dot)) if comma > dot => {
                cleaned.replace('.', "").replace(',', ".")
            }
            _ => cleaned.replace(',', ""),
        }
    } else {
        cleaned.to_string()
    };

    Decimal::from_str(&normalized).ok()
}
