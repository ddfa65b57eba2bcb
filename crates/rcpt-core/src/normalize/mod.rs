//! Receipt normalization: raw analysis fields to a typed record.

pub mod amounts;
pub mod dates;

pub use amounts::parse_amount;
pub use dates::parse_date;

use rust_decimal::Decimal;
use tracing::debug;

use crate::document::{
    DocumentAnalysis, FieldKind, ItemFieldKind, RawLineItem, SourceEvent, SummaryField,
};
use crate::models::receipt::{LineItem, Receipt, ReceiptId};

/// Pure transformation from a raw analysis result to a receipt record.
///
/// Normalization never fails: malformed or missing fields degrade to
/// `None` and lower the aggregate confidence instead of aborting the
/// record. Partial data is the expected case for noisy OCR input, and
/// deciding whether a receipt is usable belongs to downstream consumers
/// reading `extraction_confidence`.
#[derive(Debug, Clone)]
pub struct Normalizer {
    /// Raw entries below this confidence are ignored during selection.
    min_field_confidence: f32,
}

impl Normalizer {
    pub fn new() -> Self {
        Self {
            min_field_confidence: 0.0,
        }
    }

    /// Set the minimum confidence for raw entries to be considered.
    pub fn with_min_confidence(mut self, confidence: f32) -> Self {
        self.min_field_confidence = confidence;
        self
    }

    /// Normalize one analysis result into the canonical receipt record.
    ///
    /// Deterministic and I/O-free; the same event and analysis always
    /// yield the same receipt.
    pub fn normalize(&self, event: &SourceEvent, analysis: &DocumentAnalysis) -> Receipt {
        let mut tally = ConfidenceTally::default();

        let vendor_name = self
            .best_summary(analysis, FieldKind::VendorName)
            .and_then(|field| {
                let text = field.text.trim();
                (!text.is_empty()).then(|| {
                    tally.record(field.confidence);
                    text.to_string()
                })
            });

        let transaction_date = self
            .best_summary(analysis, FieldKind::InvoiceReceiptDate)
            .and_then(|field| {
                parse_date(&field.text).inspect(|_| tally.record(field.confidence))
            });

        let total_amount = self
            .best_summary(analysis, FieldKind::Total)
            .and_then(|field| {
                parse_amount(&field.text)
                    .filter(|amount| !amount.is_sign_negative())
                    .inspect(|_| tally.record(field.confidence))
            });

        let line_items: Vec<LineItem> = analysis
            .line_items
            .iter()
            .filter_map(|raw| self.convert_item(raw, &mut tally))
            .collect();

        let receipt = Receipt {
            id: ReceiptId::for_source(&event.source),
            vendor_name,
            transaction_date,
            total_amount,
            line_items,
            extraction_confidence: tally.mean(),
            source: event.source.clone(),
            received_at: event.received_at,
        };

        debug!(
            id = %receipt.id,
            confidence = receipt.extraction_confidence,
            items = receipt.line_items.len(),
            "normalized receipt"
        );

        receipt
    }

    fn best_summary<'a>(
        &self,
        analysis: &'a DocumentAnalysis,
        kind: FieldKind,
    ) -> Option<&'a SummaryField> {
        pick_best(
            analysis.summary_fields.iter().filter(|f| f.kind == kind),
            |f| f.confidence,
            self.min_field_confidence,
        )
    }

    /// Convert one raw line item; an item whose fields all come out
    /// `None` carries no information and is dropped.
    fn convert_item(&self, raw: &RawLineItem, tally: &mut ConfidenceTally) -> Option<LineItem> {
        let item = LineItem {
            description: self.item_text(raw, ItemFieldKind::Item, tally),
            quantity: self.item_amount(raw, ItemFieldKind::Quantity, tally),
            unit_price: self.item_amount(raw, ItemFieldKind::UnitPrice, tally),
            line_total: self.item_amount(raw, ItemFieldKind::Price, tally),
        };

        (!item.is_empty()).then_some(item)
    }

    fn item_text(
        &self,
        raw: &RawLineItem,
        kind: ItemFieldKind,
        tally: &mut ConfidenceTally,
    ) -> Option<String> {
        let field = pick_best(
            raw.fields.iter().filter(|f| f.kind == kind),
            |f| f.confidence,
            self.min_field_confidence,
        )?;
        let text = field.text.trim();
        (!text.is_empty()).then(|| {
            tally.record(field.confidence);
            text.to_string()
        })
    }

    fn item_amount(
        &self,
        raw: &RawLineItem,
        kind: ItemFieldKind,
        tally: &mut ConfidenceTally,
    ) -> Option<Decimal> {
        let field = pick_best(
            raw.fields.iter().filter(|f| f.kind == kind),
            |f| f.confidence,
            self.min_field_confidence,
        )?;
        parse_amount(&field.text)
            .filter(|amount| !amount.is_sign_negative())
            .inspect(|_| tally.record(field.confidence))
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Highest-confidence entry; ties break to the entry appearing first in
/// the service's original ordering.
fn pick_best<'a, T, F>(entries: impl Iterator<Item = &'a T>, confidence: F, min: f32) -> Option<&'a T>
where
    F: Fn(&T) -> f32,
{
    let mut best: Option<&'a T> = None;
    for entry in entries {
        if confidence(entry) < min {
            continue;
        }
        match best {
            Some(current) if confidence(entry) <= confidence(current) => {}
            _ => best = Some(entry),
        }
    }
    best
}

/// Running sum of the confidences of populated fields.
#[derive(Debug, Default)]
struct ConfidenceTally {
    sum: f32,
    count: u32,
}

impl ConfidenceTally {
    fn record(&mut self, confidence: f32) {
        self.sum += confidence;
        self.count += 1;
    }

    /// Mean over populated fields; zero when nothing was populated.
    fn mean(&self) -> f32 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    use super::*;
    use crate::document::{ItemField, ObjectRef};

    fn event() -> SourceEvent {
        SourceEvent::new(
            ObjectRef::new("uploads", "receipt.jpg"),
            Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
        )
    }

    fn summary(kind: FieldKind, text: &str, confidence: f32) -> SummaryField {
        SummaryField::new(kind, text, confidence)
    }

    #[test]
    fn test_empty_analysis_yields_empty_receipt() {
        let receipt = Normalizer::new().normalize(&event(), &DocumentAnalysis::default());

        assert!(receipt.vendor_name.is_none());
        assert!(receipt.transaction_date.is_none());
        assert!(receipt.total_amount.is_none());
        assert!(receipt.line_items.is_empty());
        assert_eq!(receipt.extraction_confidence, 0.0);
        assert_eq!(receipt.id, ReceiptId::for_source(&event().source));
    }

    #[test]
    fn test_populated_fields() {
        let analysis = DocumentAnalysis {
            summary_fields: vec![
                summary(FieldKind::VendorName, "Corner Cafe", 0.95),
                summary(FieldKind::InvoiceReceiptDate, "2024-01-14", 0.9),
                summary(FieldKind::Total, "$18.40", 0.85),
            ],
            line_items: vec![],
        };

        let receipt = Normalizer::new().normalize(&event(), &analysis);

        assert_eq!(receipt.vendor_name.as_deref(), Some("Corner Cafe"));
        assert_eq!(
            receipt.transaction_date,
            Some(NaiveDate::from_ymd_opt(2024, 1, 14).unwrap())
        );
        assert_eq!(receipt.total_amount, Some(Decimal::from_str("18.40").unwrap()));
    }

    #[test]
    fn test_confidence_averages_populated_fields_only() {
        // Vendor 0.9 and total 0.7 populate; the date is unparseable and
        // must not count toward the mean.
        let analysis = DocumentAnalysis {
            summary_fields: vec![
                summary(FieldKind::VendorName, "Corner Cafe", 0.9),
                summary(FieldKind::Total, "12.00", 0.7),
                summary(FieldKind::InvoiceReceiptDate, "not a date", 0.95),
            ],
            line_items: vec![],
        };

        let receipt = Normalizer::new().normalize(&event(), &analysis);

        assert!(receipt.transaction_date.is_none());
        assert!((receipt.extraction_confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_equal_confidence_tie_breaks_to_first_entry() {
        let analysis = DocumentAnalysis {
            summary_fields: vec![
                summary(FieldKind::Total, "10.00", 0.8),
                summary(FieldKind::Total, "99.00", 0.8),
            ],
            line_items: vec![],
        };

        let normalizer = Normalizer::new();
        for _ in 0..10 {
            let receipt = normalizer.normalize(&event(), &analysis);
            assert_eq!(receipt.total_amount, Some(Decimal::from_str("10.00").unwrap()));
        }
    }

    #[test]
    fn test_higher_confidence_entry_wins_regardless_of_order() {
        let analysis = DocumentAnalysis {
            summary_fields: vec![
                summary(FieldKind::Total, "10.00", 0.4),
                summary(FieldKind::Total, "99.00", 0.9),
            ],
            line_items: vec![],
        };

        let receipt = Normalizer::new().normalize(&event(), &analysis);
        assert_eq!(receipt.total_amount, Some(Decimal::from_str("99.00").unwrap()));
    }

    #[test]
    fn test_negative_total_degrades_to_none() {
        let analysis = DocumentAnalysis {
            summary_fields: vec![summary(FieldKind::Total, "-5.00", 0.9)],
            line_items: vec![],
        };

        let receipt = Normalizer::new().normalize(&event(), &analysis);
        assert!(receipt.total_amount.is_none());
        assert_eq!(receipt.extraction_confidence, 0.0);
    }

    #[test]
    fn test_blank_vendor_degrades_to_none() {
        let analysis = DocumentAnalysis {
            summary_fields: vec![summary(FieldKind::VendorName, "   ", 0.9)],
            line_items: vec![],
        };

        let receipt = Normalizer::new().normalize(&event(), &analysis);
        assert!(receipt.vendor_name.is_none());
    }

    #[test]
    fn test_line_item_conversion() {
        let analysis = DocumentAnalysis {
            summary_fields: vec![],
            line_items: vec![RawLineItem::new(vec![
                ItemField::new(ItemFieldKind::Item, "Espresso", 0.9),
                ItemField::new(ItemFieldKind::Quantity, "2", 0.8),
                ItemField::new(ItemFieldKind::UnitPrice, "3.50", 0.85),
                ItemField::new(ItemFieldKind::Price, "7.00", 0.9),
            ])],
        };

        let receipt = Normalizer::new().normalize(&event(), &analysis);

        assert_eq!(receipt.line_items.len(), 1);
        let item = &receipt.line_items[0];
        assert_eq!(item.description.as_deref(), Some("Espresso"));
        assert_eq!(item.quantity, Some(Decimal::from(2)));
        assert_eq!(item.unit_price, Some(Decimal::from_str("3.50").unwrap()));
        assert_eq!(item.line_total, Some(Decimal::from_str("7.00").unwrap()));
    }

    #[test]
    fn test_uninformative_line_item_is_dropped() {
        let analysis = DocumentAnalysis {
            summary_fields: vec![summary(FieldKind::Total, "7.00", 0.9)],
            line_items: vec![
                RawLineItem::new(vec![
                    ItemField::new(ItemFieldKind::Item, "  ", 0.9),
                    ItemField::new(ItemFieldKind::Price, "garbage", 0.9),
                ]),
                RawLineItem::new(vec![ItemField::new(ItemFieldKind::Item, "Espresso", 0.8)]),
            ],
        };

        let receipt = Normalizer::new().normalize(&event(), &analysis);

        assert_eq!(receipt.line_items.len(), 1);
        assert_eq!(receipt.line_items[0].description.as_deref(), Some("Espresso"));
        // Total 0.9 + item description 0.8; the dropped item counts nothing.
        assert!((receipt.extraction_confidence - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_min_confidence_filters_entries() {
        let analysis = DocumentAnalysis {
            summary_fields: vec![summary(FieldKind::Total, "10.00", 0.3)],
            line_items: vec![],
        };

        let receipt = Normalizer::new()
            .with_min_confidence(0.5)
            .normalize(&event(), &analysis);
        assert!(receipt.total_amount.is_none());
    }
}
