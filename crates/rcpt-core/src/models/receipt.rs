//! Canonical receipt record produced by normalization.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::document::ObjectRef;

/// Stable receipt identifier derived from the source object reference.
///
/// Re-processing the same image derives the same id, which the store
/// uses as its idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptId(String);

impl ReceiptId {
    /// Derive the id for a source object: SHA-256 of its `bucket/key` uri.
    pub fn for_source(source: &ObjectRef) -> Self {
        let digest = Sha256::digest(source.uri().as_bytes());
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReceiptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ReceiptId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The canonical receipt record.
///
/// Always produced, even when every field is missing; created once per
/// triggering event and immutable after normalization. The store and the
/// notifier only read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// Idempotency key derived from the source reference.
    pub id: ReceiptId,

    /// Vendor/merchant name, when detected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_name: Option<String>,

    /// Transaction date, when detected and parseable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_date: Option<NaiveDate>,

    /// Total amount; non-negative when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<Decimal>,

    /// Detected line items, in service order.
    pub line_items: Vec<LineItem>,

    /// Mean confidence over the fields that were populated (0.0 - 1.0).
    pub extraction_confidence: f32,

    /// Reference to the originating image.
    pub source: ObjectRef,

    /// Source timestamp carried by the triggering event.
    pub received_at: DateTime<Utc>,
}

impl Receipt {
    /// A receipt with no detected fields for the given source.
    pub fn empty(source: ObjectRef, received_at: DateTime<Utc>) -> Self {
        Self {
            id: ReceiptId::for_source(&source),
            vendor_name: None,
            transaction_date: None,
            total_amount: None,
            line_items: Vec::new(),
            extraction_confidence: 0.0,
            source,
            received_at,
        }
    }
}

/// A single line item; every field is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product/service description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Quantity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,

    /// Price per unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Decimal>,

    /// Total for the line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_total: Option<Decimal>,
}

impl LineItem {
    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.quantity.is_none()
            && self.unit_price.is_none()
            && self.line_total.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_stable_for_same_source() {
        let source = ObjectRef::new("uploads", "receipt.jpg");
        assert_eq!(ReceiptId::for_source(&source), ReceiptId::for_source(&source));
    }

    #[test]
    fn test_id_differs_across_sources() {
        let a = ReceiptId::for_source(&ObjectRef::new("uploads", "a.jpg"));
        let b = ReceiptId::for_source(&ObjectRef::new("uploads", "b.jpg"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_receipt() {
        let source = ObjectRef::new("uploads", "blank.jpg");
        let receipt = Receipt::empty(source, Utc::now());

        assert!(receipt.vendor_name.is_none());
        assert!(receipt.transaction_date.is_none());
        assert!(receipt.total_amount.is_none());
        assert!(receipt.line_items.is_empty());
        assert_eq!(receipt.extraction_confidence, 0.0);
    }

    #[test]
    fn test_line_item_is_empty() {
        assert!(LineItem::default().is_empty());

        let item = LineItem {
            description: Some("Coffee".to_string()),
            ..Default::default()
        };
        assert!(!item.is_empty());
    }
}
