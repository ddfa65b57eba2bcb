//! Source events and the raw document-analysis data model.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;

/// Reference to an uploaded image object.
///
/// The object itself is owned by the external upload subsystem; the
/// pipeline only ever holds this reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Container (bucket) holding the object.
    pub bucket: String,

    /// Object key within the container.
    pub key: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Render as a `bucket/key` uri.
    pub fn uri(&self) -> String {
        format!("{}/{}", self.bucket, self.key)
    }

    /// Parse a `bucket/key` uri back into a reference.
    ///
    /// The bucket is everything before the first `/`; keys may contain
    /// further slashes.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let (bucket, key) = uri.split_once('/')?;
        if bucket.is_empty() || key.is_empty() {
            return None;
        }
        Some(Self::new(bucket, key))
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// A triggering event: a newly stored image plus its source timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceEvent {
    /// Reference to the stored image object.
    pub source: ObjectRef,

    /// Logical "receipt source" timestamp carried by the event.
    pub received_at: DateTime<Utc>,
}

impl SourceEvent {
    pub fn new(source: ObjectRef, received_at: DateTime<Utc>) -> Self {
        Self {
            source,
            received_at,
        }
    }
}

/// Summary field types reported by the expense-analysis service.
///
/// Labels the pipeline does not consume collapse into [`FieldKind::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldKind {
    /// Vendor/merchant name (`VENDOR_NAME`).
    VendorName,
    /// Transaction date (`INVOICE_RECEIPT_DATE`).
    InvoiceReceiptDate,
    /// Total amount (`TOTAL`).
    Total,
    /// Any other detected label.
    Other,
}

impl FieldKind {
    /// The label used by the analysis service for this field type.
    pub fn label(&self) -> &'static str {
        match self {
            FieldKind::VendorName => "VENDOR_NAME",
            FieldKind::InvoiceReceiptDate => "INVOICE_RECEIPT_DATE",
            FieldKind::Total => "TOTAL",
            FieldKind::Other => "OTHER",
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label {
            "VENDOR_NAME" => FieldKind::VendorName,
            "INVOICE_RECEIPT_DATE" => FieldKind::InvoiceReceiptDate,
            "TOTAL" => FieldKind::Total,
            _ => FieldKind::Other,
        }
    }
}

impl From<String> for FieldKind {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl From<FieldKind> for String {
    fn from(kind: FieldKind) -> Self {
        kind.label().to_string()
    }
}

/// Item-level field types within a detected line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ItemFieldKind {
    /// Product/service description (`ITEM`).
    Item,
    /// Quantity (`QUANTITY`).
    Quantity,
    /// Price per unit (`UNIT_PRICE`).
    UnitPrice,
    /// Total for the line (`PRICE`).
    Price,
    /// Any other detected label.
    Other,
}

impl ItemFieldKind {
    /// The label used by the analysis service for this field type.
    pub fn label(&self) -> &'static str {
        match self {
            ItemFieldKind::Item => "ITEM",
            ItemFieldKind::Quantity => "QUANTITY",
            ItemFieldKind::UnitPrice => "UNIT_PRICE",
            ItemFieldKind::Price => "PRICE",
            ItemFieldKind::Other => "OTHER",
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label {
            "ITEM" => ItemFieldKind::Item,
            "QUANTITY" => ItemFieldKind::Quantity,
            "UNIT_PRICE" => ItemFieldKind::UnitPrice,
            "PRICE" => ItemFieldKind::Price,
            _ => ItemFieldKind::Other,
        }
    }
}

impl From<String> for ItemFieldKind {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl From<ItemFieldKind> for String {
    fn from(kind: ItemFieldKind) -> Self {
        kind.label().to_string()
    }
}

/// One labeled summary value detected by the analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryField {
    /// Detected field type.
    pub kind: FieldKind,

    /// Raw detected text, exactly as reported.
    pub text: String,

    /// Detection confidence (0.0 - 1.0).
    pub confidence: f32,
}

impl SummaryField {
    pub fn new(kind: FieldKind, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            kind,
            text: text.into(),
            confidence,
        }
    }
}

/// One labeled value within a detected line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemField {
    /// Detected field type.
    pub kind: ItemFieldKind,

    /// Raw detected text, exactly as reported.
    pub text: String,

    /// Detection confidence (0.0 - 1.0).
    pub confidence: f32,
}

impl ItemField {
    pub fn new(kind: ItemFieldKind, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            kind,
            text: text.into(),
            confidence,
        }
    }
}

/// One detected line item: an ordered set of item-level fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLineItem {
    #[serde(default)]
    pub fields: Vec<ItemField>,
}

impl RawLineItem {
    pub fn new(fields: Vec<ItemField>) -> Self {
        Self { fields }
    }
}

/// Raw result of one expense-analysis call.
///
/// Ordering is significant: when two entries for the same field type tie
/// on confidence, the normalizer keeps the earlier one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    /// Detected summary fields (vendor, date, total, and others).
    #[serde(default)]
    pub summary_fields: Vec<SummaryField>,

    /// Detected line items.
    #[serde(default)]
    pub line_items: Vec<RawLineItem>,
}

impl DocumentAnalysis {
    /// True when the service detected nothing at all.
    ///
    /// An empty analysis is not an error; downstream stages still produce
    /// a (mostly-null) receipt from it.
    pub fn is_empty(&self) -> bool {
        self.summary_fields.is_empty() && self.line_items.is_empty()
    }
}

/// Capability trait for the external expense-analysis service.
///
/// Implementations are stateless and safely retryable by the caller;
/// the pipeline bounds each call with its configured timeout.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    /// Run expense-style document analysis on the referenced image.
    async fn analyze_expense(&self, source: &ObjectRef)
    -> Result<DocumentAnalysis, ExtractionError>;
}

#[async_trait]
impl<T: DocumentAnalyzer + ?Sized> DocumentAnalyzer for Arc<T> {
    async fn analyze_expense(
        &self,
        source: &ObjectRef,
    ) -> Result<DocumentAnalysis, ExtractionError> {
        (**self).analyze_expense(source).await
    }
}
