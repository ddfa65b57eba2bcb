//! Receipt store seam and the item schema written to it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::ObjectRef;
use crate::error::PersistenceError;
use crate::models::receipt::{LineItem, Receipt, ReceiptId};

/// Capability trait for the external receipt store.
#[async_trait]
pub trait ReceiptStore: Send + Sync {
    /// Upsert a record keyed by its `receipt_id`.
    ///
    /// Re-processing the same source image derives the same id, so a
    /// replayed write overwrites the prior record instead of duplicating
    /// it.
    async fn upsert(&self, record: &StoredReceipt) -> Result<(), PersistenceError>;
}

#[async_trait]
impl<T: ReceiptStore + ?Sized> ReceiptStore for Arc<T> {
    async fn upsert(&self, record: &StoredReceipt) -> Result<(), PersistenceError> {
        (**self).upsert(record).await
    }
}

/// A receipt mapped onto the store's item schema: flat string-typed
/// summary attributes plus a nested line-item list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReceipt {
    /// Idempotency key.
    pub receipt_id: String,

    /// Vendor name, when detected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,

    /// ISO-8601 calendar date, when detected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_date: Option<String>,

    /// Total amount rendered as decimal text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<String>,

    /// Nested line items.
    pub items: Vec<StoredLineItem>,

    /// `bucket/key` uri of the originating image.
    pub source: String,

    /// Aggregate extraction confidence.
    pub confidence: f32,

    /// Source timestamp carried by the triggering event.
    pub received_at: DateTime<Utc>,

    /// When this record was written.
    pub processed_at: DateTime<Utc>,
}

/// A line item in the store schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredLineItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_total: Option<String>,
}

impl StoredReceipt {
    /// Map a normalized receipt onto the store schema.
    pub fn from_receipt(receipt: &Receipt) -> Self {
        Self {
            receipt_id: receipt.id.to_string(),
            vendor: receipt.vendor_name.clone(),
            transaction_date: receipt.transaction_date.map(|d| d.to_string()),
            total: receipt.total_amount.map(|a| a.to_string()),
            items: receipt.line_items.iter().map(StoredLineItem::from_item).collect(),
            source: receipt.source.uri(),
            confidence: receipt.extraction_confidence,
            received_at: receipt.received_at,
            processed_at: Utc::now(),
        }
    }

    /// Rebuild the canonical receipt from a stored item.
    pub fn into_receipt(self) -> Result<Receipt, PersistenceError> {
        let source = ObjectRef::from_uri(&self.source).ok_or_else(|| {
            PersistenceError::Rejected(format!("invalid source uri: {}", self.source))
        })?;

        let transaction_date = self
            .transaction_date
            .map(|raw| {
                raw.parse().map_err(|_| {
                    PersistenceError::Rejected(format!("invalid stored date: {raw}"))
                })
            })
            .transpose()?;

        let total_amount = self
            .total
            .map(|raw| {
                raw.parse().map_err(|_| {
                    PersistenceError::Rejected(format!("invalid stored total: {raw}"))
                })
            })
            .transpose()?;

        let line_items = self
            .items
            .into_iter()
            .map(StoredLineItem::into_item)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Receipt {
            id: ReceiptId::from(self.receipt_id),
            vendor_name: self.vendor,
            transaction_date,
            total_amount,
            line_items,
            extraction_confidence: self.confidence,
            source,
            received_at: self.received_at,
        })
    }
}

impl StoredLineItem {
    fn from_item(item: &LineItem) -> Self {
        Self {
            description: item.description.clone(),
            quantity: item.quantity.map(|q| q.to_string()),
            unit_price: item.unit_price.map(|p| p.to_string()),
            line_total: item.line_total.map(|t| t.to_string()),
        }
    }

    fn into_item(self) -> Result<LineItem, PersistenceError> {
        let parse = |raw: Option<String>, field: &str| {
            raw.map(|value| {
                value.parse().map_err(|_| {
                    PersistenceError::Rejected(format!("invalid stored {field}: {value}"))
                })
            })
            .transpose()
        };

        Ok(LineItem {
            description: self.description,
            quantity: parse(self.quantity, "quantity")?,
            unit_price: parse(self.unit_price, "unit price")?,
            line_total: parse(self.line_total, "line total")?,
        })
    }
}

/// In-memory store keyed by receipt id.
///
/// Substitute for the external store in tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, StoredReceipt>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a stored record by id.
    pub fn get(&self, receipt_id: &str) -> Option<StoredReceipt> {
        self.records
            .lock()
            .expect("store lock poisoned")
            .get(receipt_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReceiptStore for MemoryStore {
    async fn upsert(&self, record: &StoredReceipt) -> Result<(), PersistenceError> {
        let mut records = self.records.lock().expect("store lock poisoned");
        records.insert(record.receipt_id.clone(), record.clone());
        debug!(id = %record.receipt_id, "record upserted");
        Ok(())
    }
}
