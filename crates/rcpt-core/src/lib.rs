//! Core library for receipt extraction and normalization.
//!
//! This crate provides:
//! - The raw document-analysis data model and the `DocumentAnalyzer` seam
//! - Receipt normalization (field selection, date/amount parsing,
//!   confidence aggregation)
//! - The store item schema and `ReceiptStore` seam
//! - Notification rendering and the `MessageChannel` seam
//! - Pipeline orchestration with notification-failure isolation

pub mod document;
pub mod error;
pub mod models;
pub mod normalize;
pub mod notify;
pub mod pipeline;
pub mod store;

pub use document::{
    DocumentAnalysis, DocumentAnalyzer, FieldKind, ItemField, ItemFieldKind, ObjectRef,
    RawLineItem, SourceEvent, SummaryField,
};
pub use error::{DispatchError, ExtractionError, PersistenceError, RcptError, Result};
pub use models::config::{
    AnalyzerConfig, ExtractionConfig, NotifyConfig, PipelineConfig, StoreConfig,
};
pub use models::receipt::{LineItem, Receipt, ReceiptId};
pub use normalize::Normalizer;
pub use notify::{MemoryChannel, Message, MessageChannel, Notifier};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use store::{MemoryStore, ReceiptStore, StoredLineItem, StoredReceipt};
