//! Error types for the rcpt-core library.

use thiserror::Error;

/// Main error type for the rcpt library.
#[derive(Error, Debug)]
pub enum RcptError {
    /// Field extraction error from the analysis service.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Persistence error from the receipt store.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Errors from the external document-analysis call.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The source object cannot be read, or its format is unsupported.
    #[error("source object unreadable: {0}")]
    UnreadableSource(String),

    /// Transient service failure (throttling, timeout). Retriable.
    #[error("transient analysis failure: {0}")]
    Transient(String),

    /// The service response could not be decoded. Not retriable.
    #[error("malformed analysis response: {0}")]
    MalformedResponse(String),
}

impl ExtractionError {
    /// Whether the caller may retry the whole unit of work with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, ExtractionError::Transient(_))
    }
}

/// Errors from the receipt store.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Transient store failure (capacity, throttling). Retriable.
    #[error("transient store failure: {0}")]
    Transient(String),

    /// The store rejected the record. Indicates a schema mismatch that
    /// must be fixed upstream; not retriable.
    #[error("record rejected by store: {0}")]
    Rejected(String),
}

impl PersistenceError {
    /// Whether the caller may retry the whole unit of work with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, PersistenceError::Transient(_))
    }
}

/// Errors from the notification channel.
///
/// Never surfaced as a pipeline failure; the pipeline downgrades these to
/// a logged warning.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The channel could not be reached.
    #[error("channel unreachable: {0}")]
    Unreachable(String),

    /// The channel rejected the recipient address.
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),
}

/// Result type for the rcpt library.
pub type Result<T> = std::result::Result<T, RcptError>;
