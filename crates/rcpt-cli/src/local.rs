//! Local backends for the pipeline's capability seams.
//!
//! These keep the pipeline runnable without any external service: a
//! captured analysis response stands in for the analysis call, a JSON
//! document per receipt stands in for the store, and notifications go to
//! the terminal or nowhere.

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use rcpt_core::{
    DispatchError, DocumentAnalysis, DocumentAnalyzer, ExtractionError, Message, MessageChannel,
    ObjectRef, PersistenceError, ReceiptStore, StoredReceipt,
};

/// Replays a captured analysis response from a local JSON file.
pub struct ReplayAnalyzer {
    path: PathBuf,
}

impl ReplayAnalyzer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DocumentAnalyzer for ReplayAnalyzer {
    async fn analyze_expense(
        &self,
        _source: &ObjectRef,
    ) -> Result<DocumentAnalysis, ExtractionError> {
        let raw = fs::read_to_string(&self.path).map_err(|err| {
            ExtractionError::UnreadableSource(format!("{}: {}", self.path.display(), err))
        })?;
        serde_json::from_str(&raw)
            .map_err(|err| ExtractionError::MalformedResponse(err.to_string()))
    }
}

/// Store writing one JSON document per receipt under `<root>/<table>/`.
///
/// Writes are keyed by receipt id; a replayed write overwrites the
/// existing document.
#[derive(Clone)]
pub struct DirStore {
    dir: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>, table: &str) -> Self {
        Self {
            dir: root.into().join(table),
        }
    }

    pub fn record_path(&self, receipt_id: &str) -> PathBuf {
        self.dir.join(format!("{receipt_id}.json"))
    }
}

#[async_trait]
impl ReceiptStore for DirStore {
    async fn upsert(&self, record: &StoredReceipt) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.dir)
            .map_err(|err| PersistenceError::Transient(err.to_string()))?;

        let content = serde_json::to_string_pretty(record)
            .map_err(|err| PersistenceError::Rejected(err.to_string()))?;

        let path = self.record_path(&record.receipt_id);
        fs::write(&path, content).map_err(|err| PersistenceError::Transient(err.to_string()))?;
        debug!(path = %path.display(), "record written");
        Ok(())
    }
}

/// Prints rendered notifications to the terminal.
pub struct ConsoleChannel;

#[async_trait]
impl MessageChannel for ConsoleChannel {
    async fn send(&self, message: &Message) -> Result<(), DispatchError> {
        println!("\n--- {} ---", message.subject);
        print!("{}", message.text_body);
        Ok(())
    }
}

/// Discards notifications.
pub struct NullChannel;

#[async_trait]
impl MessageChannel for NullChannel {
    async fn send(&self, _message: &Message) -> Result<(), DispatchError> {
        Ok(())
    }
}
