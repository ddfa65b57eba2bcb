//! Pipeline orchestration: analyze, normalize, then fan out to the store
//! and the notification channel.

use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::document::{DocumentAnalyzer, SourceEvent};
use crate::error::{DispatchError, ExtractionError, PersistenceError, RcptError};
use crate::models::config::PipelineConfig;
use crate::models::receipt::Receipt;
use crate::normalize::Normalizer;
use crate::notify::{MessageChannel, Notifier};
use crate::store::{ReceiptStore, StoredReceipt};

/// Terminal outcome of one unit of work.
///
/// These are the only outcomes the outer trigger mechanism needs to act
/// on; `is_retriable` exposes the transient/terminal split.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Record stored and notification dispatched.
    Completed(Receipt),

    /// Record stored; notification dispatch failed and was downgraded.
    CompletedWithNotificationWarning(Receipt),

    /// The analysis call failed; nothing was stored.
    FailedExtraction(ExtractionError),

    /// The store write failed.
    FailedPersistence(PersistenceError),
}

impl PipelineOutcome {
    /// The normalized receipt, when the run completed.
    pub fn receipt(&self) -> Option<&Receipt> {
        match self {
            PipelineOutcome::Completed(receipt)
            | PipelineOutcome::CompletedWithNotificationWarning(receipt) => Some(receipt),
            _ => None,
        }
    }

    /// True when the record was stored. A notification warning still
    /// counts as success.
    pub fn is_success(&self) -> bool {
        self.receipt().is_some()
    }

    /// Whether the outer trigger should retry the whole event.
    pub fn is_retriable(&self) -> bool {
        match self {
            PipelineOutcome::Completed(_)
            | PipelineOutcome::CompletedWithNotificationWarning(_) => false,
            PipelineOutcome::FailedExtraction(err) => err.is_transient(),
            PipelineOutcome::FailedPersistence(err) => err.is_transient(),
        }
    }

    /// Short label for logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineOutcome::Completed(_) => "completed",
            PipelineOutcome::CompletedWithNotificationWarning(_) => "completed-with-warning",
            PipelineOutcome::FailedExtraction(_) => "failed-extraction",
            PipelineOutcome::FailedPersistence(_) => "failed-persistence",
        }
    }

    /// Convert into a result, treating the notification warning as
    /// success.
    pub fn into_result(self) -> crate::error::Result<Receipt> {
        match self {
            PipelineOutcome::Completed(receipt)
            | PipelineOutcome::CompletedWithNotificationWarning(receipt) => Ok(receipt),
            PipelineOutcome::FailedExtraction(err) => Err(RcptError::Extraction(err)),
            PipelineOutcome::FailedPersistence(err) => Err(RcptError::Persistence(err)),
        }
    }
}

/// One receipt pipeline: analysis, normalization, and fan-out.
///
/// Holds no state across events; concurrent units of work coordinate
/// only through the store's idempotency key.
pub struct Pipeline<A, S, C> {
    analyzer: A,
    store: S,
    notifier: Notifier<C>,
    normalizer: Normalizer,
    call_timeout: Duration,
}

impl<A, S, C> Pipeline<A, S, C>
where
    A: DocumentAnalyzer,
    S: ReceiptStore,
    C: MessageChannel,
{
    pub fn new(analyzer: A, store: S, channel: C, config: &PipelineConfig) -> Self {
        Self {
            analyzer,
            store,
            notifier: Notifier::new(channel, config.notify.clone()),
            normalizer: Normalizer::new()
                .with_min_confidence(config.extraction.min_field_confidence),
            call_timeout: config.call_timeout(),
        }
    }

    /// Process one source event to a terminal outcome.
    ///
    /// Stages run in order; persistence and notification fan out
    /// concurrently, and the notification result never affects the
    /// stored record or the reported failure kind. Each external call is
    /// bounded by the configured timeout; exceeding it is a transient
    /// failure of that call.
    pub async fn process(&self, event: &SourceEvent) -> PipelineOutcome {
        info!(source = %event.source, "processing receipt");

        let analysis = match timeout(
            self.call_timeout,
            self.analyzer.analyze_expense(&event.source),
        )
        .await
        {
            Err(_) => {
                return PipelineOutcome::FailedExtraction(ExtractionError::Transient(format!(
                    "analysis call exceeded {:?}",
                    self.call_timeout
                )));
            }
            Ok(Err(err)) => return PipelineOutcome::FailedExtraction(err),
            Ok(Ok(analysis)) => analysis,
        };
        debug!(
            summary_fields = analysis.summary_fields.len(),
            line_items = analysis.line_items.len(),
            "analysis complete"
        );

        let receipt = self.normalizer.normalize(event, &analysis);
        let record = StoredReceipt::from_receipt(&receipt);

        let persist = async {
            match timeout(self.call_timeout, self.store.upsert(&record)).await {
                Err(_) => Err(PersistenceError::Transient(format!(
                    "store write exceeded {:?}",
                    self.call_timeout
                ))),
                Ok(result) => result,
            }
        };
        let notify = async {
            match timeout(self.call_timeout, self.notifier.notify(&receipt)).await {
                Err(_) => Err(DispatchError::Unreachable(format!(
                    "dispatch exceeded {:?}",
                    self.call_timeout
                ))),
                Ok(result) => result,
            }
        };
        let (persisted, notified) = tokio::join!(persist, notify);

        if let Err(err) = persisted {
            return PipelineOutcome::FailedPersistence(err);
        }
        info!(id = %receipt.id, "receipt stored");

        match notified {
            Ok(()) => PipelineOutcome::Completed(receipt),
            Err(err) => {
                warn!(id = %receipt.id, error = %err, "notification dispatch failed; continuing");
                PipelineOutcome::CompletedWithNotificationWarning(receipt)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::document::{
        DocumentAnalysis, DocumentAnalyzer, FieldKind, ObjectRef, SummaryField,
    };
    use crate::notify::{MemoryChannel, Message};
    use crate::store::MemoryStore;

    fn event() -> SourceEvent {
        SourceEvent::new(
            ObjectRef::new("uploads", "receipt.jpg"),
            Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
        )
    }

    fn analysis() -> DocumentAnalysis {
        DocumentAnalysis {
            summary_fields: vec![
                SummaryField::new(FieldKind::VendorName, "Corner Cafe", 0.95),
                SummaryField::new(FieldKind::Total, "18.40", 0.9),
            ],
            line_items: vec![],
        }
    }

    struct StaticAnalyzer(DocumentAnalysis);

    #[async_trait]
    impl DocumentAnalyzer for StaticAnalyzer {
        async fn analyze_expense(
            &self,
            _source: &ObjectRef,
        ) -> Result<DocumentAnalysis, ExtractionError> {
            Ok(self.0.clone())
        }
    }

    struct UnreadableAnalyzer;

    #[async_trait]
    impl DocumentAnalyzer for UnreadableAnalyzer {
        async fn analyze_expense(
            &self,
            source: &ObjectRef,
        ) -> Result<DocumentAnalysis, ExtractionError> {
            Err(ExtractionError::UnreadableSource(source.uri()))
        }
    }

    struct SlowAnalyzer;

    #[async_trait]
    impl DocumentAnalyzer for SlowAnalyzer {
        async fn analyze_expense(
            &self,
            _source: &ObjectRef,
        ) -> Result<DocumentAnalysis, ExtractionError> {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(DocumentAnalysis::default())
        }
    }

    struct RejectingStore;

    #[async_trait]
    impl ReceiptStore for RejectingStore {
        async fn upsert(&self, record: &StoredReceipt) -> Result<(), PersistenceError> {
            Err(PersistenceError::Rejected(format!(
                "schema mismatch for {}",
                record.receipt_id
            )))
        }
    }

    struct SlowStore;

    #[async_trait]
    impl ReceiptStore for SlowStore {
        async fn upsert(&self, _record: &StoredReceipt) -> Result<(), PersistenceError> {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(())
        }
    }

    struct FailingChannel;

    #[async_trait]
    impl MessageChannel for FailingChannel {
        async fn send(&self, _message: &Message) -> Result<(), DispatchError> {
            Err(DispatchError::Unreachable("connection refused".to_string()))
        }
    }

    fn pipeline<A, S, C>(analyzer: A, store: S, channel: C) -> Pipeline<A, S, C>
    where
        A: DocumentAnalyzer,
        S: ReceiptStore,
        C: MessageChannel,
    {
        Pipeline::new(analyzer, store, channel, &PipelineConfig::default())
    }

    #[tokio::test]
    async fn test_completed_run_stores_and_notifies() {
        let store = Arc::new(MemoryStore::new());
        let channel = Arc::new(MemoryChannel::new());
        let pipeline = pipeline(
            StaticAnalyzer(analysis()),
            Arc::clone(&store),
            Arc::clone(&channel),
        );

        let outcome = pipeline.process(&event()).await;

        assert!(matches!(outcome, PipelineOutcome::Completed(_)));
        assert!(!outcome.is_retriable());
        assert_eq!(store.len(), 1);
        assert_eq!(channel.sent().len(), 1);

        let receipt = outcome.receipt().unwrap();
        assert_eq!(receipt.vendor_name.as_deref(), Some("Corner Cafe"));
    }

    #[tokio::test]
    async fn test_notification_failure_never_fails_the_run() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(StaticAnalyzer(analysis()), Arc::clone(&store), FailingChannel);

        let outcome = pipeline.process(&event()).await;

        assert!(matches!(
            outcome,
            PipelineOutcome::CompletedWithNotificationWarning(_)
        ));
        assert!(outcome.is_success());
        assert!(!outcome.is_retriable());
        // The store write must have happened regardless.
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_analysis_still_persists_a_receipt() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(
            StaticAnalyzer(DocumentAnalysis::default()),
            Arc::clone(&store),
            MemoryChannel::new(),
        );

        let outcome = pipeline.process(&event()).await;

        let receipt = outcome.receipt().expect("empty input still completes");
        assert!(receipt.vendor_name.is_none());
        assert!(receipt.total_amount.is_none());
        assert_eq!(receipt.extraction_confidence, 0.0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_replaying_an_event_does_not_duplicate() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(
            StaticAnalyzer(analysis()),
            Arc::clone(&store),
            MemoryChannel::new(),
        );

        pipeline.process(&event()).await;
        pipeline.process(&event()).await;

        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_source_fails_without_storing() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(UnreadableAnalyzer, Arc::clone(&store), MemoryChannel::new());

        let outcome = pipeline.process(&event()).await;

        assert!(matches!(
            outcome,
            PipelineOutcome::FailedExtraction(ExtractionError::UnreadableSource(_))
        ));
        assert!(!outcome.is_retriable());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_store_rejection_is_a_hard_failure() {
        let pipeline = pipeline(StaticAnalyzer(analysis()), RejectingStore, MemoryChannel::new());

        let outcome = pipeline.process(&event()).await;

        assert!(matches!(
            outcome,
            PipelineOutcome::FailedPersistence(PersistenceError::Rejected(_))
        ));
        assert!(!outcome.is_retriable());
        assert!(outcome.into_result().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_analysis_timeout_is_transient() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(SlowAnalyzer, Arc::clone(&store), MemoryChannel::new());

        let outcome = pipeline.process(&event()).await;

        assert!(matches!(
            outcome,
            PipelineOutcome::FailedExtraction(ExtractionError::Transient(_))
        ));
        assert!(outcome.is_retriable());
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_timeout_is_transient() {
        let pipeline = pipeline(StaticAnalyzer(analysis()), SlowStore, MemoryChannel::new());

        let outcome = pipeline.process(&event()).await;

        assert!(matches!(
            outcome,
            PipelineOutcome::FailedPersistence(PersistenceError::Transient(_))
        ));
        assert!(outcome.is_retriable());
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(
            PipelineOutcome::FailedExtraction(ExtractionError::Transient("x".to_string()))
                .label(),
            "failed-extraction"
        );
    }
}
