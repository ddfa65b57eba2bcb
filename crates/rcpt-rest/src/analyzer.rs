//! REST client for an expense-analysis service.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

use rcpt_core::{DocumentAnalysis, DocumentAnalyzer, ExtractionError, ObjectRef};

/// Request body for an analysis call.
#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    bucket: &'a str,
    key: &'a str,
}

/// `DocumentAnalyzer` backed by a REST analysis service.
///
/// POSTs the object reference to `<endpoint>/analyze-expense` and decodes
/// the response body as a `DocumentAnalysis`.
pub struct RestAnalyzer {
    client: reqwest::Client,
    endpoint: String,
}

impl RestAnalyzer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Use a preconfigured client (timeouts, proxies, TLS settings).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn url(&self) -> String {
        format!("{}/analyze-expense", self.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl DocumentAnalyzer for RestAnalyzer {
    async fn analyze_expense(
        &self,
        source: &ObjectRef,
    ) -> Result<DocumentAnalysis, ExtractionError> {
        let request = AnalyzeRequest {
            bucket: &source.bucket,
            key: &source.key,
        };

        let response = self
            .client
            .post(self.url())
            .json(&request)
            .send()
            .await
            .map_err(|err| ExtractionError::Transient(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, &source.uri()));
        }

        debug!(source = %source, "analysis response received");
        response
            .json::<DocumentAnalysis>()
            .await
            .map_err(|err| ExtractionError::MalformedResponse(err.to_string()))
    }
}

/// Map a non-success analysis status onto the extraction taxonomy.
fn classify_status(status: StatusCode, source: &str) -> ExtractionError {
    match status {
        StatusCode::NOT_FOUND
        | StatusCode::GONE
        | StatusCode::UNSUPPORTED_MEDIA_TYPE
        | StatusCode::UNPROCESSABLE_ENTITY => {
            ExtractionError::UnreadableSource(format!("{source}: {status}"))
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            ExtractionError::Transient(status.to_string())
        }
        status if status.is_server_error() => ExtractionError::Transient(status.to_string()),
        status => ExtractionError::MalformedResponse(format!("unexpected status {status}")),
    }
}
