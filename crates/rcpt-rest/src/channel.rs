//! Webhook notification channel.

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use rcpt_core::{DispatchError, Message, MessageChannel};

/// `MessageChannel` that POSTs rendered messages to a webhook endpoint.
pub struct WebhookChannel {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookChannel {
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
}

#[async_trait]
impl MessageChannel for WebhookChannel {
    async fn send(&self, message: &Message) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(message)
            .send()
            .await
            .map_err(|err| DispatchError::Unreachable(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(recipient = %message.recipient, "webhook accepted message");
            return Ok(());
        }

        Err(classify_status(status))
    }
}

/// Map a non-success webhook status onto the dispatch taxonomy.
fn classify_status(status: StatusCode) -> DispatchError {
    match status {
        StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
            DispatchError::InvalidRecipient(status.to_string())
        }
        status => DispatchError::Unreachable(format!("webhook returned {status}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_recipient_statuses() {
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND),
            DispatchError::InvalidRecipient(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY),
            DispatchError::InvalidRecipient(_)
        ));
    }

    #[test]
    fn test_other_statuses_are_unreachable() {
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            DispatchError::Unreachable(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            DispatchError::Unreachable(_)
        ));
    }
}
