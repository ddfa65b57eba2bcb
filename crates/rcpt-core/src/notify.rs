//! Notification rendering and dispatch.
//!
//! Rendering is pure and total: every optional receipt field has a fixed
//! placeholder, so a message can always be built. Dispatch is best-effort
//! with a single attempt; the pipeline downgrades failures to a warning.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::DispatchError;
use crate::models::config::NotifyConfig;
use crate::models::receipt::Receipt;

/// A rendered notification ready for dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

/// Capability trait for the external notification channel.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn send(&self, message: &Message) -> Result<(), DispatchError>;
}

#[async_trait]
impl<T: MessageChannel + ?Sized> MessageChannel for Arc<T> {
    async fn send(&self, message: &Message) -> Result<(), DispatchError> {
        (**self).send(message).await
    }
}

const UNKNOWN_VENDOR: &str = "Unknown vendor";
const NO_DATE: &str = "No date detected";
const NO_TOTAL: &str = "No total detected";
const NO_ITEMS: &str = "No items detected";
const UNNAMED_ITEM: &str = "Unnamed item";

/// Subject line for a receipt notification.
pub fn render_subject(receipt: &Receipt) -> String {
    format!("Receipt processed: {} - {}", vendor_label(receipt), total_label(receipt))
}

/// Plain-text notification body.
pub fn render_text_body(receipt: &Receipt) -> String {
    let mut body = String::new();

    let _ = writeln!(body, "Receipt {}", receipt.id);
    let _ = writeln!(body, "Source: {}", receipt.source);
    let _ = writeln!(body, "Vendor: {}", vendor_label(receipt));
    let _ = writeln!(body, "Date: {}", date_label(receipt));
    let _ = writeln!(body, "Total: {}", total_label(receipt));
    let _ = writeln!(body, "Confidence: {:.2}", receipt.extraction_confidence);
    body.push('\n');

    body.push_str("Items:\n");
    if receipt.line_items.is_empty() {
        let _ = writeln!(body, "  {NO_ITEMS}");
    } else {
        for item in &receipt.line_items {
            let description = item.description.as_deref().unwrap_or(UNNAMED_ITEM);
            let price = item
                .line_total
                .or(item.unit_price)
                .map(|p| p.to_string())
                .unwrap_or_else(|| "n/a".to_string());
            let quantity = item
                .quantity
                .map(|q| q.to_string())
                .unwrap_or_else(|| "n/a".to_string());
            let _ = writeln!(body, "  - {description} - {price} x {quantity}");
        }
    }

    body
}

/// HTML notification body.
pub fn render_html_body(receipt: &Receipt) -> String {
    let mut items = String::new();
    for item in &receipt.line_items {
        let description = escape_html(item.description.as_deref().unwrap_or(UNNAMED_ITEM));
        let price = item
            .line_total
            .or(item.unit_price)
            .map(|p| p.to_string())
            .unwrap_or_else(|| "n/a".to_string());
        let quantity = item
            .quantity
            .map(|q| q.to_string())
            .unwrap_or_else(|| "n/a".to_string());
        let _ = write!(items, "<li>{description} - {price} x {quantity}</li>");
    }
    if items.is_empty() {
        items = format!("<li>{NO_ITEMS}</li>");
    }

    format!(
        "<html>\n<body>\n\
         <h2>Receipt Processing Notification</h2>\n\
         <p><strong>Receipt ID:</strong> {id}</p>\n\
         <p><strong>Vendor:</strong> {vendor}</p>\n\
         <p><strong>Date:</strong> {date}</p>\n\
         <p><strong>Total:</strong> {total}</p>\n\
         <p><strong>Source:</strong> {source}</p>\n\
         <h3>Items</h3>\n\
         <ul>{items}</ul>\n\
         <p>The receipt has been processed and stored.</p>\n\
         </body>\n</html>\n",
        id = receipt.id,
        vendor = escape_html(vendor_label(receipt)),
        date = date_label(receipt),
        total = total_label(receipt),
        source = escape_html(&receipt.source.uri()),
    )
}

fn vendor_label(receipt: &Receipt) -> &str {
    receipt.vendor_name.as_deref().unwrap_or(UNKNOWN_VENDOR)
}

fn date_label(receipt: &Receipt) -> String {
    receipt
        .transaction_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| NO_DATE.to_string())
}

fn total_label(receipt: &Receipt) -> String {
    receipt
        .total_amount
        .map(|a| a.to_string())
        .unwrap_or_else(|| NO_TOTAL.to_string())
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Renders and dispatches receipt notifications.
pub struct Notifier<C> {
    channel: C,
    config: NotifyConfig,
}

impl<C: MessageChannel> Notifier<C> {
    pub fn new(channel: C, config: NotifyConfig) -> Self {
        Self { channel, config }
    }

    /// Build the notification message for a receipt.
    pub fn compose(&self, receipt: &Receipt) -> Message {
        Message {
            sender: self.config.sender.clone(),
            recipient: self.config.recipient.clone(),
            subject: render_subject(receipt),
            text_body: render_text_body(receipt),
            html_body: render_html_body(receipt),
        }
    }

    /// Render and dispatch, with exactly one attempt.
    pub async fn notify(&self, receipt: &Receipt) -> Result<(), DispatchError> {
        let message = self.compose(receipt);
        self.channel.send(&message).await?;
        info!(recipient = %message.recipient, id = %receipt.id, "notification dispatched");
        Ok(())
    }
}

/// Channel double that records dispatched messages.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    sent: Mutex<Vec<Message>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages dispatched so far.
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().expect("channel lock poisoned").clone()
    }
}

#[async_trait]
impl MessageChannel for MemoryChannel {
    async fn send(&self, message: &Message) -> Result<(), DispatchError> {
        self.sent.lock().expect("channel lock poisoned").push(message.clone());
        Ok(())
    }
}
