//! REST adapters for the receipt pipeline.
//!
//! Vendor-neutral HTTP implementations of the core capability seams:
//! - [`RestAnalyzer`] backs `DocumentAnalyzer` with a REST analysis
//!   service
//! - [`WebhookChannel`] backs `MessageChannel` with a webhook endpoint

mod analyzer;
mod channel;

pub use analyzer::RestAnalyzer;
pub use channel::WebhookChannel;
