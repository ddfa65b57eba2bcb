//! Configuration for the receipt pipeline.
//!
//! Owned by deployment and passed explicitly into the pipeline entry
//! point; the core never reads ambient state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main configuration for the rcpt pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Receipt store configuration.
    pub store: StoreConfig,

    /// Notification configuration.
    pub notify: NotifyConfig,

    /// Analysis service configuration.
    pub analyzer: AnalyzerConfig,

    /// Field extraction configuration.
    pub extraction: ExtractionConfig,

    /// Upper bound for each external call, in seconds. Exceeding it is
    /// treated as a transient failure of that call.
    pub call_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            notify: NotifyConfig::default(),
            analyzer: AnalyzerConfig::default(),
            extraction: ExtractionConfig::default(),
            call_timeout_secs: 30,
        }
    }
}

/// Receipt store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Table (or equivalent namespace) receipts are written to.
    pub table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table: "receipts".to_string(),
        }
    }
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Sender address for dispatched notifications.
    pub sender: String,

    /// Recipient address for dispatched notifications.
    pub recipient: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            sender: "receipts@example.com".to_string(),
            recipient: "finance@example.com".to_string(),
        }
    }
}

/// Analysis service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Endpoint of a REST analysis service, when one is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Field extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Raw entries below this confidence are ignored during field
    /// selection (0.0 accepts everything).
    pub min_field_confidence: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_field_confidence: 0.0,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }

    /// Timeout applied to each external call.
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}
