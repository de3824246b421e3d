//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for both the
//! receiver and the sender. All types derive Serde traits for
//! deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use crate::protocol::ResponseFraming;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PetalConfig {
    /// Listener configuration (bind address, accept tick, payload cap).
    pub listener: ListenerConfig,

    /// Shutdown behaviour.
    pub shutdown: ShutdownConfig,

    /// Wire protocol options shared by both ends.
    pub protocol: ProtocolConfig,

    /// Sender defaults.
    pub sender: SenderConfig,

    /// Classifier collaborator settings.
    pub classifier: ClassifierConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// How long a single accept waits before the run-state is re-checked.
    pub accept_timeout_ms: u64,

    /// Largest declared payload the receiver will read.
    pub max_payload_bytes: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            accept_timeout_ms: 1000,
            max_payload_bytes: 64 * 1024 * 1024,
        }
    }
}

impl ListenerConfig {
    pub fn accept_timeout(&self) -> Duration {
        Duration::from_millis(self.accept_timeout_ms)
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Per-task bound when joining session handlers.
    pub join_timeout_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            join_timeout_ms: 5000,
        }
    }
}

impl ShutdownConfig {
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// Wire protocol options.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Framing of the receiver's reply. Both ends must agree.
    pub response_framing: ResponseFraming,
}

/// Sender configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Receiver address (e.g., "127.0.0.1:8080").
    pub server_address: String,

    /// Size of each payload write.
    pub chunk_size: usize,

    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Bound on writing the whole framed payload, in milliseconds.
    pub write_timeout_ms: u64,

    /// How long to wait for the reply in milliseconds.
    pub response_timeout_ms: u64,

    /// Buffer size for the single raw response read. Longer replies are truncated.
    pub response_buffer_bytes: usize,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:8080".to_string(),
            chunk_size: 1024,
            connect_timeout_ms: 5000,
            write_timeout_ms: 30_000,
            response_timeout_ms: 10_000,
            response_buffer_bytes: 1024,
        }
    }
}

impl SenderConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}

/// Classifier collaborator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// JSON label table, one `{"en", "ko"}` row per model output index.
    pub labels_path: PathBuf,

    /// Inference program. Receives image bytes on stdin, prints an index or scores.
    pub command: String,

    /// Extra arguments for the inference program.
    pub args: Vec<String>,

    /// Per-image inference deadline in milliseconds. The program is killed on expiry.
    pub timeout_ms: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            labels_path: PathBuf::from("flower_labels.json"),
            command: "petal-infer".to_string(),
            args: Vec::new(),
            timeout_ms: 30_000,
        }
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
