//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate socket addresses and value ranges (timeouts > 0, sizes > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PetalConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use crate::config::schema::PetalConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// Human readable explanation.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &PetalConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    check_addr(&mut errors, "sender.server_address", &config.sender.server_address);
    if config.observability.metrics_enabled {
        check_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    let nonzero = [
        ("listener.accept_timeout_ms", config.listener.accept_timeout_ms),
        ("listener.max_payload_bytes", config.listener.max_payload_bytes),
        ("shutdown.join_timeout_ms", config.shutdown.join_timeout_ms),
        ("sender.connect_timeout_ms", config.sender.connect_timeout_ms),
        ("sender.write_timeout_ms", config.sender.write_timeout_ms),
        ("sender.response_timeout_ms", config.sender.response_timeout_ms),
        ("sender.chunk_size", config.sender.chunk_size as u64),
        ("sender.response_buffer_bytes", config.sender.response_buffer_bytes as u64),
        ("classifier.timeout_ms", config.classifier.timeout_ms),
    ];
    for (field, value) in nonzero {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    if config.classifier.command.trim().is_empty() {
        errors.push(ValidationError::new("classifier.command", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if let Err(e) = value.parse::<SocketAddr>() {
        errors.push(ValidationError::new(
            field,
            format!("invalid socket address '{}': {}", value, e),
        ));
    }
}
