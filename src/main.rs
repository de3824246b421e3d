//! petal receiver.
//!
//! Accepts one framed image per connection, classifies it and answers with a
//! short text.
//!
//! # Architecture Overview
//!
//! ```text
//!     Sender                ┌──────────────────────────────────────────────────┐
//!     ──────────────────────┼─▶ listener ──▶ session handler ──▶ classifier    │
//!     [len u64][image]      │   (accept)     (read frame)        (external     │
//!                           │       │             │               program +    │
//!                           │       ▼             │               label table) │
//!                           │   registry ◀────────┘                   │        │
//!     ◀─────────────────────┼── reply text ◀──────────────────────────┘        │
//!                           │                                                  │
//!                           │   shutdown coordinator: close → join → stop      │
//!                           └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use petal::classify::{Classifier, CommandClassifier, LabelStore};
use petal::config::validation::validate_config;
use petal::config::{load_or_default, ConfigError};
use petal::lifecycle::shutdown_signal;
use petal::observability::{logging, metrics};
use petal::Server;

#[derive(Parser)]
#[command(name = "petal-server")]
#[command(about = "Receive framed images and reply with their classification", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_or_default(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!("petal-server v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        accept_timeout_ms = config.listener.accept_timeout_ms,
        max_payload_bytes = config.listener.max_payload_bytes,
        join_timeout_ms = config.shutdown.join_timeout_ms,
        response_framing = ?config.protocol.response_framing,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let labels = LabelStore::load(&config.classifier.labels_path)?;
    let classifier: Arc<dyn Classifier> = Arc::new(CommandClassifier::new(&config.classifier, labels));

    let server = Server::bind(config, classifier).await?;
    let handle = server.start();

    shutdown_signal().await;
    let report = handle.stop().await;

    tracing::info!(
        closed_sessions = report.closed_sessions,
        joined = report.joined,
        aborted = report.aborted,
        "Shutdown complete"
    );
    Ok(())
}
