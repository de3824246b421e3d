//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → PetalConfig (validated, immutable)
//!     → shared with the receiver, the sender and the classifier
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::ClassifierConfig;
pub use schema::ListenerConfig;
pub use schema::PetalConfig;
pub use schema::SenderConfig;
pub use schema::ShutdownConfig;
