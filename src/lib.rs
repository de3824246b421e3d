//! Framed image transfer and classification receiver.

pub mod classify;
pub mod client;
pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod protocol;
pub mod server;

pub use classify::{Classifier, Labels};
pub use client::Sender;
pub use config::schema::PetalConfig;
pub use lifecycle::ShutdownCoordinator;
pub use server::{Server, ServerError, ServerHandle};
