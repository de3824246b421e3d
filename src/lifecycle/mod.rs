//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (server.rs):
//!     Load config → Load labels → Bind listener → Running → Spawn acceptor
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stopping → Close sessions → Close listener → Join → Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Bind failure is the only fatal startup error
//! - Shutdown never blocks indefinitely: every join is bounded

pub mod shutdown;
pub mod signals;
pub mod state;

pub use shutdown::{ShutdownCoordinator, ShutdownReport};
pub use signals::shutdown_signal;
pub use state::{RunState, SharedRunState};
