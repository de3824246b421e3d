//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (timed accept loop, run-state check)
//!     → session.rs (register: id, peer, close signal, task handle)
//!     → handler.rs (read frame → classify → reply → deregister)
//!
//! Session States:
//!     Accepted → Receiving → Classifying → Responding → Closed
//! ```
//!
//! # Design Decisions
//! - One task per connection, no pooling
//! - Every session is registered so shutdown can force it closed
//! - Per-session failures never reach the accept loop

pub mod handler;
pub mod listener;
pub mod session;

pub use handler::{SessionError, SessionHandler, SessionOutcome};
pub use listener::{ConnectionAcceptor, ListenerError};
pub use session::{SessionId, SessionInfo, SessionRegistry, SessionState};
