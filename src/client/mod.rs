//! Sender side of the protocol.

pub mod sender;

pub use sender::{SendError, Sender};
