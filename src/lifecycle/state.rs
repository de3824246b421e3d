//! Receiver run-state.
//!
//! # State Transitions
//! ```text
//! Stopped → Running: Server::start
//! Running → Stopping: ShutdownCoordinator::shutdown
//! Stopping → Stopped: all handler tasks joined
//! ```

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Lifecycle flag controlling session admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    Stopped = 0,
    Running = 1,
    Stopping = 2,
}

impl RunState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => RunState::Running,
            2 => RunState::Stopping,
            _ => RunState::Stopped,
        }
    }
}

/// Run-state shared between the acceptor and the shutdown coordinator.
#[derive(Debug, Clone)]
pub struct SharedRunState(Arc<AtomicU8>);

impl SharedRunState {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(RunState::Stopped as u8)))
    }

    pub fn get(&self) -> RunState {
        RunState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: RunState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.get() == RunState::Running
    }

    /// Move `from → to` atomically. Returns false if the state was not `from`.
    pub fn transition(&self, from: RunState, to: RunState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl Default for SharedRunState {
    fn default() -> Self {
        Self::new()
    }
}
