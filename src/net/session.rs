//! Session state machine and registry.
//!
//! # Responsibilities
//! - Generate opaque session IDs for tracing
//! - Track every live session and its handler task
//! - Hand each handler a close signal the shutdown sweep can fire
//! - Deregister on every handler exit path via `SessionGuard`
//!
//! # Design Decisions
//! - The socket is owned by its handler; the registry holds the close signal
//!   that forces the handler to drop it
//! - Entries are removed only by the guard, after the socket is closed, so
//!   `len()` never undercounts open sockets

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::observability::metrics;

/// Opaque identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new unique session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sess-{}", self.0.simple())
    }
}

/// Phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Registered, handler not yet reading.
    Accepted,
    /// Reading header and payload.
    Receiving,
    /// Payload complete, classifier running.
    Classifying,
    /// Writing the reply.
    Responding,
    /// Socket closed, about to be deregistered.
    Closed,
}

#[derive(Debug)]
struct SessionEntry {
    peer_addr: SocketAddr,
    state: SessionState,
    accepted_at: Instant,
    close_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

/// Point-in-time view of a registered session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: SessionId,
    pub peer_addr: SocketAddr,
    pub state: SessionState,
    pub age: Duration,
}

/// Thread-safe map of live sessions.
///
/// Written by the acceptor (register, attach task) and by each handler
/// (state updates, removal through its guard).
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<DashMap<SessionId, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly accepted connection in state `Accepted`.
    ///
    /// The returned guard deregisters the session when dropped.
    pub fn register(&self, peer_addr: SocketAddr) -> (SessionGuard, CloseSignal) {
        let id = SessionId::new();
        let (close_tx, close_rx) = watch::channel(false);

        self.inner.insert(
            id,
            SessionEntry {
                peer_addr,
                state: SessionState::Accepted,
                accepted_at: Instant::now(),
                close_tx,
                task: None,
            },
        );
        metrics::record_active_sessions(self.inner.len());

        let guard = SessionGuard {
            id,
            peer_addr,
            registry: self.clone(),
        };
        (guard, CloseSignal { rx: close_rx })
    }

    /// Record the handler task for a session.
    ///
    /// If the handler already finished and deregistered, the handle is
    /// returned to the caller instead.
    pub fn attach_task(&self, id: SessionId, task: JoinHandle<()>) -> Option<JoinHandle<()>> {
        match self.inner.get_mut(&id) {
            Some(mut entry) => {
                entry.task = Some(task);
                None
            }
            None => Some(task),
        }
    }

    pub fn set_state(&self, id: SessionId, state: SessionState) {
        if let Some(mut entry) = self.inner.get_mut(&id) {
            tracing::trace!(session_id = %id, from = ?entry.state, to = ?state, "Session state change");
            entry.state = state;
        }
    }

    pub fn state(&self, id: SessionId) -> Option<SessionState> {
        self.inner.get(&id).map(|entry| entry.state)
    }

    /// Fire the close signal of every registered session.
    ///
    /// Returns how many sessions were newly signalled; sessions already
    /// signalled by an earlier sweep are not counted again.
    pub fn close_all(&self) -> usize {
        let mut signalled = 0;
        for entry in self.inner.iter() {
            let fired = entry.close_tx.send_if_modified(|closed| {
                if *closed {
                    false
                } else {
                    *closed = true;
                    true
                }
            });
            if fired {
                signalled += 1;
            }
        }
        signalled
    }

    /// Take every recorded handler task handle, leaving the sessions registered.
    ///
    /// A handle still in the registry when its handler exits is dropped
    /// with the entry, so take handles before signalling close.
    pub fn take_tasks(&self) -> Vec<(SessionId, JoinHandle<()>)> {
        self.inner
            .iter_mut()
            .filter_map(|mut entry| {
                let id = *entry.key();
                entry.task.take().map(|task| (id, task))
            })
            .collect()
    }

    pub fn snapshot(&self) -> Vec<SessionInfo> {
        self.inner
            .iter()
            .map(|entry| SessionInfo {
                id: *entry.key(),
                peer_addr: entry.peer_addr,
                state: entry.state,
                age: entry.accepted_at.elapsed(),
            })
            .collect()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.inner.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn remove(&self, id: SessionId) -> Option<Duration> {
        let removed = self.inner.remove(&id).map(|(_, entry)| entry.accepted_at.elapsed());
        metrics::record_active_sessions(self.inner.len());
        removed
    }
}

/// Receiving half of a session's close signal.
#[derive(Debug)]
pub struct CloseSignal {
    rx: watch::Receiver<bool>,
}

impl CloseSignal {
    /// Resolve once the session has been told to close.
    ///
    /// A dropped sender means the entry is gone, which also counts as closed.
    pub async fn closed(&mut self) {
        let _ = self.rx.wait_for(|closed| *closed).await;
    }

    pub fn is_closed(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Ties a session's registration to its handler's lifetime.
/// Deregisters the session (and drops any task handle not yet taken) when dropped.
#[derive(Debug)]
pub struct SessionGuard {
    id: SessionId,
    peer_addr: SocketAddr,
    registry: SessionRegistry,
}

impl SessionGuard {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn set_state(&self, state: SessionState) {
        self.registry.set_state(self.id, state);
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let lifetime = self.registry.remove(self.id);
        tracing::trace!(session_id = %self.id, ?lifetime, "Session deregistered");
    }
}
