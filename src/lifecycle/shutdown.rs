//! Shutdown coordination for the receiver.
//!
//! # Sequence
//! ```text
//! Running → Stopping
//!     → take every handler task handle, then close every registered session
//!       (unblocks handlers stuck in reads)
//!     → wait for the acceptor to exit, which closes the listening socket
//!     → sweep again for sessions admitted while the acceptor was winding down
//!     → join each handler task, bounded per task (abort on timeout)
//! → Stopped
//! ```

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::lifecycle::state::{RunState, SharedRunState};
use crate::net::session::{SessionId, SessionRegistry};

/// What a shutdown did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Sessions whose sockets were force-closed.
    pub closed_sessions: usize,
    /// Handler tasks that finished within the join timeout.
    pub joined: usize,
    /// Handler tasks aborted after the join timeout.
    pub aborted: usize,
}

/// Drives the receiver from `Running` to `Stopped`.
pub struct ShutdownCoordinator {
    run_state: SharedRunState,
    registry: SessionRegistry,
    acceptor: Mutex<Option<JoinHandle<()>>>,
    acceptor_grace: Duration,
    join_timeout: Duration,
}

impl ShutdownCoordinator {
    /// `acceptor_grace` bounds the wait for the accept loop to notice the
    /// state change; it should exceed the accept timeout.
    pub fn new(
        run_state: SharedRunState,
        registry: SessionRegistry,
        acceptor: JoinHandle<()>,
        acceptor_grace: Duration,
        join_timeout: Duration,
    ) -> Self {
        Self {
            run_state,
            registry,
            acceptor: Mutex::new(Some(acceptor)),
            acceptor_grace,
            join_timeout,
        }
    }

    /// Run the shutdown sequence. Later and concurrent calls return an empty report.
    pub async fn shutdown(&self) -> ShutdownReport {
        let mut acceptor = self.acceptor.lock().await;
        if !self.run_state.transition(RunState::Running, RunState::Stopping) {
            tracing::debug!(state = ?self.run_state.get(), "Shutdown already handled");
            return ShutdownReport::default();
        }

        tracing::info!(active_sessions = self.registry.len(), "Stopping receiver");
        for session in self.registry.snapshot() {
            tracing::debug!(
                session_id = %session.id,
                peer = %session.peer_addr,
                state = ?session.state,
                age_ms = session.age.as_millis() as u64,
                "Closing session"
            );
        }

        // Handles must be out of the registry before the close signal fires:
        // a closed handler deregisters itself and its entry goes with it.
        let mut tasks = self.registry.take_tasks();
        let mut report = ShutdownReport {
            closed_sessions: self.registry.close_all(),
            ..ShutdownReport::default()
        };

        if let Some(task) = acceptor.take() {
            self.close_listener(task).await;
        }
        tasks.extend(self.registry.take_tasks());
        report.closed_sessions += self.registry.close_all();

        for (id, task) in tasks {
            if self.join_session(id, task).await {
                report.joined += 1;
            } else {
                report.aborted += 1;
            }
        }

        self.run_state.set(RunState::Stopped);
        tracing::info!(
            closed_sessions = report.closed_sessions,
            joined = report.joined,
            aborted = report.aborted,
            remaining_sessions = self.registry.len(),
            "Receiver stopped"
        );
        report
    }

    async fn close_listener(&self, mut task: JoinHandle<()>) {
        match tokio::time::timeout(self.acceptor_grace, &mut task).await {
            Ok(Ok(())) => tracing::debug!("Listener closed"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Accept loop ended abnormally"),
            Err(_) => {
                tracing::warn!(
                    grace_ms = self.acceptor_grace.as_millis() as u64,
                    "Accept loop did not stop in time; aborting"
                );
                task.abort();
                let _ = task.await;
            }
        }
    }

    /// Returns true if the task finished on its own.
    async fn join_session(&self, id: SessionId, mut task: JoinHandle<()>) -> bool {
        match tokio::time::timeout(self.join_timeout, &mut task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!(session_id = %id, error = %e, "Session task failed");
                true
            }
            Err(_) => {
                tracing::warn!(
                    session_id = %id,
                    join_timeout_ms = self.join_timeout.as_millis() as u64,
                    "Session did not finish in time; aborting"
                );
                task.abort();
                let _ = tokio::time::timeout(self.join_timeout, task).await;
                false
            }
        }
    }
}
