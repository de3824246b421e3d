//! TCP listener and accept loop.
//!
//! # Responsibilities
//! - Bind to the configured address (failure is fatal at startup)
//! - Accept connections with a bounded wait so the run-state is re-checked
//! - Register each connection and spawn its session handler
//! - Graceful handling of accept errors

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};

use crate::config::ListenerConfig;
use crate::lifecycle::state::SharedRunState;
use crate::net::handler::SessionHandler;
use crate::net::session::SessionRegistry;

/// Pause after a failed accept so a persistent error cannot spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to address.
    Bind(std::io::Error),
    /// Failed to accept connection.
    Accept(std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {}

/// Bind a TCP listener to the configured address.
pub async fn bind(config: &ListenerConfig) -> Result<TcpListener, ListenerError> {
    let addr: SocketAddr = config
        .bind_address
        .parse()
        .map_err(|e| ListenerError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;

    let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
    let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

    tracing::info!(
        address = %local_addr,
        accept_timeout_ms = config.accept_timeout_ms,
        "Listener bound"
    );
    Ok(listener)
}

/// Cancellable accept loop.
///
/// Owns the listening socket; the socket is closed when `run` returns.
pub struct ConnectionAcceptor {
    listener: TcpListener,
    accept_timeout: Duration,
    registry: SessionRegistry,
    run_state: SharedRunState,
    handler: Arc<SessionHandler>,
}

impl ConnectionAcceptor {
    pub fn new(
        listener: TcpListener,
        accept_timeout: Duration,
        registry: SessionRegistry,
        run_state: SharedRunState,
        handler: Arc<SessionHandler>,
    ) -> Self {
        Self {
            listener,
            accept_timeout,
            registry,
            run_state,
            handler,
        }
    }

    /// Get the local address this acceptor is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Accept until the run-state leaves `Running`.
    pub async fn run(self) {
        while self.run_state.is_running() {
            match tokio::time::timeout(self.accept_timeout, self.listener.accept()).await {
                Err(_) => continue,
                Ok(Ok((stream, peer_addr))) => self.admit(stream, peer_addr),
                Ok(Err(e)) => {
                    if !self.run_state.is_running() {
                        break;
                    }
                    tracing::error!(error = %ListenerError::Accept(e), "Error accepting connection");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }

        tracing::info!(state = ?self.run_state.get(), "Accept loop stopped");
    }

    fn admit(&self, stream: TcpStream, peer_addr: SocketAddr) {
        if !self.run_state.is_running() {
            tracing::debug!(peer_addr = %peer_addr, "Dropping connection accepted during shutdown");
            return;
        }

        let (guard, closed) = self.registry.register(peer_addr);
        let id = guard.id();
        tracing::info!(
            session_id = %id,
            peer_addr = %peer_addr,
            active_sessions = self.registry.len(),
            "Connection accepted"
        );

        let handler = Arc::clone(&self.handler);
        let task = tokio::spawn(async move {
            let _ = handler.run(stream, guard, closed).await;
        });

        // A returned handle means the handler already finished; nothing to join.
        let _ = self.registry.attach_task(id, task);
    }
}
