//! Receiver assembly.
//!
//! # Responsibilities
//! - Bind the listener (the only fatal startup failure)
//! - Wire registry, run-state, session handler and acceptor together
//! - Hand back a handle for inspection and shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::classify::Classifier;
use crate::config::PetalConfig;
use crate::lifecycle::{RunState, SharedRunState, ShutdownCoordinator, ShutdownReport};
use crate::net::listener::{self, ConnectionAcceptor, ListenerError};
use crate::net::{SessionHandler, SessionRegistry};

/// Extra time, on top of one accept tick, allowed for the acceptor to exit.
const ACCEPTOR_GRACE_MARGIN: Duration = Duration::from_millis(500);

/// Fatal receiver startup failures.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be bound.
    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),
}

impl From<ListenerError> for ServerError {
    fn from(e: ListenerError) -> Self {
        match e {
            ListenerError::Bind(e) | ListenerError::Accept(e) => ServerError::Bind(e),
        }
    }
}

/// A bound but not yet running receiver.
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: PetalConfig,
    classifier: Arc<dyn Classifier>,
}

impl Server {
    /// Bind the configured address.
    pub async fn bind(config: PetalConfig, classifier: Arc<dyn Classifier>) -> Result<Self, ServerError> {
        let listener = listener::bind(&config.listener).await?;
        let local_addr = listener.local_addr().map_err(ServerError::Bind)?;
        Ok(Self {
            listener,
            local_addr,
            config,
            classifier,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Enter `Running` and start accepting connections.
    pub fn start(self) -> ServerHandle {
        let registry = SessionRegistry::new();
        let run_state = SharedRunState::new();
        run_state.set(RunState::Running);

        let handler = Arc::new(SessionHandler::new(self.classifier, &self.config));
        let accept_timeout = self.config.listener.accept_timeout();
        let acceptor = ConnectionAcceptor::new(
            self.listener,
            accept_timeout,
            registry.clone(),
            run_state.clone(),
            handler,
        );
        let acceptor_task = tokio::spawn(acceptor.run());

        let coordinator = ShutdownCoordinator::new(
            run_state.clone(),
            registry.clone(),
            acceptor_task,
            accept_timeout + ACCEPTOR_GRACE_MARGIN,
            self.config.shutdown.join_timeout(),
        );

        tracing::info!(
            address = %self.local_addr,
            response_framing = ?self.config.protocol.response_framing,
            "Receiver running"
        );

        ServerHandle {
            local_addr: self.local_addr,
            registry,
            run_state,
            coordinator,
        }
    }
}

/// Handle to a running receiver.
pub struct ServerHandle {
    local_addr: SocketAddr,
    registry: SessionRegistry,
    run_state: SharedRunState,
    coordinator: ShutdownCoordinator,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn run_state(&self) -> RunState {
        self.run_state.get()
    }

    /// Stop accepting, close live sessions and join their handlers.
    pub async fn stop(&self) -> ShutdownReport {
        self.coordinator.shutdown().await
    }
}
