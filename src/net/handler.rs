//! Per-connection session handler.
//!
//! # Responsibilities
//! - Read one frame (header, then exactly the declared payload)
//! - Run the classifier on the blocking pool
//! - Write the reply, then close the socket
//! - Deregister the session on every exit path
//!
//! # Design Decisions
//! - Single pass, no retries; any read/write failure ends the session normally
//! - Classification failure still produces a reply; framing failure does not
//! - A fired close signal wins over whatever phase the session is in

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::classify::{ClassificationError, Classifier, Labels};
use crate::config::PetalConfig;
use crate::net::session::{CloseSignal, SessionGuard, SessionState};
use crate::observability::metrics;
use crate::protocol::{read_frame, write_response, FrameError, ResponseFraming};

/// Why a session ended without completing.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Header or payload could not be read.
    #[error("failed to receive frame: {0}")]
    Receive(#[source] FrameError),

    /// The reply could not be written.
    #[error("failed to send response: {0}")]
    Respond(#[source] FrameError),

    /// The shutdown coordinator closed the session.
    #[error("session closed by shutdown")]
    Closed,
}

impl SessionError {
    fn outcome_label(&self) -> &'static str {
        match self {
            SessionError::Receive(e) if e.is_short_read() => "short_read",
            SessionError::Receive(e) if e.is_framing() => "framing_error",
            SessionError::Receive(_) => "receive_error",
            SessionError::Respond(_) => "respond_error",
            SessionError::Closed => "closed",
        }
    }
}

/// How a completed session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The classifier produced labels and they were sent.
    Classified(Labels),
    /// The classifier failed and the failure text was sent.
    ClassificationFailed(ClassificationError),
}

impl SessionOutcome {
    fn outcome_label(&self) -> &'static str {
        match self {
            SessionOutcome::Classified(_) => "classified",
            SessionOutcome::ClassificationFailed(_) => "classification_failed",
        }
    }
}

/// Reply text for a classification result.
pub fn reply_text(result: &Result<Labels, ClassificationError>) -> String {
    match result {
        Ok(labels) => format!("이 꽃은 {}({})인 것 같아요!", labels.localized, labels.english),
        Err(e) => format!("이미지를 분류하지 못했어요: {}", e),
    }
}

/// Serves one request per connection.
pub struct SessionHandler {
    classifier: Arc<dyn Classifier>,
    max_payload_bytes: u64,
    framing: ResponseFraming,
}

impl SessionHandler {
    pub fn new(classifier: Arc<dyn Classifier>, config: &PetalConfig) -> Self {
        Self {
            classifier,
            max_payload_bytes: config.listener.max_payload_bytes,
            framing: config.protocol.response_framing,
        }
    }

    /// Drive a session to completion and clean it up.
    pub async fn run<S>(&self, stream: S, guard: SessionGuard, mut closed: CloseSignal) -> Result<SessionOutcome, SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let started = Instant::now();
        let mut stream = stream;

        let result = tokio::select! {
            biased;
            _ = closed.closed() => Err(SessionError::Closed),
            result = self.serve(&mut stream, &guard) => result,
        };

        // The peer may already be gone; shutdown errors are expected here.
        let _ = stream.shutdown().await;
        drop(stream);
        guard.set_state(SessionState::Closed);

        match &result {
            Ok(outcome) => tracing::info!(
                session_id = %guard.id(),
                peer_addr = %guard.peer_addr(),
                outcome = outcome.outcome_label(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Session completed"
            ),
            Err(SessionError::Closed) => tracing::debug!(
                session_id = %guard.id(),
                peer_addr = %guard.peer_addr(),
                "Session closed during shutdown"
            ),
            Err(e) => tracing::warn!(
                session_id = %guard.id(),
                peer_addr = %guard.peer_addr(),
                error = %e,
                "Session failed"
            ),
        }
        metrics::record_session(match &result {
            Ok(outcome) => outcome.outcome_label(),
            Err(e) => e.outcome_label(),
        });

        drop(guard);
        result
    }

    async fn serve<S>(&self, stream: &mut S, guard: &SessionGuard) -> Result<SessionOutcome, SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        guard.set_state(SessionState::Receiving);
        let payload = read_frame(stream, self.max_payload_bytes)
            .await
            .map_err(SessionError::Receive)?;
        metrics::record_payload(payload.len());
        tracing::debug!(session_id = %guard.id(), bytes = payload.len(), "Payload received");

        guard.set_state(SessionState::Classifying);
        let result = self.classify(payload).await;
        let reply = reply_text(&result);
        match &result {
            Ok(labels) => tracing::info!(
                session_id = %guard.id(),
                english = %labels.english,
                localized = %labels.localized,
                "Image classified"
            ),
            Err(e) => tracing::warn!(session_id = %guard.id(), error = %e, "Classification failed"),
        }

        guard.set_state(SessionState::Responding);
        write_response(stream, &reply, self.framing)
            .await
            .map_err(SessionError::Respond)?;

        Ok(match result {
            Ok(labels) => SessionOutcome::Classified(labels),
            Err(e) => SessionOutcome::ClassificationFailed(e),
        })
    }

    async fn classify(&self, payload: Vec<u8>) -> Result<Labels, ClassificationError> {
        let classifier = Arc::clone(&self.classifier);
        let start = Instant::now();

        let result = tokio::task::spawn_blocking(move || classifier.classify(&payload))
            .await
            .unwrap_or_else(|e| Err(ClassificationError::Aborted(e.to_string())));

        metrics::record_classification(start);
        result
    }
}
