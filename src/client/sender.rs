//! One-shot image sender.
//!
//! # Responsibilities
//! - Connect with a bounded wait
//! - Write the framed payload in configured chunks, all or error, within a deadline
//! - Wait a bounded time for the reply and decode it
//!
//! # Design Decisions
//! - The connection is scoped to `send`; every return path drops it
//! - Raw replies are read with one bounded read; longer replies are truncated
//! - No automatic retry

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;

use crate::config::{PetalConfig, SenderConfig};
use crate::protocol::{read_frame, write_frame, FrameError, ResponseFraming};

/// Upper bound for a length-prefixed reply.
const MAX_FRAMED_RESPONSE: u64 = 1024 * 1024;

/// Errors returned by a send.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {}: {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed response frame: {0}")]
    Frame(FrameError),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("connection closed without a response")]
    NoResponse,

    #[error("response is not valid UTF-8")]
    InvalidResponse,
}

impl From<FrameError> for SendError {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::Io(e) => SendError::Io(e),
            FrameError::MissingHeader => SendError::NoResponse,
            other => SendError::Frame(other),
        }
    }
}

/// Sends one image per connection and returns the receiver's reply.
#[derive(Debug, Clone)]
pub struct Sender {
    config: SenderConfig,
    framing: ResponseFraming,
}

impl Sender {
    pub fn new(config: SenderConfig, framing: ResponseFraming) -> Self {
        Self { config, framing }
    }

    pub fn from_config(config: &PetalConfig) -> Self {
        Self::new(config.sender.clone(), config.protocol.response_framing)
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    /// Send to the configured server address.
    pub async fn send_to_server(&self, payload: &[u8]) -> Result<String, SendError> {
        self.send(payload, &self.config.server_address).await
    }

    /// Read an image file and send it.
    pub async fn send_file(&self, path: &Path, destination: &str) -> Result<String, SendError> {
        let payload = tokio::fs::read(path).await.map_err(|source| SendError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = ?path, bytes = payload.len(), "Image loaded");
        self.send(&payload, destination).await
    }

    /// Send `payload` to `destination` and wait for the reply.
    pub async fn send(&self, payload: &[u8], destination: &str) -> Result<String, SendError> {
        let mut stream = self.connect(destination).await?;

        let write_timeout = self.config.write_timeout();
        tokio::time::timeout(write_timeout, write_frame(&mut stream, payload, self.config.chunk_size))
            .await
            .map_err(|_| SendError::Timeout(write_timeout))??;
        tracing::debug!(
            destination = %destination,
            bytes = payload.len(),
            chunk_size = self.config.chunk_size,
            "Payload sent"
        );

        let timeout = self.config.response_timeout();
        let reply = tokio::time::timeout(timeout, self.read_response(&mut stream))
            .await
            .map_err(|_| SendError::Timeout(timeout))??;

        tracing::debug!(destination = %destination, reply = %reply, "Response received");
        Ok(reply)
    }

    async fn connect(&self, destination: &str) -> Result<TcpStream, SendError> {
        let connect_error = |source| SendError::Connect {
            address: destination.to_string(),
            source,
        };

        match tokio::time::timeout(self.config.connect_timeout(), TcpStream::connect(destination)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(connect_error(e)),
            Err(_) => Err(connect_error(io::Error::new(
                io::ErrorKind::TimedOut,
                "connection attempt timed out",
            ))),
        }
    }

    async fn read_response<R>(&self, stream: &mut R) -> Result<String, SendError>
    where
        R: AsyncRead + Unpin,
    {
        match self.framing {
            ResponseFraming::Raw => {
                let mut buf = vec![0u8; self.config.response_buffer_bytes];
                let read = stream.read(&mut buf).await?;
                if read == 0 {
                    return Err(SendError::NoResponse);
                }
                buf.truncate(read);
                decode_text(buf, true)
            }
            ResponseFraming::LengthPrefixed => {
                let body = read_frame(stream, MAX_FRAMED_RESPONSE).await?;
                decode_text(body, false)
            }
        }
    }
}

/// Decode reply bytes. With `allow_cut_tail`, an incomplete UTF-8 sequence
/// at the very end (a truncated raw read) is dropped rather than rejected.
fn decode_text(bytes: Vec<u8>, allow_cut_tail: bool) -> Result<String, SendError> {
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) if allow_cut_tail && e.utf8_error().error_len().is_none() => {
            let valid = e.utf8_error().valid_up_to();
            let mut bytes = e.into_bytes();
            bytes.truncate(valid);
            String::from_utf8(bytes).map_err(|_| SendError::InvalidResponse)
        }
        Err(_) => Err(SendError::InvalidResponse),
    }
}
