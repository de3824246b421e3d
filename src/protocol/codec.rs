//! Length-prefixed frame codec.
//!
//! # Responsibilities
//! - Encode payloads behind an 8-byte big-endian length header
//! - Decode headers and in-memory frames
//! - Accumulate partial reads until the declared length is satisfied
//!
//! # Design Decisions
//! - No size cap at encode time; receivers enforce their own limit in `read_frame`
//! - Buffers grow with the data actually received, never with the declared length

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Size of the frame length header in bytes.
pub const HEADER_LEN: usize = 8;

/// Upper bound on a single read into the accumulation buffer.
const READ_CHUNK: usize = 64 * 1024;

/// Errors produced while encoding, decoding or reading frames.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The stream closed before any header byte arrived.
    #[error("stream closed before a frame header arrived")]
    MissingHeader,

    /// Fewer than 8 header bytes were available.
    #[error("frame header too short: expected 8 bytes, got {0}")]
    ShortHeader(usize),

    /// The declared payload length exceeds the receiver's limit.
    #[error("declared payload of {declared} bytes exceeds limit of {limit} bytes")]
    TooLarge { declared: u64, limit: u64 },

    /// An in-memory frame carried bytes past its declared payload.
    #[error("{0} trailing bytes after frame payload")]
    TrailingBytes(usize),

    /// The stream closed before the declared length was satisfied.
    #[error("stream closed after {received} of {expected} bytes")]
    ShortRead { expected: u64, received: u64 },

    /// Underlying socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// True for errors caused by a malformed or missing header.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            FrameError::MissingHeader
                | FrameError::ShortHeader(_)
                | FrameError::TooLarge { .. }
                | FrameError::TrailingBytes(_)
        )
    }

    /// True when the peer closed mid-payload.
    pub fn is_short_read(&self) -> bool {
        matches!(self, FrameError::ShortRead { .. })
    }
}

/// Encode a payload as `[len: u64 BE][payload]`.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Decode the big-endian length from the first 8 bytes of `bytes`.
pub fn decode_header(bytes: &[u8]) -> Result<u64, FrameError> {
    let header: [u8; HEADER_LEN] = bytes
        .get(..HEADER_LEN)
        .and_then(|h| h.try_into().ok())
        .ok_or(FrameError::ShortHeader(bytes.len()))?;
    Ok(u64::from_be_bytes(header))
}

/// Decode a complete in-memory frame, returning its payload.
pub fn decode(bytes: &[u8]) -> Result<&[u8], FrameError> {
    let declared = decode_header(bytes)?;
    let body = &bytes[HEADER_LEN..];
    let received = body.len() as u64;

    if received < declared {
        return Err(FrameError::ShortRead {
            expected: declared,
            received,
        });
    }
    if received > declared {
        return Err(FrameError::TrailingBytes((received - declared) as usize));
    }
    Ok(body)
}

/// Read exactly `n` bytes from `source`.
///
/// A single `read` may return any amount between one byte and the buffer
/// size, so this keeps reading until `n` bytes are collected. A zero-length
/// read before that point means the peer closed the stream.
pub async fn read_exact<R>(source: &mut R, n: u64) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let expected = usize::try_from(n).map_err(|_| FrameError::TooLarge {
        declared: n,
        limit: usize::MAX as u64,
    })?;

    let mut buf = Vec::with_capacity(expected.min(READ_CHUNK));
    while buf.len() < expected {
        let start = buf.len();
        let want = (expected - start).min(READ_CHUNK);
        buf.resize(start + want, 0);

        let read = source.read(&mut buf[start..]).await?;
        buf.truncate(start + read);

        if read == 0 {
            return Err(FrameError::ShortRead {
                expected: n,
                received: start as u64,
            });
        }
    }
    Ok(buf)
}

/// Read one frame, rejecting declared lengths above `max_len` before the
/// body is read.
pub async fn read_frame<R>(source: &mut R, max_len: u64) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let header = match read_exact(source, HEADER_LEN as u64).await {
        Ok(header) => header,
        Err(FrameError::ShortRead { received: 0, .. }) => return Err(FrameError::MissingHeader),
        Err(FrameError::ShortRead { received, .. }) => {
            return Err(FrameError::ShortHeader(received as usize))
        }
        Err(e) => return Err(e),
    };

    let declared = decode_header(&header)?;
    if declared > max_len {
        return Err(FrameError::TooLarge {
            declared,
            limit: max_len,
        });
    }

    read_exact(source, declared).await
}

/// Write a frame: the header, then the payload in `chunk_size` pieces.
///
/// Every byte is written or an error is returned.
pub async fn write_frame<W>(sink: &mut W, payload: &[u8], chunk_size: usize) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    sink.write_all(&(payload.len() as u64).to_be_bytes()).await?;
    for chunk in payload.chunks(chunk_size.max(1)) {
        sink.write_all(chunk).await?;
    }
    sink.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn encode_prefixes_big_endian_length() {
        let frame = encode(b"abc");
        assert_eq!(&frame[..HEADER_LEN], &[0, 0, 0, 0, 0, 0, 0, 3]);
        assert_eq!(&frame[HEADER_LEN..], b"abc");
    }

    #[test]
    fn decode_inverts_encode() {
        for len in [0usize, 1, 7, 8, 1024, 50_000] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let frame = encode(&payload);
            assert_eq!(decode(&frame).unwrap(), payload.as_slice());
        }
    }

    #[test]
    fn decode_header_rejects_short_input() {
        let err = decode_header(&[0, 0, 1]).unwrap_err();
        assert!(matches!(err, FrameError::ShortHeader(3)));
        assert!(err.is_framing());
    }

    #[test]
    fn decode_header_reads_large_values() {
        let header = u64::MAX.to_be_bytes();
        assert_eq!(decode_header(&header).unwrap(), u64::MAX);
    }

    #[test]
    fn decode_detects_truncated_and_trailing_bodies() {
        let mut frame = encode(b"hello");
        frame.pop();
        assert!(decode(&frame).unwrap_err().is_short_read());

        let mut frame = encode(b"hello");
        frame.push(b'!');
        assert!(matches!(decode(&frame), Err(FrameError::TrailingBytes(1))));
    }

    #[tokio::test]
    async fn read_exact_survives_single_byte_fragments() {
        let payload: Vec<u8> = (0..4096u32).map(|i| (i * 7 % 256) as u8).collect();
        let (mut tx, mut rx) = tokio::io::duplex(1);

        let expected = payload.clone();
        let writer = tokio::spawn(async move {
            for byte in &payload {
                tx.write_all(std::slice::from_ref(byte)).await.unwrap();
            }
        });

        let got = read_exact(&mut rx, expected.len() as u64).await.unwrap();
        writer.await.unwrap();
        assert_eq!(got, expected);
    }

    #[tokio::test]
    async fn read_exact_reports_short_read_on_early_close() {
        let (mut tx, mut rx) = tokio::io::duplex(64);
        tx.write_all(&[1u8; 10]).await.unwrap();
        drop(tx);

        match read_exact(&mut rx, 1000).await {
            Err(FrameError::ShortRead { expected, received }) => {
                assert_eq!(expected, 1000);
                assert_eq!(received, 10);
            }
            other => panic!("expected short read, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn read_exact_of_zero_bytes_returns_immediately() {
        let (_tx, mut rx) = tokio::io::duplex(8);
        assert!(read_exact(&mut rx, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn read_frame_classifies_header_failures() {
        let (tx, mut rx) = tokio::io::duplex(64);
        drop(tx);
        assert!(matches!(read_frame(&mut rx, 1024).await, Err(FrameError::MissingHeader)));

        let (mut tx, mut rx) = tokio::io::duplex(64);
        tx.write_all(&[0, 0, 0]).await.unwrap();
        drop(tx);
        assert!(matches!(read_frame(&mut rx, 1024).await, Err(FrameError::ShortHeader(3))));
    }

    #[tokio::test]
    async fn read_frame_rejects_oversized_declaration() {
        let (mut tx, mut rx) = tokio::io::duplex(64);
        tx.write_all(&2048u64.to_be_bytes()).await.unwrap();

        match read_frame(&mut rx, 1024).await {
            Err(FrameError::TooLarge { declared, limit }) => {
                assert_eq!(declared, 2048);
                assert_eq!(limit, 1024);
            }
            other => panic!("expected TooLarge, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn write_frame_then_read_frame_with_small_chunks() {
        let payload = vec![42u8; 5000];
        let (mut tx, mut rx) = tokio::io::duplex(256);

        let sent = payload.clone();
        let writer = tokio::spawn(async move { write_frame(&mut tx, &sent, 100).await });

        let got = read_frame(&mut rx, 10_000).await.unwrap();
        writer.await.unwrap().unwrap();
        assert_eq!(got, payload);
    }
}
