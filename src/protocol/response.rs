//! Response encoding.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::protocol::codec::{encode, FrameError};

/// How the receiver frames its reply.
///
/// `Raw` is the historical wire format: unframed UTF-8 ended by connection
/// close, read by senders with a single bounded read. `LengthPrefixed`
/// reuses the request frame layout and must be enabled on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFraming {
    #[default]
    Raw,
    LengthPrefixed,
}

/// Write a response text using the given framing.
pub async fn write_response<W>(sink: &mut W, text: &str, framing: ResponseFraming) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    match framing {
        ResponseFraming::Raw => sink.write_all(text.as_bytes()).await?,
        ResponseFraming::LengthPrefixed => sink.write_all(&encode(text.as_bytes())).await?,
    }
    sink.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::read_frame;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn raw_response_is_unframed() {
        let (mut tx, mut rx) = tokio::io::duplex(256);
        write_response(&mut tx, "안녕", ResponseFraming::Raw).await.unwrap();
        drop(tx);

        let mut got = String::new();
        rx.read_to_string(&mut got).await.unwrap();
        assert_eq!(got, "안녕");
    }

    #[tokio::test]
    async fn length_prefixed_response_is_a_frame() {
        let (mut tx, mut rx) = tokio::io::duplex(256);
        write_response(&mut tx, "rose", ResponseFraming::LengthPrefixed)
            .await
            .unwrap();

        let body = read_frame(&mut rx, 1024).await.unwrap();
        assert_eq!(body, b"rose");
    }

    #[test]
    fn framing_parses_from_toml_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            framing: ResponseFraming,
        }
        let w: Wrapper = toml::from_str("framing = \"length_prefixed\"").unwrap();
        assert_eq!(w.framing, ResponseFraming::LengthPrefixed);
    }
}
