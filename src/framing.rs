//! Native messaging frames over stdin/stdout
//!
//! Each message is a 4-byte little-endian `u32` length followed by exactly
//! that many bytes of UTF-8 JSON. The browser dictates this layout; it must
//! not change.
//!
//! A zero-byte read where a length prefix should start means the browser
//! closed the pipe. That is the only way the channel ends.

use crate::Notification;
use crate::error::FrameError;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest message the browser sends to a host.
pub const MAX_INBOUND_FRAME: usize = 64 * 1024 * 1024;

/// Largest message a host may send to the browser.
pub const MAX_OUTBOUND_FRAME: usize = 1024 * 1024;

const PREFIX_LEN: usize = 4;

/// Messages written to the extension.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage<'a> {
    Notification { data: &'a Notification },
    Pong,
}

/// Messages read from the extension. Only `ping` means anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundMessage {
    Ping,
    Other,
}

impl InboundMessage {
    /// Classify a frame body. Never fails: unknown types, non-objects and
    /// invalid JSON are all `Other`.
    pub fn decode(payload: &[u8]) -> Self {
        #[derive(Deserialize)]
        struct Tagged {
            #[serde(rename = "type")]
            kind: Option<String>,
        }

        match serde_json::from_slice::<Tagged>(payload) {
            Ok(Tagged { kind: Some(kind) }) if kind == "ping" => Self::Ping,
            _ => Self::Other,
        }
    }
}

/// Prefix `payload` with its length, producing one contiguous frame.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.len() > MAX_OUTBOUND_FRAME {
        return Err(FrameError::TooLarge {
            len: payload.len(),
            max: MAX_OUTBOUND_FRAME,
        });
    }
    // Bounded by MAX_OUTBOUND_FRAME above.
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge {
        len: payload.len(),
        max: MAX_OUTBOUND_FRAME,
    })?;

    let mut frame = Vec::with_capacity(PREFIX_LEN + payload.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Read one frame body.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly between
/// frames. EOF inside a frame is [`FrameError::Truncated`].
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; PREFIX_LEN];
    let received = fill(reader, &mut prefix).await?;
    if received == 0 {
        return Ok(None);
    }
    if received < PREFIX_LEN {
        return Err(FrameError::Truncated {
            expected: PREFIX_LEN,
            received,
        });
    }

    let len = u32::from_le_bytes(prefix) as usize;
    if len > MAX_INBOUND_FRAME {
        return Err(FrameError::TooLarge {
            len,
            max: MAX_INBOUND_FRAME,
        });
    }

    let mut body = vec![0u8; len];
    let received = fill(reader, &mut body).await?;
    if received < len {
        return Err(FrameError::Truncated {
            expected: len,
            received,
        });
    }
    Ok(Some(body))
}

/// Read until `buf` is full or EOF, returning the number of bytes read.
async fn fill<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Write half of the channel.
///
/// Does no locking of its own; callers sharing one writer serialize
/// access (see `Bridge`).
#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
}

impl<W> FrameWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Encode and write one message, prefix and body in a single buffer,
    /// then flush.
    pub async fn send(&mut self, message: &OutboundMessage<'_>) -> Result<(), FrameError> {
        let payload = serde_json::to_vec(message)?;
        let frame = encode_frame(&payload)?;
        self.inner.write_all(&frame).await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
