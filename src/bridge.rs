//! Relay bridge between the socket ingress and the extension
//!
//! Owns the write half of the stdio channel. Forwarding and the ping
//! responder both write through one async mutex so a frame's prefix and
//! body are never split by another writer.

use crate::Notification;
use crate::error::FrameError;
use crate::framing::{self, FrameWriter, InboundMessage, OutboundMessage};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};

#[derive(Debug)]
pub struct Bridge<W> {
    writer: Mutex<FrameWriter<W>>,
}

impl<W> Bridge<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(FrameWriter::new(writer)),
        }
    }

    /// Write one `notification` frame. Returns `false` when the extension
    /// is gone; the caller reports that to its producer.
    pub async fn forward(&self, notification: &Notification) -> bool {
        let message = OutboundMessage::Notification { data: notification };
        match self.writer.lock().await.send(&message).await {
            Ok(()) => {
                debug!(id = notification.id(), "forwarded notification");
                true
            }
            Err(e) => {
                warn!("Failed to forward notification {}: {}", notification.id(), e);
                false
            }
        }
    }

    /// Write one `pong` frame.
    pub async fn pong(&self) -> bool {
        match self.writer.lock().await.send(&OutboundMessage::Pong).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to send pong: {}", e);
                false
            }
        }
    }

    /// Read frames from the extension until it closes the channel.
    ///
    /// Every `ping` is answered with one `pong` before the next frame is
    /// read. Returns `Ok(())` on orderly closure; the caller is expected
    /// to exit rather than read again.
    pub async fn run_inbound<R>(&self, mut reader: R) -> Result<(), FrameError>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            let Some(payload) = framing::read_frame(&mut reader).await? else {
                info!("Extension disconnected");
                return Ok(());
            };

            match InboundMessage::decode(&payload) {
                InboundMessage::Ping => {
                    trace!("ping");
                    self.pong().await;
                }
                InboundMessage::Other => {
                    debug!(len = payload.len(), "ignoring inbound frame");
                }
            }
        }
    }
}
