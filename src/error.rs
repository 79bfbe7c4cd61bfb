//! Error types shared across the relay, polling store and client.

use std::path::PathBuf;
use thiserror::Error;

/// A producer submission could not be turned into a notification.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid notification: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures on the length-prefixed stdio channel.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("channel I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream in the middle of a frame.
    #[error("truncated frame: expected {expected} bytes, got {received}")]
    Truncated { expected: usize, received: usize },

    #[error("frame of {len} bytes exceeds limit of {max}")]
    TooLarge { len: usize, max: usize },

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Startup and serving failures of the socket and HTTP listeners.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Another live process is already listening on the socket path.
    #[error("socket {} is already in use by a running listener", .0.display())]
    AddrInUse(PathBuf),

    #[error("{} exists and is not a socket", .0.display())]
    NotASocket(PathBuf),

    #[error("socket {}: {source}", path.display())]
    Socket {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Failures of `herald send`.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Nothing accepted the connection; the relay is not running.
    #[error("cannot connect to {}: {source}", path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("socket I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid response: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures while installing the native messaging host manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("invalid extension id {0:?}: expected 32 characters in a-p")]
    InvalidExtensionId(String),

    #[error("invalid host name {0:?}: use lowercase letters, digits, '_' and '.'")]
    InvalidHostName(String),

    #[error("could not determine the browser configuration directory; pass --dir")]
    NoConfigDir,

    #[error("failed to write manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode manifest: {0}")]
    Json(#[from] serde_json::Error),
}
