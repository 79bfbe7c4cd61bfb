//! Producer side of the socket protocol, used by `herald send`
//!
//! # Claude Code hooks config:
//! ```json
//! { "type": "command", "command": "herald send 'Task Complete' 'Build finished' success" }
//! ```

use crate::error::ClientError;
use crate::{NotificationRequest, SubmitResponse};
use std::io::{Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::Path;

/// Submit one notification and wait for the relay's reply.
///
/// A relay that is not running surfaces as [`ClientError::Connect`], kept
/// apart from an `error` status the relay sends back.
pub fn send(path: &Path, request: &NotificationRequest) -> Result<SubmitResponse, ClientError> {
    let mut stream = UnixStream::connect(path).map_err(|source| ClientError::Connect {
        path: path.to_path_buf(),
        source,
    })?;

    let payload = serde_json::to_vec(request)?;
    stream.write_all(&payload)?;
    stream.shutdown(Shutdown::Write)?;

    let mut reply = Vec::new();
    stream.read_to_end(&mut reply)?;
    Ok(serde_json::from_slice(&reply)?)
}
