//! Unix socket location shared by the relay and `herald send`
//!
//! Producers write one JSON object per connection and read back one
//! `SubmitResponse`; see `server` and `client` for the two ends.

use std::path::{Path, PathBuf};

/// Socket file name inside the temp directory.
pub const SOCKET_NAME: &str = "herald.sock";

/// Environment variable overriding the socket path.
pub const SOCKET_ENV: &str = "HERALD_SOCKET";

/// Upper bound on a single producer submission, read in one go.
pub const READ_BUFFER_SIZE: usize = 4096;

/// Default socket path for the relay (e.g. `/tmp/herald.sock`).
pub fn default_socket_path() -> PathBuf {
    std::env::temp_dir().join(SOCKET_NAME)
}

/// Pick the configured path, falling back to the default.
pub fn socket_path(configured: Option<&Path>) -> PathBuf {
    configured.map_or_else(default_socket_path, Path::to_path_buf)
}
