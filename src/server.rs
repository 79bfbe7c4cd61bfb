//! Unix socket ingress for producer submissions
//!
//! Each connection carries exactly one JSON notification, read with a single
//! bounded read. The notification is stamped, handed to the [`Bridge`], and
//! the producer gets one `SubmitResponse` back before the connection closes.

use crate::bridge::Bridge;
use crate::error::ServerError;
use crate::ipc::READ_BUFFER_SIZE;
use crate::{IdClock, NotificationRequest, SubmitResponse};
use std::future::Future;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixListener;
use tracing::{debug, info, trace, warn};

/// Bound listener that owns its socket file.
///
/// The file is removed when this value is dropped.
#[derive(Debug)]
pub struct IngressSocket {
    listener: UnixListener,
    path: PathBuf,
    clock: Arc<IdClock>,
}

impl IngressSocket {
    /// Bind the socket, clearing a stale file left by a previous run.
    ///
    /// Fails if a live listener answers on `path` or if `path` is something
    /// other than a socket.
    pub fn bind(path: impl Into<PathBuf>) -> Result<Self, ServerError> {
        let path = path.into();
        clear_stale_socket(&path)?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| ServerError::Socket {
                path: path.clone(),
                source,
            })?;
        }

        let listener = UnixListener::bind(&path).map_err(|source| ServerError::Socket {
            path: path.clone(),
            source,
        })?;

        if let Err(e) = std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)) {
            warn!("Failed to restrict permissions on {}: {}", path.display(), e);
        }

        info!("Listening on {}", path.display());

        Ok(Self {
            listener,
            path,
            clock: Arc::new(IdClock::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Every connection runs in its own task so a slow producer never holds
    /// up the others.
    pub async fn serve<W, F>(&self, bridge: Arc<Bridge<W>>, shutdown: F)
    where
        W: AsyncWrite + Unpin + Send + 'static,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Socket ingress shutting down");
                    return;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _addr)) => {
                        let bridge = Arc::clone(&bridge);
                        let clock = Arc::clone(&self.clock);
                        tokio::spawn(async move {
                            handle_connection(stream, &bridge, &clock).await;
                        });
                    }
                    Err(e) => {
                        warn!("Failed to accept socket connection: {}", e);
                    }
                },
            }
        }
    }
}

impl Drop for IngressSocket {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed socket {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove socket {}: {}", self.path.display(), e),
        }
    }
}

/// Remove `path` if it is a socket nobody is listening on.
fn clear_stale_socket(path: &Path) -> Result<(), ServerError> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(ServerError::Socket {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if !metadata.file_type().is_socket() {
        return Err(ServerError::NotASocket(path.to_path_buf()));
    }

    if std::os::unix::net::UnixStream::connect(path).is_ok() {
        return Err(ServerError::AddrInUse(path.to_path_buf()));
    }

    std::fs::remove_file(path).map_err(|source| ServerError::Socket {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Removed stale socket {}", path.display());
    Ok(())
}

/// Serve one producer: single read, parse, stamp, forward, reply.
pub async fn handle_connection<S, W>(mut stream: S, bridge: &Bridge<W>, clock: &IdClock)
where
    S: AsyncRead + AsyncWrite + Unpin,
    W: AsyncWrite + Unpin + Send,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let n = match stream.read(&mut buf).await {
        Ok(0) => {
            trace!("Connection closed without a submission");
            return;
        }
        Ok(n) => n,
        Err(e) => {
            warn!("Failed to read submission: {}", e);
            return;
        }
    };

    let response = match NotificationRequest::parse(&buf[..n]) {
        Ok(request) => {
            let notification = request.stamp(clock);
            if bridge.forward(&notification).await {
                info!(id = notification.id(), "Pushed: {}", notification.title());
                SubmitResponse::Ok {
                    id: notification.id(),
                }
            } else {
                SubmitResponse::error("extension host disconnected")
            }
        }
        Err(e) => {
            debug!("Rejected submission: {}", e);
            SubmitResponse::error(e.to_string())
        }
    };

    let reply = match serde_json::to_vec(&response) {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Failed to encode reply: {}", e);
            return;
        }
    };
    if let Err(e) = stream.write_all(&reply).await {
        debug!("Failed to send reply: {}", e);
        return;
    }
    let _ = stream.shutdown().await;
}
