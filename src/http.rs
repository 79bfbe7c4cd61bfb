//! HTTP polling transport
//!
//! `POST /` stores a notification, `GET /?since=<id>` returns everything
//! newer than the cursor. Every response carries permissive CORS headers
//! so an extension page can poll from any origin; `OPTIONS` preflights are
//! answered by the CORS layer itself.

use crate::error::ServerError;
use crate::store::NotificationStore;
use crate::{Notification, NotificationRequest, SubmitResponse};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{Method, StatusCode, header};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

/// Default port of the polling server.
pub const DEFAULT_PORT: u16 = 8765;

/// Query string of `GET /`.
#[derive(Debug, Default, Deserialize)]
pub struct PollParams {
    #[serde(default)]
    pub since: u64,
}

/// Build the polling router around a shared store.
pub fn router(store: Arc<NotificationStore>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(poll).post(submit))
        .fallback(not_found)
        .layer(cors)
        .with_state(store)
}

/// Serve on `addr` until `shutdown` resolves.
pub async fn serve<F>(
    addr: SocketAddr,
    store: Arc<NotificationStore>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;

    info!("Polling server running on http://{}", addr);
    info!(
        "Submit with: curl -X POST http://{} -H 'Content-Type: application/json' -d '{{\"title\":\"Task Complete\",\"message\":\"Build finished\",\"priority\":\"success\"}}'",
        addr
    );

    axum::serve(listener, router(store))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve)?;

    info!("Polling server stopped");
    Ok(())
}

async fn submit(
    State(store): State<Arc<NotificationStore>>,
    body: Bytes,
) -> (StatusCode, Json<SubmitResponse>) {
    match NotificationRequest::parse(&body) {
        Ok(request) => {
            let title = request.title.clone();
            let id = store.submit(request);
            info!(id, "Received: {}", title);
            (StatusCode::OK, Json(SubmitResponse::Ok { id }))
        }
        Err(e) => {
            warn!("Rejected submission: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(SubmitResponse::error(e.to_string())),
            )
        }
    }
}

async fn poll(
    State(store): State<Arc<NotificationStore>>,
    Query(params): Query<PollParams>,
) -> Json<Vec<Notification>> {
    let notifications = store.since(params.since);
    debug!(since = params.since, count = notifications.len(), "poll");
    Json(notifications)
}

async fn not_found() -> (StatusCode, Json<SubmitResponse>) {
    (StatusCode::NOT_FOUND, Json(SubmitResponse::error("not found")))
}
