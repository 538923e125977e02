use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::notify::{Notification, StatusBoard};
use crate::storage::{PlatformStorage, PNG_MIME};
use crate::trigger::CaptureTrigger;

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

pub struct ControlState {
    pub trigger: CaptureTrigger,
    pub board: Arc<StatusBoard>,
    pub storage: Arc<dyn PlatformStorage>,
}

#[derive(Debug, Serialize)]
struct CaptureAccepted {
    pending: bool,
}

#[derive(Debug, Serialize)]
struct Status {
    pending: bool,
    saved: u64,
    failed: u64,
    recent: Vec<Notification>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /capture: the shutter button. Picked up by the next delivered frame.
async fn request_capture(State(state): State<Arc<ControlState>>) -> impl IntoResponse {
    state.trigger.request();
    info!("capture requested");
    (
        StatusCode::ACCEPTED,
        Json(CaptureAccepted { pending: true }),
    )
}

/// GET /status
async fn status(State(state): State<Arc<ControlState>>) -> impl IntoResponse {
    let snapshot = state.board.snapshot();
    Json(Status {
        pending: state.trigger.is_pending(),
        saved: snapshot.saved,
        failed: snapshot.failed,
        recent: snapshot.recent,
    })
}

/// GET /captures/latest: bytes of the most recent saved image.
async fn latest_capture(State(state): State<Arc<ControlState>>) -> impl IntoResponse {
    let Some(locator) = state.board.last_saved() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let storage = Arc::clone(&state.storage);
    let result = tokio::task::spawn_blocking(move || storage.read(&locator)).await;

    match result {
        Ok(Ok(bytes)) => ([(header::CONTENT_TYPE, PNG_MIME)], bytes).into_response(),
        Ok(Err(e)) => {
            error!(error = %e, "failed to read latest capture");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(e) => {
            error!(error = %e, "spawn_blocking failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn router(state: Arc<ControlState>) -> Router {
    Router::new()
        .route("/capture", post(request_capture))
        .route("/status", get(status))
        .route("/captures/latest", get(latest_capture))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(bind: &str, app: Router) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = bind, "control surface listening");
    axum::serve(listener, app).await
}
