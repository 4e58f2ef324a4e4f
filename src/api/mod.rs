// HTTP and WebSocket APIs

pub mod color;
pub mod entity;
mod payload;
pub mod protocol;
pub mod websocket;

use crate::controller::LightController;
use crate::error::LightError;
use axum::{
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{error, warn};

/// Status plus JSON body, as returned by every API operation
pub type ApiResponse = (StatusCode, Json<Value>);

/// Shared application state for the HTTP and WebSocket handlers
#[derive(Clone)]
pub struct ApiState {
    pub controller: Arc<LightController>,

    /// Upper bound for a single controller call (includes the hardware flush)
    pub request_timeout: Duration,
}

impl ApiState {
    pub fn new(controller: Arc<LightController>, request_timeout: Duration) -> Self {
        Self {
            controller,
            request_timeout,
        }
    }
}

/// Create the service router
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/entity",
            get(entity::get_entities)
                .post(entity::post_entity)
                .put(entity::put_entity)
                .delete(entity::delete_entity_handler),
        )
        .route("/entity/:id/children", get(entity::get_children))
        .route("/color", post(color::post_color))
        .route("/color/toggle", post(color::post_toggle))
        .route("/pixels", get(color::get_pixels))
        .route("/ws/color", get(websocket::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run a controller call on the blocking pool, bounded by the request timeout.
///
/// The controller serializes on a std lock and may block on the strip, so
/// calls never run on the async workers. A call that outlives the timeout
/// is reported as a hardware fault; it keeps running to completion in the
/// background and is not retried.
pub(crate) async fn dispatch<F>(state: &ApiState, call: F) -> ApiResponse
where
    F: FnOnce(&LightController) -> ApiResponse + Send + 'static,
{
    let controller = Arc::clone(&state.controller);
    let task = tokio::task::spawn_blocking(move || call(&controller));

    match tokio::time::timeout(state.request_timeout, task).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            error!(error = %e, "Controller task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal error"})),
            )
        }
        Err(_) => {
            let timeout_ms = state.request_timeout.as_millis();
            warn!(timeout_ms = timeout_ms, "Controller call timed out");
            error_response(&LightError::HardwareFault(format!(
                "strip did not respond within {} ms",
                timeout_ms
            )))
        }
    }
}

/// Map an error to its status and `{"error": ...}` body.
pub fn error_response(err: &LightError) -> ApiResponse {
    let status = err.status_code();
    if status.is_server_error() {
        error!(error = %err, "Request failed");
    } else {
        warn!(error = %err, "Request rejected");
    }
    (status, Json(json!({"error": err.to_string()})))
}

/// `{"success": message}` plus the fields of `extra` when it is an object
pub(crate) fn success_response(message: &str, extra: Value) -> ApiResponse {
    let mut body = json!({"success": message});
    if let (Value::Object(map), Value::Object(extra)) = (&mut body, extra) {
        map.extend(extra);
    }
    (StatusCode::OK, Json(body))
}
