use super::payload;
use super::{dispatch, error_response, success_response, ApiResponse, ApiState};
use crate::controller::{ColorApplied, LightController};
use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};

fn applied_response(message: &str, applied: &ColorApplied) -> ApiResponse {
    success_response(
        message,
        json!({
            "entity_id": applied.entity_id,
            "red": applied.red,
            "green": applied.green,
            "blue": applied.blue,
            "brightness": applied.brightness,
            "is_on": applied.is_on,
            "affected": applied.affected,
        }),
    )
}

/// Set color, brightness and power for an entity and all its descendants.
///
/// Expects `{entity, red?, green?, blue?, brightness?, is_on?}`; brightness is
/// raw 0-255. Replies "Color already set" when no stored state changed,
/// though the strip is re-rendered either way.
pub fn set_color(controller: &LightController, data: &Value) -> ApiResponse {
    let result = payload::color_request(data).and_then(|request| controller.set_color(request));
    match result {
        Ok(applied) if applied.changed => applied_response("Color updated successfully", &applied),
        Ok(applied) => applied_response("Color already set", &applied),
        Err(e) => error_response(&e),
    }
}

/// Flip power for `{entity}`, keeping its stored color.
pub fn toggle(controller: &LightController, data: &Value) -> ApiResponse {
    let result = payload::entity_id(data, "entity").and_then(|id| controller.toggle(id));
    match result {
        Ok(applied) => applied_response("Light toggled", &applied),
        Err(e) => error_response(&e),
    }
}

/// Current pixel buffer, one entry per strip index
pub fn pixels(controller: &LightController) -> ApiResponse {
    (StatusCode::OK, Json(json!(controller.pixels())))
}

/// POST /color
pub async fn post_color(State(state): State<ApiState>, Json(data): Json<Value>) -> ApiResponse {
    dispatch(&state, move |controller| set_color(controller, &data)).await
}

/// POST /color/toggle
pub async fn post_toggle(State(state): State<ApiState>, Json(data): Json<Value>) -> ApiResponse {
    dispatch(&state, move |controller| toggle(controller, &data)).await
}

/// GET /pixels
pub async fn get_pixels(State(state): State<ApiState>) -> ApiResponse {
    dispatch(&state, pixels).await
}
