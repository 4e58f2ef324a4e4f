use super::payload;
use super::{dispatch, error_response, success_response, ApiResponse, ApiState};
use crate::controller::LightController;
use crate::entity::EntityId;
use crate::error::LightResult;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

/// Query parameters for GET /entity
#[derive(Deserialize)]
pub struct EntityQuery {
    /// Return this entity only instead of the full list
    pub id: Option<EntityId>,
}

fn respond<T: Serialize>(result: LightResult<T>) -> ApiResponse {
    match result {
        Ok(body) => (StatusCode::OK, Json(json!(body))),
        Err(e) => error_response(&e),
    }
}

/// Create an entity from `{name, start_addr, end_addr, parent_id?}`.
pub fn create_entity(controller: &LightController, data: &Value) -> ApiResponse {
    let result = payload::entity_draft(data).and_then(|draft| controller.create_entity(draft));
    match result {
        Ok(id) => {
            info!(entity_id = id, "Entity created");
            success_response("Entity created successfully", json!({"id": id}))
        }
        Err(e) => error_response(&e),
    }
}

/// Replace an entity's fields. A missing `parent_id` detaches it.
pub fn update_entity(controller: &LightController, data: &Value) -> ApiResponse {
    let result = payload::entity_id(data, "id").and_then(|id| {
        let draft = payload::entity_draft(data)?;
        controller.update_entity(id, draft)?;
        Ok(id)
    });
    match result {
        Ok(id) => {
            info!(entity_id = id, "Entity updated");
            success_response("Entity updated successfully", Value::Null)
        }
        Err(e) => error_response(&e),
    }
}

/// Delete the entity named by `{id}`; its children become roots.
pub fn delete_entity(controller: &LightController, data: &Value) -> ApiResponse {
    let result =
        payload::entity_id(data, "id").and_then(|id| controller.delete_entity(id));
    match result {
        Ok(entity) => {
            info!(entity_id = entity.id, name = %entity.name, "Entity deleted");
            success_response("Entity deleted successfully", Value::Null)
        }
        Err(e) => error_response(&e),
    }
}

pub fn get_entity(controller: &LightController, id: EntityId) -> ApiResponse {
    respond(controller.get_entity(id))
}

pub fn list_entities(controller: &LightController) -> ApiResponse {
    respond(controller.list_entities())
}

pub fn entity_children(controller: &LightController, id: EntityId) -> ApiResponse {
    respond(controller.children_of(id))
}

/// POST /entity
pub async fn post_entity(State(state): State<ApiState>, Json(data): Json<Value>) -> ApiResponse {
    dispatch(&state, move |controller| create_entity(controller, &data)).await
}

/// PUT /entity
pub async fn put_entity(State(state): State<ApiState>, Json(data): Json<Value>) -> ApiResponse {
    dispatch(&state, move |controller| update_entity(controller, &data)).await
}

/// DELETE /entity
pub async fn delete_entity_handler(
    State(state): State<ApiState>,
    Json(data): Json<Value>,
) -> ApiResponse {
    dispatch(&state, move |controller| delete_entity(controller, &data)).await
}

/// GET /entity and GET /entity?id=n
pub async fn get_entities(
    State(state): State<ApiState>,
    Query(params): Query<EntityQuery>,
) -> ApiResponse {
    match params.id {
        Some(id) => dispatch(&state, move |controller| get_entity(controller, id)).await,
        None => dispatch(&state, list_entities).await,
    }
}

/// GET /entity/:id/children
pub async fn get_children(
    State(state): State<ApiState>,
    Path(id): Path<EntityId>,
) -> ApiResponse {
    dispatch(&state, move |controller| entity_children(controller, id)).await
}
