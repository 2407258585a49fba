//! Generic entity endpoints under `/api/data/{schema_id}`.

use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::Value;

use super::{ApiResult, EntityController, JsonBody, QueryParams};
use crate::service::ListQuery;
use crate::storage::Record;
use crate::AppState;

/// Options accepted by `DELETE /api/data/{schema_id}/{id}`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOptions {
    /// Also remove relations pointing from or to the entity
    #[serde(default)]
    pub cascade_relations: bool,
}

/// GET /api/data/{schema_id} - List entities with filters and pagination.
pub async fn list_entities(
    State(state): State<AppState>,
    Path(schema_id): Path<String>,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Vec<Record>> {
    EntityController::for_schema(&state, &schema_id)?
        .list(query)
        .await
}

/// GET /api/data/{schema_id}/{id} - Get a single entity.
pub async fn get_entity(
    State(state): State<AppState>,
    Path((schema_id, id)): Path<(String, String)>,
) -> ApiResult<Record> {
    EntityController::for_schema(&state, &schema_id)?
        .get(&id)
        .await
}

/// POST /api/data/{schema_id} - Create an entity.
pub async fn create_entity(
    State(state): State<AppState>,
    Path(schema_id): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<Record> {
    EntityController::for_schema(&state, &schema_id)?
        .create(body)
        .await
}

/// PUT /api/data/{schema_id}/{id} - Merge fields into an entity.
pub async fn update_entity(
    State(state): State<AppState>,
    Path((schema_id, id)): Path<(String, String)>,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<Record> {
    EntityController::for_schema(&state, &schema_id)?
        .update(&id, body)
        .await
}

/// DELETE /api/data/{schema_id}/{id} - Delete an entity, optionally with its relations.
pub async fn delete_entity(
    State(state): State<AppState>,
    Path((schema_id, id)): Path<(String, String)>,
    QueryParams(options): QueryParams<DeleteOptions>,
) -> ApiResult<Record> {
    let mut response = EntityController::for_schema(&state, &schema_id)?
        .delete(&id)
        .await?;

    if options.cascade_relations {
        let removed = state.relations.delete_by_source(&schema_id, &id).await?
            + state.relations.delete_by_target(&schema_id, &id).await?;
        tracing::info!(schema = %schema_id, id = %id, removed, "cascaded relation delete");
        response.message = response
            .message
            .map(|m| format!("{} ({} relations removed)", m, removed));
    }

    Ok(response)
}
