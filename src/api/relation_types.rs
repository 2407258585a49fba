//! Relation type API endpoints.

use axum::extract::{Path, State};

use super::{created, deleted, success, ApiResult, JsonBody};
use crate::errors::AppError;
use crate::models::{CreateRelationTypeRequest, RelationType, UpdateRelationTypeRequest};
use crate::AppState;

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Relation type '{}' not found", id))
}

/// GET /api/relation-types - List all relation types.
pub async fn list_relation_types(State(state): State<AppState>) -> ApiResult<Vec<RelationType>> {
    success(state.relation_types.list().await?)
}

/// GET /api/relation-types/{id} - Get a single relation type.
pub async fn get_relation_type(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<RelationType> {
    match state.relation_types.get(&id).await? {
        Some(relation_type) => success(relation_type),
        None => Err(not_found(&id)),
    }
}

/// POST /api/relation-types - Create a relation type.
pub async fn create_relation_type(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateRelationTypeRequest>,
) -> ApiResult<RelationType> {
    created(state.relation_types.create(request).await?)
}

/// PUT /api/relation-types/{id} - Update a relation type.
pub async fn update_relation_type(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<UpdateRelationTypeRequest>,
) -> ApiResult<RelationType> {
    match state.relation_types.update(&id, request).await? {
        Some(relation_type) => success(relation_type),
        None => Err(not_found(&id)),
    }
}

/// DELETE /api/relation-types/{id} - Delete a relation type that no relation uses.
pub async fn delete_relation_type(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<RelationType> {
    // Relations and relation types live in separate collections with no shared
    // lock, so a relation created between this check and the delete can still
    // reference the removed type.
    let in_use = state.relations.by_type(&id).await?.len();
    if in_use > 0 {
        return Err(AppError::Conflict(format!(
            "Relation type '{}' is used by {} relations",
            id, in_use
        )));
    }

    match state.relation_types.delete(&id).await? {
        Some(relation_type) => deleted(relation_type, "Relation type deleted successfully"),
        None => Err(not_found(&id)),
    }
}
