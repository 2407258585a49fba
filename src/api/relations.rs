//! Relation API endpoints.

use axum::extract::{Path, State};
use serde::Serialize;

use super::{created, deleted, success, ApiResult, JsonBody, QueryParams};
use crate::errors::AppError;
use crate::models::{CreateRelationRequest, Relation, RelationQuery};
use crate::AppState;

/// Result of a bulk relation delete.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedCount {
    pub deleted: usize,
}

/// GET /api/relations - List relations matching the query filters.
pub async fn list_relations(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<RelationQuery>,
) -> ApiResult<Vec<Relation>> {
    let relations = &state.relations;
    let found = match (
        query.source_schema.as_deref(),
        query.source_id.as_deref(),
        query.target_schema.as_deref(),
        query.target_id.as_deref(),
        query.relation_type_id.as_deref(),
    ) {
        (Some(schema), Some(id), None, None, None) => relations.by_source(schema, id).await?,
        (None, None, Some(schema), Some(id), None) => relations.by_target(schema, id).await?,
        (None, None, None, None, Some(type_id)) => relations.by_type(type_id).await?,
        (Some(source_schema), Some(source_id), Some(target_schema), None, type_id) => {
            relations
                .for_section(source_schema, source_id, target_schema, type_id)
                .await?
        }
        _ => relations.query(&query).await?,
    };
    success(found)
}

/// POST /api/relations - Create a relation between two entities.
pub async fn create_relation(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateRelationRequest>,
) -> ApiResult<Relation> {
    for schema in [&request.source_schema, &request.target_schema]
        .into_iter()
        .flatten()
    {
        let schema = schema.trim();
        if !schema.is_empty() && !state.registry.contains(schema) {
            return Err(AppError::Validation(format!("Unknown schema '{}'", schema)));
        }
    }

    created(state.relations.create(request).await?)
}

/// DELETE /api/relations - Remove every relation of a source or target entity.
///
/// Requires `sourceSchema` + `sourceId` or `targetSchema` + `targetId`.
pub async fn delete_relations(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<RelationQuery>,
) -> ApiResult<DeletedCount> {
    let deleted_count = match (
        &query.source_schema,
        &query.source_id,
        &query.target_schema,
        &query.target_id,
    ) {
        (Some(schema), Some(id), _, _) => state.relations.delete_by_source(schema, id).await?,
        (_, _, Some(schema), Some(id)) => state.relations.delete_by_target(schema, id).await?,
        _ => {
            return Err(AppError::BadRequest(
                "sourceSchema and sourceId, or targetSchema and targetId, are required"
                    .to_string(),
            ))
        }
    };

    deleted(
        DeletedCount {
            deleted: deleted_count,
        },
        format!("{} relations deleted", deleted_count),
    )
}

/// GET /api/relations/{id} - Get a single relation.
pub async fn get_relation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Relation> {
    match state.relations.find(&id).await? {
        Some(relation) => success(relation),
        None => Err(AppError::NotFound(format!("Relation '{}' not found", id))),
    }
}

/// DELETE /api/relations/{id} - Delete a relation.
pub async fn delete_relation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Relation> {
    match state.relations.delete(&id).await? {
        Some(relation) => deleted(relation, "Relation deleted successfully"),
        None => Err(AppError::NotFound(format!("Relation '{}' not found", id))),
    }
}
