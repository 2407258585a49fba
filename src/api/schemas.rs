//! Schema API endpoints (read-only).

use axum::extract::{Path, State};

use super::{success, ApiResult};
use crate::schema::Schema;
use crate::AppState;

/// GET /api/schemas - List all schemas.
pub async fn list_schemas(State(state): State<AppState>) -> ApiResult<Vec<Schema>> {
    success(state.registry.schemas().cloned().collect())
}

/// GET /api/schemas/{id} - Get a single schema.
pub async fn get_schema(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Schema> {
    let policy = state.registry.get(&id)?;
    success(policy.schema.clone())
}
