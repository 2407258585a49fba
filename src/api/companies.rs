//! Company API endpoints.
//!
//! Companies are an ordinary schema whose collection sits behind the TTL
//! cache; these routes are shorthands for `/api/data/companies`.

use axum::extract::{Path, State};
use serde_json::Value;

use super::{ApiResult, EntityController, JsonBody, QueryParams};
use crate::service::ListQuery;
use crate::storage::Record;
use crate::AppState;

pub const COMPANIES: &str = "companies";

/// GET /api/companies - List companies.
pub async fn list_companies(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ListQuery>,
) -> ApiResult<Vec<Record>> {
    EntityController::for_schema(&state, COMPANIES)?
        .list(query)
        .await
}

/// GET /api/companies/{id} - Get a single company.
pub async fn get_company(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Record> {
    EntityController::for_schema(&state, COMPANIES)?.get(&id).await
}

/// POST /api/companies - Create a company.
pub async fn create_company(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<Record> {
    EntityController::for_schema(&state, COMPANIES)?
        .create(body)
        .await
}

/// PUT /api/companies/{id} - Update a company. `id` and `createdAt` are kept.
pub async fn update_company(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> ApiResult<Record> {
    EntityController::for_schema(&state, COMPANIES)?
        .update(&id, body)
        .await
}

/// DELETE /api/companies/{id} - Delete a company.
pub async fn delete_company(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Record> {
    EntityController::for_schema(&state, COMPANIES)?
        .delete(&id)
        .await
}
