//! Dashboard API endpoints.

use axum::extract::State;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::metrics::{dashboard_stats, DashboardInput, DashboardStats};
use crate::AppState;

/// Load a collection, skipping records that do not fit `T`.
async fn load<T: DeserializeOwned>(state: &AppState, collection: &str) -> Result<Vec<T>, AppError> {
    let records = state.store.list(collection).await?;
    let mut items = Vec::with_capacity(records.len());
    for record in records {
        match serde_json::from_value(Value::Object(record)) {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!(collection, "Skipping malformed record: {}", e),
        }
    }
    Ok(items)
}

/// GET /api/dashboard/stats - Aggregate procurement figures.
pub async fn get_dashboard_stats(State(state): State<AppState>) -> ApiResult<DashboardStats> {
    let input = DashboardInput {
        purchase_orders: load(&state, "purchase-orders").await?,
        vendors: load(&state, "vendors").await?,
        tenders: load(&state, "tenders").await?,
        shipments: load(&state, "shipments").await?,
        invoices: load(&state, "invoices").await?,
    };

    success(dashboard_stats(&input, Utc::now().date_naive()))
}
