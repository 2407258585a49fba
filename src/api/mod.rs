//! REST API module.
//!
//! Contains all API routes and handlers. Every response uses the
//! `{ success, data, pagination?, message? }` envelope, errors the
//! `{ success: false, error, code }` one.

mod companies;
mod controller;
mod dashboard;
mod data;
mod relation_types;
mod relations;
mod schemas;

pub use companies::*;
pub use controller::EntityController;
pub use dashboard::*;
pub use data::*;
pub use relation_types::*;
pub use relations::*;
pub use schemas::*;

use axum::{
    extract::{FromRequest, FromRequestParts},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::errors::AppError;
use crate::service::{Page, Pagination};
use crate::storage::Record;

/// Success response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            pagination: None,
            message: None,
            status: StatusCode::OK,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data))
}

/// 201 Created.
pub fn created<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse::new(data).with_status(StatusCode::CREATED))
}

pub fn paginated<T: Serialize>(page: Page<T>) -> ApiResult<Vec<T>> {
    let mut response = ApiResponse::new(page.items);
    response.pagination = Some(page.pagination);
    Ok(response)
}

pub fn deleted<T: Serialize>(data: T, message: impl Into<String>) -> ApiResult<T> {
    Ok(ApiResponse::new(data).with_message(message))
}

/// `Json` whose rejections answer with the error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// `Query` whose rejections answer with the error envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct QueryParams<T>(pub T);

/// Entity bodies must be JSON objects.
pub fn into_record(body: Value) -> Result<Record, AppError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::Validation(
            "Request body must be a JSON object".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_shape() {
        let body = serde_json::to_value(ApiResponse::new(json!({"id": "v1"}))).unwrap();
        assert_eq!(body, json!({"success": true, "data": {"id": "v1"}}));

        let page = Page {
            items: vec![1, 2],
            pagination: Pagination {
                page: 1,
                limit: 2,
                total: 5,
                total_pages: 3,
            },
        };
        let response = paginated(page).unwrap();
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["pagination"]["totalPages"], 3);
        assert!(body.get("message").is_none());
    }

    #[test]
    fn test_into_record() {
        assert!(into_record(json!({"name": "Acme"})).is_ok());
        assert_eq!(
            into_record(json!([1, 2])).unwrap_err(),
            AppError::Validation("Request body must be a JSON object".into())
        );
    }
}
