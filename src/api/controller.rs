//! Schema-driven controller shared by `/api/data/{schema}` and `/api/companies`.

use serde_json::Value;

use super::{created, deleted, into_record, paginated, success, ApiResult};
use crate::errors::AppError;
use crate::repository::BaseRepository;
use crate::service::{BaseService, ListQuery};
use crate::storage::Record;
use crate::AppState;

/// Maps HTTP-shaped inputs onto a [`BaseService`] and its results onto envelopes.
pub struct EntityController {
    service: BaseService,
}

impl EntityController {
    /// Fails with `NotFound` for unknown schema ids.
    pub fn for_schema(state: &AppState, schema_id: &str) -> Result<Self, AppError> {
        let policy = state.registry.get(schema_id)?;
        let repo = BaseRepository::new(state.store.clone(), policy, state.clock.clone());
        Ok(Self {
            service: BaseService::new(repo),
        })
    }

    pub fn schema_id(&self) -> &str {
        self.service.policy().id()
    }

    pub async fn list(&self, query: ListQuery) -> ApiResult<Vec<Record>> {
        let filters = query.parse()?;
        let page = self.service.list(&filters).await?;
        paginated(page)
    }

    pub async fn get(&self, id: &str) -> ApiResult<Record> {
        match self.service.get(id).await? {
            Some(record) => success(record),
            None => Err(self.not_found(id)),
        }
    }

    pub async fn create(&self, body: Value) -> ApiResult<Record> {
        let record = self.service.create(into_record(body)?).await?;
        tracing::info!(schema = self.schema_id(), "created entity");
        created(record)
    }

    pub async fn update(&self, id: &str, body: Value) -> ApiResult<Record> {
        match self.service.update(id, into_record(body)?).await? {
            Some(record) => success(record),
            None => Err(self.not_found(id)),
        }
    }

    pub async fn delete(&self, id: &str) -> ApiResult<Record> {
        match self.service.delete(id).await? {
            Some(record) => {
                tracing::info!(schema = self.schema_id(), id, "deleted entity");
                deleted(
                    record,
                    format!("{} deleted successfully", self.service.policy().singular_name()),
                )
            }
            None => Err(self.not_found(id)),
        }
    }

    fn not_found(&self, id: &str) -> AppError {
        AppError::NotFound(format!(
            "{} '{}' not found",
            self.service.policy().singular_name(),
            id
        ))
    }
}
