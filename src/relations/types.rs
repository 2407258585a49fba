use std::sync::Arc;

use chrono::SecondsFormat;
use serde_json::Value;

use crate::cache::Clock;
use crate::errors::AppError;
use crate::models::{
    relation_type_id_from_label, CreateRelationTypeRequest, RelationType,
    UpdateRelationTypeRequest,
};
use crate::storage::{CollectionStore, Record};

pub const RELATION_TYPES_COLLECTION: &str = "relation-types";

/// CRUD over relation types. Reads go through whatever cache the store carries.
pub struct RelationTypeStore {
    store: Arc<dyn CollectionStore>,
    clock: Arc<dyn Clock>,
}

impl RelationTypeStore {
    pub fn new(store: Arc<dyn CollectionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn list(&self) -> Result<Vec<RelationType>, AppError> {
        self.store
            .list(RELATION_TYPES_COLLECTION)
            .await?
            .into_iter()
            .map(type_from_record)
            .collect()
    }

    pub async fn get(&self, id: &str) -> Result<Option<RelationType>, AppError> {
        self.store
            .get(RELATION_TYPES_COLLECTION, id)
            .await?
            .map(type_from_record)
            .transpose()
    }

    pub async fn create(&self, request: CreateRelationTypeRequest) -> Result<RelationType, AppError> {
        let label = request.label.trim().to_string();
        if label.is_empty() {
            return Err(AppError::Validation("label is required".to_string()));
        }

        let id = match request.id.map(|id| id.trim().to_string()) {
            Some(id) if !id.is_empty() => id,
            _ => relation_type_id_from_label(&label),
        };
        if id.is_empty() {
            return Err(AppError::Validation(format!(
                "Cannot derive a relation type id from label '{}'",
                label
            )));
        }

        let now = self.now();
        let relation_type = RelationType {
            id,
            label,
            description: request.description,
            icon: request.icon,
            color: request.color,
            direction: request.direction.unwrap_or_default(),
            created_at: now.clone(),
            updated_at: now,
        };

        let record = type_to_record(&relation_type)?;
        self.store
            .insert(RELATION_TYPES_COLLECTION, Box::new(move |_| Ok(record)))
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => AppError::Conflict(format!(
                    "Relation type '{}' already exists",
                    relation_type.id
                )),
                other => other,
            })?;

        tracing::info!(id = %relation_type.id, "created relation type");
        Ok(relation_type)
    }

    /// Apply the given fields. `id` and `createdAt` never change.
    pub async fn update(
        &self,
        id: &str,
        request: UpdateRelationTypeRequest,
    ) -> Result<Option<RelationType>, AppError> {
        if let Some(label) = &request.label {
            if label.trim().is_empty() {
                return Err(AppError::Validation("label cannot be empty".to_string()));
            }
        }

        let now = self.now();
        let updated = self
            .store
            .update(
                RELATION_TYPES_COLLECTION,
                id,
                Box::new(move |existing| {
                    let mut current = type_from_record(existing)?;
                    if let Some(label) = request.label {
                        current.label = label.trim().to_string();
                    }
                    if request.description.is_some() {
                        current.description = request.description;
                    }
                    if request.icon.is_some() {
                        current.icon = request.icon;
                    }
                    if request.color.is_some() {
                        current.color = request.color;
                    }
                    if let Some(direction) = request.direction {
                        current.direction = direction;
                    }
                    current.updated_at = now;
                    type_to_record(&current)
                }),
            )
            .await?;

        updated.map(type_from_record).transpose()
    }

    pub async fn delete(&self, id: &str) -> Result<Option<RelationType>, AppError> {
        self.store
            .remove(RELATION_TYPES_COLLECTION, id)
            .await?
            .map(type_from_record)
            .transpose()
    }

    fn now(&self) -> String {
        self.clock.now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

fn type_from_record(record: Record) -> Result<RelationType, AppError> {
    serde_json::from_value(Value::Object(record))
        .map_err(|e| AppError::Storage(format!("Malformed relation type record: {}", e)))
}

fn type_to_record(relation_type: &RelationType) -> Result<Record, AppError> {
    match serde_json::to_value(relation_type)? {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::Internal(
            "Relation type did not serialize to an object".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::models::RelationDirection;
    use crate::storage::FileStore;
    use chrono::{DateTime, Utc};
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup(dir: &TempDir) -> (RelationTypeStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            DateTime::parse_from_rfc3339("2024-03-01T09:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        ));
        let store = RelationTypeStore::new(Arc::new(FileStore::new(dir.path())), clock.clone());
        (store, clock)
    }

    #[tokio::test]
    async fn test_create_derives_id_from_label() {
        let dir = TempDir::new().unwrap();
        let (types, _) = setup(&dir);

        let created = types
            .create(CreateRelationTypeRequest {
                label: "Awarded to".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(created.id, "AWARDED_TO");
        assert_eq!(created.direction, RelationDirection::Forward);
        assert_eq!(created.created_at, "2024-03-01T09:00:00.000Z");
        assert_eq!(types.get("AWARDED_TO").await.unwrap(), Some(created));
    }

    #[tokio::test]
    async fn test_create_validation_and_conflict() {
        let dir = TempDir::new().unwrap();
        let (types, _) = setup(&dir);

        let err = types
            .create(CreateRelationTypeRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err, AppError::Validation("label is required".into()));

        let req = CreateRelationTypeRequest {
            id: Some("SUPPLIES".into()),
            label: "Supplies".into(),
            ..Default::default()
        };
        types.create(req.clone()).await.unwrap();
        let err = types.create(req).await.unwrap_err();
        assert_eq!(
            err,
            AppError::Conflict("Relation type 'SUPPLIES' already exists".into())
        );
    }

    #[tokio::test]
    async fn test_update_keeps_identity() {
        let dir = TempDir::new().unwrap();
        let (types, clock) = setup(&dir);
        let created = types
            .create(CreateRelationTypeRequest {
                label: "Supplies".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        clock.advance(Duration::from_secs(30));
        let updated = types
            .update(
                "SUPPLIES",
                UpdateRelationTypeRequest {
                    color: Some("#00aa00".into()),
                    direction: Some(RelationDirection::Bidirectional),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.label, "Supplies");
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.updated_at, "2024-03-01T09:00:30.000Z");
        assert_eq!(updated.color.as_deref(), Some("#00aa00"));

        assert!(types
            .update("MISSING", UpdateRelationTypeRequest::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = TempDir::new().unwrap();
        let (types, _) = setup(&dir);
        types
            .create(CreateRelationTypeRequest {
                label: "Supplies".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(types.delete("SUPPLIES").await.unwrap().is_some());
        assert!(types.delete("SUPPLIES").await.unwrap().is_none());
        assert!(types.list().await.unwrap().is_empty());
    }
}
