//! Relation storage.
//!
//! Relations are kept in the `data-relations` collection and read fresh from
//! storage on every call. Deleting an entity does not touch its relations;
//! callers ask for [`RelationStore::delete_by_source`] /
//! [`RelationStore::delete_by_target`] explicitly.

mod types;

pub use types::{RelationTypeStore, RELATION_TYPES_COLLECTION};

use std::sync::Arc;

use chrono::SecondsFormat;
use serde_json::Value;
use ulid::Ulid;

use crate::cache::Clock;
use crate::errors::AppError;
use crate::models::{CreateRelationRequest, Relation, RelationQuery};
use crate::storage::{CollectionStore, Record};

pub const RELATIONS_COLLECTION: &str = "data-relations";

pub struct RelationStore {
    store: Arc<dyn CollectionStore>,
    clock: Arc<dyn Clock>,
}

impl RelationStore {
    pub fn new(store: Arc<dyn CollectionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn read_all(&self) -> Result<Vec<Relation>, AppError> {
        self.store
            .list(RELATIONS_COLLECTION)
            .await?
            .into_iter()
            .map(relation_from_record)
            .collect()
    }

    pub async fn query(&self, query: &RelationQuery) -> Result<Vec<Relation>, AppError> {
        Ok(self
            .read_all()
            .await?
            .into_iter()
            .filter(|r| query.matches(r))
            .collect())
    }

    pub async fn find(&self, id: &str) -> Result<Option<Relation>, AppError> {
        self.store
            .get(RELATIONS_COLLECTION, id)
            .await?
            .map(relation_from_record)
            .transpose()
    }

    /// Create a relation with a fresh ULID. An identical link already present is a conflict.
    pub async fn create(&self, request: CreateRelationRequest) -> Result<Relation, AppError> {
        let source_schema = required(request.source_schema, "sourceSchema")?;
        let source_id = required(request.source_id, "sourceId")?;
        let target_schema = required(request.target_schema, "targetSchema")?;
        let target_id = required(request.target_id, "targetId")?;
        let relation_type_id = required(request.relation_type_id, "relationTypeId")?;

        let now = self.clock.now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let relation = Relation {
            id: Ulid::new().to_string(),
            source_schema,
            source_id,
            target_schema,
            target_id,
            relation_type_id,
            created_at: now.clone(),
            updated_at: now,
        };

        let record = relation_to_record(&relation)?;
        let candidate = relation.clone();
        self.store
            .insert(
                RELATIONS_COLLECTION,
                Box::new(move |existing| {
                    let duplicate = existing
                        .iter()
                        .filter_map(|r| relation_from_record(r.clone()).ok())
                        .any(|r| same_link(&r, &candidate));
                    if duplicate {
                        return Err(AppError::Conflict(format!(
                            "Relation {} {}/{} -> {}/{} already exists",
                            candidate.relation_type_id,
                            candidate.source_schema,
                            candidate.source_id,
                            candidate.target_schema,
                            candidate.target_id
                        )));
                    }
                    Ok(record)
                }),
            )
            .await?;

        tracing::debug!(id = %relation.id, "created relation");
        Ok(relation)
    }

    pub async fn delete(&self, id: &str) -> Result<Option<Relation>, AppError> {
        self.store
            .remove(RELATIONS_COLLECTION, id)
            .await?
            .map(relation_from_record)
            .transpose()
    }

    pub async fn by_source(&self, schema: &str, id: &str) -> Result<Vec<Relation>, AppError> {
        self.query(&RelationQuery {
            source_schema: Some(schema.to_string()),
            source_id: Some(id.to_string()),
            ..Default::default()
        })
        .await
    }

    pub async fn by_target(&self, schema: &str, id: &str) -> Result<Vec<Relation>, AppError> {
        self.query(&RelationQuery {
            target_schema: Some(schema.to_string()),
            target_id: Some(id.to_string()),
            ..Default::default()
        })
        .await
    }

    pub async fn by_type(&self, relation_type_id: &str) -> Result<Vec<Relation>, AppError> {
        self.query(&RelationQuery {
            relation_type_id: Some(relation_type_id.to_string()),
            ..Default::default()
        })
        .await
    }

    /// Relations shown in one section of an entity page: links from
    /// `(source_schema, source_id)` into `target_schema`, optionally of one type.
    pub async fn for_section(
        &self,
        source_schema: &str,
        source_id: &str,
        target_schema: &str,
        relation_type_id: Option<&str>,
    ) -> Result<Vec<Relation>, AppError> {
        self.query(&RelationQuery {
            source_schema: Some(source_schema.to_string()),
            source_id: Some(source_id.to_string()),
            target_schema: Some(target_schema.to_string()),
            target_id: None,
            relation_type_id: relation_type_id.map(str::to_string),
        })
        .await
    }

    pub async fn delete_by_source(&self, schema: &str, id: &str) -> Result<usize, AppError> {
        let (schema, id) = (schema.to_string(), id.to_string());
        let removed = self
            .store
            .remove_where(
                RELATIONS_COLLECTION,
                Box::new(move |r| field_is(r, "sourceSchema", &schema) && field_is(r, "sourceId", &id)),
            )
            .await?;
        tracing::debug!(removed, "deleted relations by source");
        Ok(removed)
    }

    pub async fn delete_by_target(&self, schema: &str, id: &str) -> Result<usize, AppError> {
        let (schema, id) = (schema.to_string(), id.to_string());
        let removed = self
            .store
            .remove_where(
                RELATIONS_COLLECTION,
                Box::new(move |r| field_is(r, "targetSchema", &schema) && field_is(r, "targetId", &id)),
            )
            .await?;
        tracing::debug!(removed, "deleted relations by target");
        Ok(removed)
    }
}

fn required(value: Option<String>, name: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{} is required", name)))
}

fn same_link(a: &Relation, b: &Relation) -> bool {
    a.source_schema == b.source_schema
        && a.source_id == b.source_id
        && a.target_schema == b.target_schema
        && a.target_id == b.target_id
        && a.relation_type_id == b.relation_type_id
}

fn field_is(record: &Record, field: &str, expected: &str) -> bool {
    record.get(field).and_then(Value::as_str) == Some(expected)
}

fn relation_from_record(record: Record) -> Result<Relation, AppError> {
    serde_json::from_value(Value::Object(record)).map_err(|e| {
        AppError::Storage(format!("Malformed relation record: {}", e))
    })
}

fn relation_to_record(relation: &Relation) -> Result<Record, AppError> {
    match serde_json::to_value(relation)? {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::Internal(
            "Relation did not serialize to an object".to_string(),
        )),
    }
}
