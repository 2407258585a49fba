//! Generic CRUD repository over one schema's collection.
//!
//! Every entity kind shares this implementation; what differs between kinds
//! (id minting, delete semantics, secret fields, validation) comes from the
//! [`EntityPolicy`] resolved at startup.

use std::sync::Arc;

use chrono::SecondsFormat;
use serde_json::{Map, Value};
use ulid::Ulid;

use crate::auth::password;
use crate::cache::Clock;
use crate::errors::AppError;
use crate::schema::{DeletePolicy, EntityPolicy, IdStrategy};
use crate::storage::{record_id, CollectionStore, Record};

/// Fields owned by the repository; request bodies cannot change them on update.
const MANAGED_FIELDS: &[&str] = &["id", "createdAt", "updatedAt"];

#[derive(Clone)]
pub struct BaseRepository {
    store: Arc<dyn CollectionStore>,
    policy: Arc<EntityPolicy>,
    clock: Arc<dyn Clock>,
}

impl BaseRepository {
    pub fn new(
        store: Arc<dyn CollectionStore>,
        policy: Arc<EntityPolicy>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> &EntityPolicy {
        &self.policy
    }

    fn collection(&self) -> &str {
        self.policy.id()
    }

    fn timestamp(&self) -> String {
        self.clock.now().to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub async fn find_all(&self) -> Result<Vec<Record>, AppError> {
        self.store.list(self.collection()).await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Record>, AppError> {
        self.store.get(self.collection(), id).await
    }

    /// Validate, assign an id if absent, stamp timestamps, hash secrets and append.
    pub async fn create(&self, mut data: Record) -> Result<Record, AppError> {
        self.policy.validate_types(&data)?;
        self.policy.validate_required(&data)?;

        let explicit_id = match data.remove("id") {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) if !id.trim().is_empty() => Some(id.trim().to_string()),
            Some(_) => {
                return Err(AppError::Validation(
                    "id must be a non-empty string".to_string(),
                ))
            }
        };

        hash_secrets(&self.policy, &mut data)?;

        let now = self.timestamp();
        let strategy = self.policy.id_strategy().clone();

        let record = self
            .store
            .insert(
                self.collection(),
                Box::new(move |existing| {
                    let id = explicit_id.unwrap_or_else(|| next_id(&strategy, existing));
                    let mut record = Map::new();
                    record.insert("id".to_string(), Value::String(id));
                    for (key, value) in data {
                        if !MANAGED_FIELDS.contains(&key.as_str()) {
                            record.insert(key, value);
                        }
                    }
                    record.insert("createdAt".to_string(), Value::String(now.clone()));
                    record.insert("updatedAt".to_string(), Value::String(now));
                    Ok(record)
                }),
            )
            .await?;

        tracing::debug!(
            schema = self.collection(),
            id = record_id(&record).unwrap_or_default(),
            "created entity"
        );
        Ok(record)
    }

    /// Shallow-merge `patch` onto the stored record. `id` and `createdAt` never change.
    pub async fn update(&self, id: &str, mut patch: Record) -> Result<Option<Record>, AppError> {
        for field in MANAGED_FIELDS {
            patch.remove(*field);
        }
        self.policy.validate_types(&patch)?;
        hash_secrets(&self.policy, &mut patch)?;

        let now = self.timestamp();
        self.store
            .update(
                self.collection(),
                id,
                Box::new(move |mut existing| {
                    for (key, value) in patch {
                        existing.insert(key, value);
                    }
                    existing.insert("updatedAt".to_string(), Value::String(now));
                    Ok(existing)
                }),
            )
            .await
    }

    /// Apply the schema's delete policy. Soft deletes return the updated record.
    pub async fn delete(&self, id: &str) -> Result<Option<Record>, AppError> {
        match self.policy.delete_policy() {
            DeletePolicy::Hard => self.store.remove(self.collection(), id).await,
            DeletePolicy::Soft { field, value } => {
                let field = field.clone();
                let value = value.clone();
                let now = self.timestamp();
                self.store
                    .update(
                        self.collection(),
                        id,
                        Box::new(move |mut existing| {
                            existing.insert(field, Value::String(value));
                            existing.insert("updatedAt".to_string(), Value::String(now));
                            Ok(existing)
                        }),
                    )
                    .await
            }
        }
    }
}

/// Replace plaintext password-role values with Argon2 hashes and mark `hashType`.
fn hash_secrets(policy: &EntityPolicy, record: &mut Record) -> Result<(), AppError> {
    let mut hashed_any = false;
    for field in &policy.password_fields {
        let Some(plain) = record.get(field).and_then(Value::as_str).map(str::to_string) else {
            continue;
        };
        if !password::is_argon2_hash(&plain) {
            let hash = password::hash_password(&plain)?;
            record.insert(field.clone(), Value::String(hash));
        }
        hashed_any = true;
    }
    if hashed_any {
        record.insert(
            password::HASH_TYPE_FIELD.to_string(),
            Value::String(password::HASH_TYPE.to_string()),
        );
    }
    Ok(())
}

/// Mint an id for a new record given the current collection contents.
fn next_id(strategy: &IdStrategy, existing: &[Record]) -> String {
    match strategy {
        IdStrategy::Ulid => Ulid::new().to_string(),
        IdStrategy::Sequential { prefix, width } => {
            let next = existing
                .iter()
                .filter_map(record_id)
                .filter_map(|id| id.strip_prefix(prefix.as_str()))
                .filter_map(|n| n.parse::<u64>().ok())
                // Suffixes at u64::MAX cannot be followed; skip them.
                .filter_map(|n| n.checked_add(1))
                .max()
                .unwrap_or(1);
            format!("{}{:0width$}", prefix, next, width = *width)
        }
    }
}
