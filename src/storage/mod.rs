//! Collection storage.
//!
//! A collection is an ordered list of JSON objects keyed by `id`. Backends
//! apply every mutation as a closure under their own serialization (a
//! per-collection lock for files, a transaction for SQLite), so callers never
//! hold a stale copy across a write.

mod cached;
mod file;

pub use cached::CachedStore;
pub use file::FileStore;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::AppError;

/// A stored entity.
pub type Record = Map<String, Value>;

/// Builds the record to insert from the current collection contents.
pub type Build = Box<dyn FnOnce(&[Record]) -> Result<Record, AppError> + Send>;

/// Transforms an existing record into its replacement.
pub type Mutation = Box<dyn FnOnce(Record) -> Result<Record, AppError> + Send>;

/// Selects records for bulk removal.
pub type Predicate = Box<dyn Fn(&Record) -> bool + Send + Sync>;

/// Persistence seam shared by the file and database backends.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// All records of a collection in insertion order. Missing collections are empty.
    async fn list(&self, collection: &str) -> Result<Vec<Record>, AppError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, AppError> {
        Ok(self
            .list(collection)
            .await?
            .into_iter()
            .find(|r| record_id(r) == Some(id)))
    }

    /// Append the record produced by `build`. Fails with `Conflict` if its id is taken.
    async fn insert(&self, collection: &str, build: Build) -> Result<Record, AppError>;

    /// Replace the record `id` with `mutate(existing)`. `None` when absent.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        mutate: Mutation,
    ) -> Result<Option<Record>, AppError>;

    /// Remove the record `id`, returning it.
    async fn remove(&self, collection: &str, id: &str) -> Result<Option<Record>, AppError>;

    /// Remove every record matching `predicate`, returning how many were removed.
    async fn remove_where(&self, collection: &str, predicate: Predicate)
        -> Result<usize, AppError>;
}

/// The `id` of a record, if it is a string.
pub fn record_id(record: &Record) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

/// Require a record to carry a string `id`.
pub(crate) fn require_id(record: &Record) -> Result<String, AppError> {
    record_id(record)
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation("Record is missing a string id".to_string()))
}

/// Collection names map to file names, so only `[a-z0-9-]` is accepted.
pub fn validate_collection_name(collection: &str) -> Result<(), AppError> {
    let valid = !collection.is_empty()
        && collection
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Invalid collection name '{}'",
            collection
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_names() {
        assert!(validate_collection_name("purchase-orders").is_ok());
        assert!(validate_collection_name("data-relations").is_ok());
        assert!(validate_collection_name("").is_err());
        assert!(validate_collection_name("../etc").is_err());
        assert!(validate_collection_name("Vendors").is_err());
    }

    #[test]
    fn test_record_id() {
        let record: Record = serde_json::from_str(r#"{"id":"v1","name":"Acme"}"#).unwrap();
        assert_eq!(record_id(&record), Some("v1"));

        let numeric: Record = serde_json::from_str(r#"{"id":7}"#).unwrap();
        assert_eq!(record_id(&numeric), None);
        assert!(require_id(&numeric).is_err());
    }
}
