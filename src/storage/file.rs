//! JSON file backend: one `all-<collection>.json` array per collection.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{
    record_id, require_id, validate_collection_name, Build, CollectionStore, Mutation, Predicate,
    Record,
};
use crate::errors::AppError;

/// File-backed collection store.
///
/// Writes go to a temporary sibling and are renamed over the target, and all
/// mutations of one collection run under a per-collection async mutex.
pub struct FileStore {
    data_dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl FileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Path of the file backing `collection`.
    pub fn collection_path(&self, collection: &str) -> PathBuf {
        self.data_dir.join(format!("all-{}.json", collection))
    }

    fn lock_for(&self, collection: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(collection.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    async fn read(&self, collection: &str) -> Result<Vec<Record>, AppError> {
        validate_collection_name(collection)?;
        let path = self.collection_path(collection);

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Creating empty collection file {:?}", path);
                self.write(collection, &[]).await?;
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&contents).map_err(|e| {
            tracing::error!("Malformed collection file {:?}: {}", path, e);
            AppError::Storage(format!("Malformed JSON in collection '{}': {}", collection, e))
        })
    }

    async fn write(&self, collection: &str, records: &[Record]) -> Result<(), AppError> {
        tokio::fs::create_dir_all(&self.data_dir).await?;

        let path = self.collection_path(collection);
        let tmp_path = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(records)?;

        tokio::fs::write(&tmp_path, body).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl CollectionStore for FileStore {
    async fn list(&self, collection: &str) -> Result<Vec<Record>, AppError> {
        // Reads may create the file, so they take the lock as well.
        let lock = self.lock_for(collection);
        let _guard = lock.lock().await;
        self.read(collection).await
    }

    async fn insert(&self, collection: &str, build: Build) -> Result<Record, AppError> {
        let lock = self.lock_for(collection);
        let _guard = lock.lock().await;

        let mut records = self.read(collection).await?;
        let record = build(&records)?;
        let id = require_id(&record)?;

        if records.iter().any(|r| record_id(r) == Some(id.as_str())) {
            return Err(AppError::Conflict(format!(
                "Record with id '{}' already exists in '{}'",
                id, collection
            )));
        }

        records.push(record.clone());
        self.write(collection, &records).await?;
        Ok(record)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        mutate: Mutation,
    ) -> Result<Option<Record>, AppError> {
        let lock = self.lock_for(collection);
        let _guard = lock.lock().await;

        let mut records = self.read(collection).await?;
        let Some(index) = records.iter().position(|r| record_id(r) == Some(id)) else {
            return Ok(None);
        };

        let existing = records[index].clone();
        let updated = mutate(existing)?;
        records[index] = updated.clone();

        self.write(collection, &records).await?;
        Ok(Some(updated))
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<Option<Record>, AppError> {
        let lock = self.lock_for(collection);
        let _guard = lock.lock().await;

        let mut records = self.read(collection).await?;
        let Some(index) = records.iter().position(|r| record_id(r) == Some(id)) else {
            return Ok(None);
        };

        let removed = records.remove(index);
        self.write(collection, &records).await?;
        Ok(Some(removed))
    }

    async fn remove_where(
        &self,
        collection: &str,
        predicate: Predicate,
    ) -> Result<usize, AppError> {
        let lock = self.lock_for(collection);
        let _guard = lock.lock().await;

        let mut records = self.read(collection).await?;
        let before = records.len();
        records.retain(|r| !predicate(r));
        let removed = before - records.len();

        if removed > 0 {
            self.write(collection, &records).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(value: serde_json::Value) -> Record {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn insert_fixed(value: serde_json::Value) -> Build {
        let rec = record(value);
        Box::new(move |_| Ok(rec))
    }

    #[tokio::test]
    async fn test_missing_collection_is_created_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("nested"));

        let records = store.list("vendors").await.unwrap();
        assert!(records.is_empty());

        let on_disk = std::fs::read_to_string(store.collection_path("vendors")).unwrap();
        assert_eq!(on_disk.trim(), "[]");
    }

    #[tokio::test]
    async fn test_insert_update_remove() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        store
            .insert("vendors", insert_fixed(json!({"id": "v1", "name": "Acme"})))
            .await
            .unwrap();
        store
            .insert("vendors", insert_fixed(json!({"id": "v2", "name": "Globex"})))
            .await
            .unwrap();

        let updated = store
            .update(
                "vendors",
                "v1",
                Box::new(|mut r| {
                    r.insert("name".into(), json!("Acme Corp"));
                    Ok(r)
                }),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["name"], "Acme Corp");

        let removed = store.remove("vendors", "v2").await.unwrap().unwrap();
        assert_eq!(removed["name"], "Globex");

        let remaining = store.list("vendors").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0]["name"], "Acme Corp");
    }

    #[tokio::test]
    async fn test_duplicate_id_conflicts() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        store
            .insert("vendors", insert_fixed(json!({"id": "v1"})))
            .await
            .unwrap();
        let err = store
            .insert("vendors", insert_fixed(json!({"id": "v1"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_missing_records_yield_none() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        assert!(store.get("vendors", "nope").await.unwrap().is_none());
        assert!(store.remove("vendors", "nope").await.unwrap().is_none());
        assert!(store
            .update("vendors", "nope", Box::new(|r| Ok(r)))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_malformed_file_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        std::fs::write(store.collection_path("vendors"), "{ not an array").unwrap();

        let err = store.list("vendors").await.unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
    }

    #[tokio::test]
    async fn test_remove_where_counts() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        for (id, kind) in [("a", "x"), ("b", "y"), ("c", "x")] {
            store
                .insert("items", insert_fixed(json!({"id": id, "kind": kind})))
                .await
                .unwrap();
        }

        let removed = store
            .remove_where("items", Box::new(|r| r["kind"] == "x"))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.list("items").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileStore::new(dir.path()));

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .insert(
                        "notifications",
                        insert_fixed(json!({"id": format!("n{}", i)})),
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.list("notifications").await.unwrap().len(), 20);
    }
}
