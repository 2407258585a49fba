//! SQLite-backed collection store.
//!
//! Each mutation runs inside a transaction; writers within this process are
//! additionally serialized so a read-then-write never races another writer.

use async_trait::async_trait;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tokio::sync::Mutex;

use crate::errors::AppError;
use crate::storage::{
    record_id, require_id, validate_collection_name, Build, CollectionStore, Mutation, Predicate,
    Record,
};

/// Collection store over the `records` table.
pub struct SqliteStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
        }
    }

    async fn load_in(
        tx: &mut Transaction<'_, Sqlite>,
        collection: &str,
    ) -> Result<Vec<Record>, AppError> {
        let rows = sqlx::query("SELECT body FROM records WHERE collection = ? ORDER BY rowid")
            .bind(collection)
            .fetch_all(&mut **tx)
            .await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn load_one_in(
        tx: &mut Transaction<'_, Sqlite>,
        collection: &str,
        id: &str,
    ) -> Result<Option<Record>, AppError> {
        let row = sqlx::query("SELECT body FROM records WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }
}

#[async_trait]
impl CollectionStore for SqliteStore {
    async fn list(&self, collection: &str) -> Result<Vec<Record>, AppError> {
        validate_collection_name(collection)?;
        let rows = sqlx::query("SELECT body FROM records WHERE collection = ? ORDER BY rowid")
            .bind(collection)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, AppError> {
        validate_collection_name(collection)?;
        let row = sqlx::query("SELECT body FROM records WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn insert(&self, collection: &str, build: Build) -> Result<Record, AppError> {
        validate_collection_name(collection)?;
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let existing = Self::load_in(&mut tx, collection).await?;
        let record = build(&existing)?;
        let id = require_id(&record)?;

        if existing.iter().any(|r| record_id(r) == Some(id.as_str())) {
            return Err(AppError::Conflict(format!(
                "Record with id '{}' already exists in '{}'",
                id, collection
            )));
        }

        sqlx::query("INSERT INTO records (collection, id, body) VALUES (?, ?, ?)")
            .bind(collection)
            .bind(&id)
            .bind(serde_json::to_string(&record)?)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        mutate: Mutation,
    ) -> Result<Option<Record>, AppError> {
        validate_collection_name(collection)?;
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let Some(existing) = Self::load_one_in(&mut tx, collection, id).await? else {
            return Ok(None);
        };
        let updated = mutate(existing)?;

        sqlx::query("UPDATE records SET body = ? WHERE collection = ? AND id = ?")
            .bind(serde_json::to_string(&updated)?)
            .bind(collection)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<Option<Record>, AppError> {
        validate_collection_name(collection)?;
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let Some(existing) = Self::load_one_in(&mut tx, collection, id).await? else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM records WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(existing))
    }

    async fn remove_where(
        &self,
        collection: &str,
        predicate: Predicate,
    ) -> Result<usize, AppError> {
        validate_collection_name(collection)?;
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let doomed: Vec<String> = Self::load_in(&mut tx, collection)
            .await?
            .iter()
            .filter(|r| predicate(*r))
            .filter_map(|r| record_id(r).map(str::to_string))
            .collect();

        for id in &doomed {
            sqlx::query("DELETE FROM records WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(doomed.len())
    }
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Record, AppError> {
    let body: String = row.get("body");
    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use serde_json::json;
    use tempfile::TempDir;

    async fn store(dir: &TempDir) -> SqliteStore {
        let pool = init_database(&dir.path().join("test.sqlite")).await.unwrap();
        SqliteStore::new(pool)
    }

    fn fixed(value: serde_json::Value) -> Build {
        let record = value.as_object().cloned().unwrap_or_default();
        Box::new(move |_| Ok(record))
    }

    #[tokio::test]
    async fn test_crud_preserves_insertion_order() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        for id in ["t3", "t1", "t2"] {
            store
                .insert("tenders", fixed(json!({"id": id, "title": id})))
                .await
                .unwrap();
        }

        let ids: Vec<String> = store
            .list("tenders")
            .await
            .unwrap()
            .iter()
            .filter_map(|r| record_id(r).map(str::to_string))
            .collect();
        assert_eq!(ids, vec!["t3", "t1", "t2"]);

        let updated = store
            .update(
                "tenders",
                "t1",
                Box::new(|mut r| {
                    r.insert("status".into(), json!("closed"));
                    Ok(r)
                }),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["status"], "closed");
        assert_eq!(
            store.get("tenders", "t1").await.unwrap().unwrap()["status"],
            "closed"
        );

        assert!(store.remove("tenders", "t2").await.unwrap().is_some());
        assert!(store.remove("tenders", "t2").await.unwrap().is_none());
        assert_eq!(store.list("tenders").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir).await;

        store
            .insert("vendors", fixed(json!({"id": "x"})))
            .await
            .unwrap();
        store
            .insert("invoices", fixed(json!({"id": "x"})))
            .await
            .unwrap();

        let err = store
            .insert("vendors", fixed(json!({"id": "x"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let removed = store
            .remove_where("vendors", Box::new(|_| true))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.list("invoices").await.unwrap().len(), 1);
    }
}
