//! Read-through TTL cache in front of selected collections.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{record_id, Build, CollectionStore, Mutation, Predicate, Record};
use crate::cache::{Clock, TtlCache};
use crate::errors::AppError;

/// Wraps another store and caches whole-collection reads for the named
/// collections. Any write through this store invalidates that collection.
pub struct CachedStore {
    inner: Arc<dyn CollectionStore>,
    caches: HashMap<String, TtlCache<Vec<Record>>>,
}

impl CachedStore {
    pub fn new(
        inner: Arc<dyn CollectionStore>,
        collections: &[&str],
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let caches = collections
            .iter()
            .map(|name| (name.to_string(), TtlCache::new(ttl, clock.clone())))
            .collect();
        Self { inner, caches }
    }

    pub fn is_cached(&self, collection: &str) -> bool {
        self.caches.contains_key(collection)
    }

    /// Drop the cached copy of `collection`, if any.
    pub async fn invalidate(&self, collection: &str) {
        if let Some(cache) = self.caches.get(collection) {
            cache.invalidate().await;
        }
    }
}

#[async_trait]
impl CollectionStore for CachedStore {
    async fn list(&self, collection: &str) -> Result<Vec<Record>, AppError> {
        let Some(cache) = self.caches.get(collection) else {
            return self.inner.list(collection).await;
        };

        if let Some(records) = cache.get().await {
            tracing::trace!(collection, "cache hit");
            return Ok(records);
        }

        let generation = cache.generation().await;
        match self.inner.list(collection).await {
            Ok(records) => {
                if !cache.put_if_current(records.clone(), generation).await {
                    tracing::trace!(collection, "collection written during read, not caching");
                }
                Ok(records)
            }
            Err(e) => {
                tracing::warn!(
                    collection,
                    "Failed to load cached collection, serving empty list: {}",
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, AppError> {
        if !self.is_cached(collection) {
            return self.inner.get(collection, id).await;
        }
        Ok(self
            .list(collection)
            .await?
            .into_iter()
            .find(|r| record_id(r) == Some(id)))
    }

    async fn insert(&self, collection: &str, build: Build) -> Result<Record, AppError> {
        let result = self.inner.insert(collection, build).await;
        self.invalidate(collection).await;
        result
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        mutate: Mutation,
    ) -> Result<Option<Record>, AppError> {
        let result = self.inner.update(collection, id, mutate).await;
        self.invalidate(collection).await;
        result
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<Option<Record>, AppError> {
        let result = self.inner.remove(collection, id).await;
        self.invalidate(collection).await;
        result
    }

    async fn remove_where(
        &self,
        collection: &str,
        predicate: Predicate,
    ) -> Result<usize, AppError> {
        let result = self.inner.remove_where(collection, predicate).await;
        self.invalidate(collection).await;
        result
    }
}
