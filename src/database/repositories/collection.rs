//! Collection and collection-cache repository

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde_json::Value;
use uuid::Uuid;

use crate::entities::{collection_cache, collections, prelude::*};

pub const DEFAULT_CACHE_TTL_SECONDS: i64 = 3600;

#[derive(Clone)]
pub struct CollectionRepository {
    connection: Arc<DatabaseConnection>,
}

impl CollectionRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn find_by_id(&self, id: &Uuid) -> Result<Option<collections::Model>> {
        Ok(Collections::find_by_id(*id).one(&*self.connection).await?)
    }

    /// Look up by UUID first, slug second.
    pub async fn find_by_identifier(&self, identifier: &str) -> Result<Option<collections::Model>> {
        if let Ok(id) = Uuid::parse_str(identifier) {
            if let Some(found) = self.find_by_id(&id).await? {
                return Ok(Some(found));
            }
        }
        let model = Collections::find()
            .filter(collections::Column::Slug.eq(identifier))
            .one(&*self.connection)
            .await?;
        Ok(model)
    }

    pub async fn list_enabled(&self) -> Result<Vec<collections::Model>> {
        let models = Collections::find()
            .filter(collections::Column::Enabled.eq(true))
            .order_by_asc(collections::Column::OrderIndex)
            .order_by_desc(collections::Column::CreatedAt)
            .all(&*self.connection)
            .await?;
        Ok(models)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        name: &str,
        slug: &str,
        source_type: &str,
        source_id: Option<i32>,
        filters: Option<Value>,
        cache_ttl_seconds: Option<i32>,
        order_index: i32,
    ) -> Result<collections::Model> {
        let now = Utc::now();
        let model = collections::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.trim().to_string()),
            slug: Set(slug.trim().to_string()),
            source_type: Set(source_type.to_string()),
            source_id: Set(source_id),
            filters: Set(filters),
            cache_ttl_seconds: Set(cache_ttl_seconds),
            enabled: Set(true),
            order_index: Set(order_index),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(model.insert(&*self.connection).await?)
    }

    /// Effective TTL for a collection, falling back to the default.
    pub fn resolve_ttl(collection: &collections::Model) -> Duration {
        let ttl = collection
            .cache_ttl_seconds
            .filter(|ttl| *ttl > 0)
            .map(|ttl| ttl as i64)
            .unwrap_or(DEFAULT_CACHE_TTL_SECONDS);
        Duration::seconds(ttl)
    }

    pub async fn get_cache(
        &self,
        collection_id: &Uuid,
        page: i32,
    ) -> Result<Option<collection_cache::Model>> {
        let model = CollectionCache::find()
            .filter(collection_cache::Column::CollectionId.eq(*collection_id))
            .filter(collection_cache::Column::Page.eq(page))
            .one(&*self.connection)
            .await?;
        Ok(model)
    }

    /// Upsert the cached payload for `(collection, page)` with
    /// `expires_at = now + ttl`.
    pub async fn upsert_cache(
        &self,
        collection: &collections::Model,
        page: i32,
        payload: Value,
        now: DateTime<Utc>,
    ) -> Result<collection_cache::Model> {
        let expires_at = now + Self::resolve_ttl(collection);
        match self.get_cache(&collection.id, page).await? {
            Some(existing) => {
                let mut active: collection_cache::ActiveModel = existing.into();
                active.payload = Set(payload);
                active.expires_at = Set(expires_at);
                active.updated_at = Set(now);
                Ok(active.update(&*self.connection).await?)
            }
            None => {
                let model = collection_cache::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    collection_id: Set(collection.id),
                    page: Set(page),
                    payload: Set(payload),
                    expires_at: Set(expires_at),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                Ok(model.insert(&*self.connection).await?)
            }
        }
    }

    /// Cache rows of enabled collections whose entries have expired.
    pub async fn expired_entries(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<(collection_cache::Model, collections::Model)>> {
        let expired = CollectionCache::find()
            .filter(collection_cache::Column::ExpiresAt.lte(now))
            .all(&*self.connection)
            .await?;

        let mut entries = Vec::new();
        for cache in expired {
            if let Some(collection) = self.find_by_id(&cache.collection_id).await? {
                if collection.enabled {
                    entries.push((cache, collection));
                }
            }
        }
        Ok(entries)
    }
}
