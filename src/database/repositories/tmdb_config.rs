//! Metadata API configuration repository
//!
//! The configuration row is a database-backed singleton; `get_or_create`
//! seeds defaults on first access.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QuerySelect, Set};
use uuid::Uuid;

use crate::entities::{prelude::TmdbConfig, tmdb_config};

#[derive(Clone)]
pub struct TmdbConfigRepository {
    connection: Arc<DatabaseConnection>,
}

impl TmdbConfigRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn get_or_create(&self) -> Result<tmdb_config::Model> {
        if let Some(existing) = TmdbConfig::find().limit(1).one(&*self.connection).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let model = tmdb_config::ActiveModel {
            id: Set(Uuid::new_v4()),
            is_enabled: Set(false),
            api_key: Set(None),
            read_access_token: Set(None),
            language: Set(Some("en-US".to_string())),
            region: Set(Some("US".to_string())),
            requests_per_second: Set(5),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(model.insert(&*self.connection).await?)
    }

    /// Whether enrichment can run: enabled and at least one credential set.
    pub fn is_usable(config: &tmdb_config::Model) -> bool {
        config.is_enabled
            && (config.read_access_token.as_deref().is_some_and(|t| !t.is_empty())
                || config.api_key.as_deref().is_some_and(|k| !k.is_empty()))
    }
}
