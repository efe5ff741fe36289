//! Provider repository

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::{prelude::Providers, providers};

#[derive(Clone)]
pub struct ProviderRepository {
    connection: Arc<DatabaseConnection>,
}

impl ProviderRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn find_by_id(&self, id: &Uuid) -> Result<Option<providers::Model>> {
        Ok(Providers::find_by_id(*id).one(&*self.connection).await?)
    }

    pub async fn list_active(&self) -> Result<Vec<providers::Model>> {
        let models = Providers::find()
            .filter(providers::Column::IsActive.eq(true))
            .order_by_asc(providers::Column::CreatedAt)
            .all(&*self.connection)
            .await?;
        Ok(models)
    }

    pub async fn create(
        &self,
        name: &str,
        base_url: &str,
        username: &str,
        password: &str,
    ) -> Result<providers::Model> {
        let now = Utc::now();
        let model = providers::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            base_url: Set(base_url.trim_end_matches('/').to_string()),
            username: Set(username.to_string()),
            password: Set(password.to_string()),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(model.insert(&*self.connection).await?)
    }
}
