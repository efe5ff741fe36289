//! Category repository
//!
//! Categories are upserted by `(provider, kind, ext_id)`; a category's
//! active flag mirrors its presence in the last upstream listing.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::{categories, prelude::Categories};
use crate::models::CategoryKind;

#[derive(Clone)]
pub struct CategoryRepository {
    connection: Arc<DatabaseConnection>,
}

impl CategoryRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn list(
        &self,
        provider_id: &Uuid,
        kind: CategoryKind,
        include_inactive: bool,
    ) -> Result<Vec<categories::Model>> {
        let mut query = Categories::find()
            .filter(categories::Column::ProviderId.eq(*provider_id))
            .filter(categories::Column::Kind.eq(kind.to_string()));
        if !include_inactive {
            query = query.filter(categories::Column::IsActive.eq(true));
        }
        Ok(query
            .order_by_asc(categories::Column::Name)
            .all(&*self.connection)
            .await?)
    }

    pub async fn find_by_ext(
        &self,
        provider_id: &Uuid,
        kind: CategoryKind,
        ext_id: i32,
    ) -> Result<Option<categories::Model>> {
        let model = Categories::find()
            .filter(categories::Column::ProviderId.eq(*provider_id))
            .filter(categories::Column::Kind.eq(kind.to_string()))
            .filter(categories::Column::ProviderCategoryId.eq(ext_id))
            .one(&*self.connection)
            .await?;
        Ok(model)
    }

    /// Upsert one upstream category row and mark it active. Returns whether
    /// anything changed.
    pub async fn upsert_active(
        &self,
        provider_id: &Uuid,
        kind: CategoryKind,
        ext_id: i32,
        name: &str,
    ) -> Result<bool> {
        let now = Utc::now();
        match self.find_by_ext(provider_id, kind, ext_id).await? {
            Some(existing) => {
                if existing.name == name && existing.is_active {
                    return Ok(false);
                }
                let mut active: categories::ActiveModel = existing.into();
                active.name = Set(name.to_string());
                active.is_active = Set(true);
                active.updated_at = Set(now);
                active.update(&*self.connection).await?;
                Ok(true)
            }
            None => {
                let model = categories::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    provider_id: Set(*provider_id),
                    kind: Set(kind.to_string()),
                    provider_category_id: Set(ext_id),
                    name: Set(name.to_string()),
                    is_active: Set(true),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                model.insert(&*self.connection).await?;
                Ok(true)
            }
        }
    }

    /// Deactivate active categories of this kind that are absent from the
    /// latest upstream response. Returns the number of rows toggled.
    pub async fn deactivate_absent(
        &self,
        provider_id: &Uuid,
        kind: CategoryKind,
        seen_ext_ids: &[i32],
    ) -> Result<usize> {
        let existing = self.list(provider_id, kind, true).await?;
        let now = Utc::now();
        let mut changed = 0;
        for category in existing {
            if category.is_active && !seen_ext_ids.contains(&category.provider_category_id) {
                let mut active: categories::ActiveModel = category.into();
                active.is_active = Set(false);
                active.updated_at = Set(now);
                active.update(&*self.connection).await?;
                changed += 1;
            }
        }
        Ok(changed)
    }
}
