//! Per-provider auto-sync schedule repository

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::entities::{prelude::ProviderAutoSync, provider_auto_sync};

const DEFAULT_INTERVAL_MINUTES: i32 = 60;

#[derive(Clone)]
pub struct AutoSyncRepository {
    connection: Arc<DatabaseConnection>,
}

impl AutoSyncRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn get_or_create(&self, provider_id: &Uuid) -> Result<provider_auto_sync::Model> {
        if let Some(existing) = ProviderAutoSync::find()
            .filter(provider_auto_sync::Column::ProviderId.eq(*provider_id))
            .one(&*self.connection)
            .await?
        {
            return Ok(existing);
        }

        let now = Utc::now();
        let model = provider_auto_sync::ActiveModel {
            id: Set(Uuid::new_v4()),
            provider_id: Set(*provider_id),
            interval_minutes: Set(DEFAULT_INTERVAL_MINUTES),
            last_run_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(model.insert(&*self.connection).await?)
    }

    pub async fn set_interval(
        &self,
        provider_id: &Uuid,
        interval_minutes: i32,
    ) -> Result<provider_auto_sync::Model> {
        let existing = self.get_or_create(provider_id).await?;
        let mut active: provider_auto_sync::ActiveModel = existing.into();
        active.interval_minutes = Set(interval_minutes);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.connection).await?)
    }

    /// Record a run. Set regardless of the run outcome so a broken provider
    /// does not hot-loop.
    pub async fn mark_ran(&self, provider_id: &Uuid, at: DateTime<Utc>) -> Result<()> {
        let existing = self.get_or_create(provider_id).await?;
        let mut active: provider_auto_sync::ActiveModel = existing.into();
        active.last_run_at = Set(Some(at));
        active.updated_at = Set(at);
        active.update(&*self.connection).await?;
        Ok(())
    }

    /// Whether a provider is due for a sync at `now`.
    pub fn is_due(config: &provider_auto_sync::Model, now: DateTime<Utc>) -> bool {
        if config.interval_minutes <= 0 {
            return false;
        }
        match config.last_run_at {
            None => true,
            Some(last) => last + chrono::Duration::minutes(config.interval_minutes as i64) <= now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(interval: i32, last_run_at: Option<DateTime<Utc>>) -> provider_auto_sync::Model {
        let now = Utc::now();
        provider_auto_sync::Model {
            id: Uuid::new_v4(),
            provider_id: Uuid::new_v4(),
            interval_minutes: interval,
            last_run_at,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn never_run_is_due() {
        assert!(AutoSyncRepository::is_due(&config(60, None), Utc::now()));
    }

    #[test]
    fn zero_interval_disables() {
        assert!(!AutoSyncRepository::is_due(&config(0, None), Utc::now()));
    }

    #[test]
    fn due_exactly_at_interval_boundary() {
        let now = Utc::now();
        let cfg = config(60, Some(now - chrono::Duration::minutes(60)));
        assert!(AutoSyncRepository::is_due(&cfg, now));

        let cfg = config(60, Some(now - chrono::Duration::minutes(59)));
        assert!(!AutoSyncRepository::is_due(&cfg, now));
    }
}
