//! EPG repository: sources, channels, and programs
//!
//! Programs are wholly owned by the ingest engine; a source re-sync purges
//! every program carrying that source id before inserting fresh rows.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::{epg_channels, epg_programs, epg_sources, prelude::*};

#[derive(Clone)]
pub struct EpgRepository {
    connection: Arc<DatabaseConnection>,
}

impl EpgRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn find_source(&self, id: &Uuid) -> Result<Option<epg_sources::Model>> {
        Ok(EpgSources::find_by_id(*id).one(&*self.connection).await?)
    }

    pub async fn list_active_sources(&self) -> Result<Vec<epg_sources::Model>> {
        let models = EpgSources::find()
            .filter(epg_sources::Column::IsActive.eq(true))
            .order_by_asc(epg_sources::Column::Name)
            .all(&*self.connection)
            .await?;
        Ok(models)
    }

    pub async fn create_source(&self, name: &str, xmltv_url: &str) -> Result<epg_sources::Model> {
        let now = Utc::now();
        let model = epg_sources::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.trim().to_string()),
            xmltv_url: Set(xmltv_url.trim().to_string()),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(model.insert(&*self.connection).await?)
    }

    pub async fn touch_source(&self, id: &Uuid) -> Result<()> {
        if let Some(model) = self.find_source(id).await? {
            let mut active: epg_sources::ActiveModel = model.into();
            active.updated_at = Set(Utc::now());
            active.update(&*self.connection).await?;
        }
        Ok(())
    }

    pub async fn channels_for_source(&self, source_id: &Uuid) -> Result<Vec<epg_channels::Model>> {
        let models = EpgChannels::find()
            .filter(epg_channels::Column::EpgSourceId.eq(*source_id))
            .all(&*self.connection)
            .await?;
        Ok(models)
    }

    pub async fn insert_channel(
        &self,
        source_id: &Uuid,
        xmltv_id: &str,
        display_name: &str,
        icon_url: Option<&str>,
    ) -> Result<epg_channels::Model> {
        let now = Utc::now();
        let model = epg_channels::ActiveModel {
            id: Set(Uuid::new_v4()),
            epg_source_id: Set(*source_id),
            xmltv_id: Set(xmltv_id.to_string()),
            display_name: Set(display_name.to_string()),
            icon_url: Set(icon_url.map(|s| s.to_string())),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(model.insert(&*self.connection).await?)
    }

    pub async fn update_channel_meta(
        &self,
        channel: epg_channels::Model,
        display_name: &str,
        icon_url: Option<&str>,
    ) -> Result<epg_channels::Model> {
        let mut active: epg_channels::ActiveModel = channel.into();
        active.display_name = Set(display_name.to_string());
        active.icon_url = Set(icon_url.map(|s| s.to_string()));
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.connection).await?)
    }

    /// Delete every program belonging to a source. Returns the purge count.
    pub async fn purge_programs(&self, source_id: &Uuid) -> Result<u64> {
        let result = EpgPrograms::delete_many()
            .filter(epg_programs::Column::EpgSourceId.eq(*source_id))
            .exec(&*self.connection)
            .await?;
        Ok(result.rows_affected)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_program(
        &self,
        source_id: &Uuid,
        channel_id: &Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        title: &str,
        description: Option<&str>,
        category: Option<&str>,
    ) -> Result<()> {
        let model = epg_programs::ActiveModel {
            id: Set(Uuid::new_v4()),
            epg_source_id: Set(*source_id),
            channel_id: Set(*channel_id),
            start_time: Set(start_time),
            end_time: Set(end_time),
            title: Set(title.to_string()),
            description: Set(description.map(|s| s.to_string())),
            category: Set(category.map(|s| s.to_string())),
            created_at: Set(Utc::now()),
        };
        model.insert(&*self.connection).await?;
        Ok(())
    }

    pub async fn count_programs(&self, source_id: &Uuid) -> Result<u64> {
        let count = EpgPrograms::find()
            .filter(epg_programs::Column::EpgSourceId.eq(*source_id))
            .count(&*self.connection)
            .await?;
        Ok(count)
    }

    pub async fn programs_for_source(&self, source_id: &Uuid) -> Result<Vec<epg_programs::Model>> {
        let models = EpgPrograms::find()
            .filter(epg_programs::Column::EpgSourceId.eq(*source_id))
            .order_by_asc(epg_programs::Column::StartTime)
            .all(&*self.connection)
            .await?;
        Ok(models)
    }

    /// `(xmltv_id, display_name)` pairs used as auto-match candidates.
    pub async fn match_candidates(&self, source_id: &Uuid) -> Result<Vec<(String, String)>> {
        let channels = self.channels_for_source(source_id).await?;
        Ok(channels
            .into_iter()
            .map(|c| (c.xmltv_id, c.display_name))
            .collect())
    }
}
