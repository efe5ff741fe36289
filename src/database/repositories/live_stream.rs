//! Live stream repository

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::entities::{live_streams, prelude::LiveStreams};
use crate::models::LiveChannelUpsert;

#[derive(Clone)]
pub struct LiveStreamRepository {
    connection: Arc<DatabaseConnection>,
}

impl LiveStreamRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn find_by_ext(
        &self,
        provider_id: &Uuid,
        ext_id: i32,
    ) -> Result<Option<live_streams::Model>> {
        let model = LiveStreams::find()
            .filter(live_streams::Column::ProviderId.eq(*provider_id))
            .filter(live_streams::Column::ProviderStreamId.eq(ext_id))
            .one(&*self.connection)
            .await?;
        Ok(model)
    }

    /// Upsert one catalog row into a category; returns whether anything
    /// changed.
    pub async fn upsert_from_catalog(
        &self,
        provider_id: &Uuid,
        category_id: &Uuid,
        row: &LiveChannelUpsert,
    ) -> Result<bool> {
        let now = Utc::now();
        match self.find_by_ext(provider_id, row.ext_id).await? {
            Some(existing) => {
                let unchanged = existing.name == row.name
                    && existing.stream_icon == row.icon
                    && existing.epg_channel_id == row.epg_channel_id
                    && existing.category_id == Some(*category_id)
                    && existing.is_active;
                if unchanged {
                    return Ok(false);
                }
                let mut active: live_streams::ActiveModel = existing.into();
                active.name = Set(row.name.clone());
                active.stream_icon = Set(row.icon.clone());
                active.epg_channel_id = Set(row.epg_channel_id.clone());
                active.category_id = Set(Some(*category_id));
                active.is_active = Set(true);
                active.updated_at = Set(now);
                active.update(&*self.connection).await?;
                Ok(true)
            }
            None => {
                let model = live_streams::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    provider_id: Set(*provider_id),
                    category_id: Set(Some(*category_id)),
                    provider_stream_id: Set(row.ext_id),
                    name: Set(row.name.clone()),
                    normalized_name: Set(None),
                    channel_number: Set(None),
                    custom_logo_url: Set(None),
                    stream_icon: Set(row.icon.clone()),
                    epg_channel_id: Set(row.epg_channel_id.clone()),
                    epg_source_id: Set(None),
                    epg_time_offset_minutes: Set(None),
                    approved: Set(false),
                    alt1_stream_id: Set(None),
                    alt2_stream_id: Set(None),
                    alt3_stream_id: Set(None),
                    is_active: Set(true),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                model.insert(&*self.connection).await?;
                Ok(true)
            }
        }
    }

    /// Deactivate active streams of a category that were absent from the
    /// latest listing for that category.
    pub async fn deactivate_absent_in_category(
        &self,
        provider_id: &Uuid,
        category_id: &Uuid,
        seen_ext_ids: &[i32],
    ) -> Result<usize> {
        let existing = LiveStreams::find()
            .filter(live_streams::Column::ProviderId.eq(*provider_id))
            .filter(live_streams::Column::CategoryId.eq(*category_id))
            .filter(live_streams::Column::IsActive.eq(true))
            .all(&*self.connection)
            .await?;

        let now = Utc::now();
        let mut changed = 0;
        for stream in existing {
            if !seen_ext_ids.contains(&stream.provider_stream_id) {
                let mut active: live_streams::ActiveModel = stream.into();
                active.is_active = Set(false);
                active.updated_at = Set(now);
                active.update(&*self.connection).await?;
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Streams considered by EPG auto-match, ordered by name.
    pub async fn list_for_automatch(
        &self,
        provider_id: &Uuid,
        approved_only: bool,
        limit: u64,
    ) -> Result<Vec<live_streams::Model>> {
        let mut query = LiveStreams::find()
            .filter(live_streams::Column::ProviderId.eq(*provider_id));
        if approved_only {
            query = query.filter(live_streams::Column::Approved.eq(true));
        }
        Ok(query
            .order_by_asc(live_streams::Column::Name)
            .limit(limit)
            .all(&*self.connection)
            .await?)
    }

    /// Bind a stream to an EPG channel within a source.
    pub async fn bind_epg(
        &self,
        stream: live_streams::Model,
        epg_source_id: &Uuid,
        xmltv_id: &str,
    ) -> Result<()> {
        let mut active: live_streams::ActiveModel = stream.into();
        active.epg_source_id = Set(Some(*epg_source_id));
        active.epg_channel_id = Set(Some(xmltv_id.to_string()));
        active.updated_at = Set(Utc::now());
        active.update(&*self.connection).await?;
        Ok(())
    }

    /// Resolve failover links one hop deep, dropping dangling references.
    pub async fn resolve_failover(
        &self,
        stream: &live_streams::Model,
    ) -> Result<Vec<live_streams::Model>> {
        let alt_ids: Vec<Uuid> = [stream.alt1_stream_id, stream.alt2_stream_id, stream.alt3_stream_id]
            .into_iter()
            .flatten()
            .collect();
        if alt_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut resolved = Vec::new();
        for alt_id in alt_ids {
            if let Some(model) = LiveStreams::find_by_id(alt_id).one(&*self.connection).await? {
                resolved.push(model);
            }
        }
        Ok(resolved)
    }
}
