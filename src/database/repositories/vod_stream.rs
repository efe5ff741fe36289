//! VOD stream repository
//!
//! Owns the storage semantics the synchronizer and the enrichment pipeline
//! rely on: upsert by `(provider, ext_id)` with tmdb-id repair, duplicate
//! collapse with metadata donation, and the per-item enrichment state writes.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::NullOrdering;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Order,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::entities::{prelude::VodStreams, vod_streams};
use crate::errors::ErrorKind;
use crate::models::{EnrichmentCandidate, MetadataBlock, TmdbStatus, VodUpsert};

#[derive(Clone)]
pub struct VodStreamRepository {
    connection: Arc<DatabaseConnection>,
}

impl VodStreamRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    /// All rows for an ext id, most recently updated first.
    pub async fn find_all_by_ext(
        &self,
        provider_id: &Uuid,
        ext_id: i32,
    ) -> Result<Vec<vod_streams::Model>> {
        let models = VodStreams::find()
            .filter(vod_streams::Column::ProviderId.eq(*provider_id))
            .filter(vod_streams::Column::ProviderStreamId.eq(ext_id))
            .order_by_desc(vod_streams::Column::UpdatedAt)
            .order_by_desc(vod_streams::Column::Id)
            .all(&*self.connection)
            .await?;
        Ok(models)
    }

    pub async fn find_all_by_tmdb(
        &self,
        provider_id: &Uuid,
        tmdb_id: i32,
    ) -> Result<Vec<vod_streams::Model>> {
        let models = VodStreams::find()
            .filter(vod_streams::Column::ProviderId.eq(*provider_id))
            .filter(vod_streams::Column::TmdbId.eq(tmdb_id))
            .order_by_desc(vod_streams::Column::CreatedAt)
            .order_by_desc(vod_streams::Column::Id)
            .all(&*self.connection)
            .await?;
        Ok(models)
    }

    /// Upsert one catalog row. A miss on `(provider, ext_id)` falls back to
    /// `(provider, tmdb_id)` to repair rows whose ext id changed upstream.
    pub async fn upsert_from_catalog(
        &self,
        provider_id: &Uuid,
        category_id: &Uuid,
        row: &VodUpsert,
    ) -> Result<bool> {
        let now = Utc::now();
        let mut existing = self.find_all_by_ext(provider_id, row.ext_id).await?;
        if existing.is_empty() {
            if let Some(tmdb_id) = row.tmdb_id {
                existing = self.find_all_by_tmdb(provider_id, tmdb_id).await?;
            }
        }

        match existing.into_iter().next() {
            Some(current) => {
                let unchanged = current.name == row.name
                    && current.stream_icon == row.icon
                    && current.category_id == Some(*category_id)
                    && current.container_extension == row.container_extension
                    && current.rating == row.rating
                    && current.added == row.added
                    && current.provider_stream_id == row.ext_id
                    && current.is_active;
                if unchanged {
                    return Ok(false);
                }
                let mut active: vod_streams::ActiveModel = current.into();
                active.name = Set(row.name.clone());
                active.stream_icon = Set(row.icon.clone());
                active.category_id = Set(Some(*category_id));
                active.container_extension = Set(row.container_extension.clone());
                active.rating = Set(row.rating.clone());
                active.added = Set(row.added.clone());
                active.provider_stream_id = Set(row.ext_id);
                active.is_active = Set(true);
                active.updated_at = Set(now);
                active.update(&*self.connection).await?;
                Ok(true)
            }
            None => {
                let model = vod_streams::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    provider_id: Set(*provider_id),
                    category_id: Set(Some(*category_id)),
                    provider_stream_id: Set(row.ext_id),
                    name: Set(row.name.clone()),
                    normalized_name: Set(None),
                    stream_icon: Set(row.icon.clone()),
                    custom_poster_url: Set(None),
                    container_extension: Set(row.container_extension.clone()),
                    rating: Set(row.rating.clone()),
                    added: Set(row.added.clone()),
                    approved: Set(false),
                    is_active: Set(true),
                    tmdb_id: Set(None),
                    tmdb_status: Set(TmdbStatus::Missing.to_string()),
                    tmdb_last_sync: Set(None),
                    tmdb_error: Set(None),
                    tmdb_error_kind: Set(None),
                    tmdb_fail_count: Set(0),
                    tmdb_title: Set(None),
                    tmdb_overview: Set(None),
                    tmdb_release_date: Set(None),
                    tmdb_genres: Set(None),
                    tmdb_vote_average: Set(None),
                    tmdb_poster_path: Set(None),
                    tmdb_backdrop_path: Set(None),
                    tmdb_raw: Set(None),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                model.insert(&*self.connection).await?;
                Ok(true)
            }
        }
    }

    pub async fn deactivate_absent_in_category(
        &self,
        provider_id: &Uuid,
        category_id: &Uuid,
        seen_ext_ids: &[i32],
    ) -> Result<usize> {
        let existing = VodStreams::find()
            .filter(vod_streams::Column::ProviderId.eq(*provider_id))
            .filter(vod_streams::Column::CategoryId.eq(*category_id))
            .filter(vod_streams::Column::IsActive.eq(true))
            .all(&*self.connection)
            .await?;

        let now = Utc::now();
        let mut changed = 0;
        for stream in existing {
            if !seen_ext_ids.contains(&stream.provider_stream_id) {
                let mut active: vod_streams::ActiveModel = stream.into();
                active.is_active = Set(false);
                active.updated_at = Set(now);
                active.update(&*self.connection).await?;
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Collapse rows sharing `(provider, ext_id)` after a sync batch. The
    /// most recently updated row wins; a synced loser donates its metadata
    /// block to an unsynced winner before deletion.
    pub async fn collapse_duplicates_by_ext(
        &self,
        provider_id: &Uuid,
        seen_ext_ids: &[i32],
    ) -> Result<usize> {
        let mut changed = 0;
        for ext_id in seen_ext_ids {
            let group = self.find_all_by_ext(provider_id, *ext_id).await?;
            if group.len() < 2 {
                continue;
            }
            let mut iter = group.into_iter();
            let winner = iter.next().expect("group has at least two rows");
            let losers: Vec<vod_streams::Model> = iter.collect();
            let donor = losers
                .iter()
                .find(|row| row.tmdb_status == TmdbStatus::Synced.to_string())
                .cloned();

            if winner.tmdb_status != TmdbStatus::Synced.to_string() {
                if let Some(donor) = donor {
                    let mut active: vod_streams::ActiveModel = winner.into();
                    donate_metadata(&mut active, &donor);
                    active.updated_at = Set(Utc::now());
                    active.update(&*self.connection).await?;
                    changed += 1;
                }
            }
            for loser in losers {
                VodStreams::delete_by_id(loser.id).exec(&*self.connection).await?;
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Enrichment candidate pool, least recently synced first (never-synced
    /// rows lead).
    pub async fn candidates(&self, limit: u64) -> Result<Vec<EnrichmentCandidate>> {
        let models = VodStreams::find()
            .order_by_with_nulls(
                vod_streams::Column::TmdbLastSync,
                Order::Asc,
                NullOrdering::First,
            )
            .order_by_asc(vod_streams::Column::CreatedAt)
            .limit(limit)
            .all(&*self.connection)
            .await?;
        Ok(models.iter().map(to_candidate).collect())
    }

    pub async fn load_candidate<C: ConnectionTrait>(
        conn: &C,
        id: &Uuid,
    ) -> Result<Option<EnrichmentCandidate>> {
        let model = VodStreams::find_by_id(*id).one(conn).await?;
        Ok(model.as_ref().map(to_candidate))
    }

    /// Transition an item to `missing` after an empty search result.
    pub async fn mark_missing<C: ConnectionTrait>(
        conn: &C,
        id: &Uuid,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let Some(model) = VodStreams::find_by_id(*id).one(conn).await? else {
            return Ok(());
        };
        let mut active: vod_streams::ActiveModel = model.into();
        active.tmdb_status = Set(TmdbStatus::Missing.to_string());
        active.tmdb_error = Set(None);
        active.tmdb_error_kind = Set(Some(ErrorKind::NotFound.to_string()));
        active.tmdb_last_sync = Set(Some(now));
        active.tmdb_fail_count = Set(0);
        active.updated_at = Set(now);
        active.update(conn).await?;
        Ok(())
    }

    /// Record a classified failure and bump the fail counter.
    pub async fn mark_failed<C: ConnectionTrait>(
        conn: &C,
        id: &Uuid,
        kind: ErrorKind,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let Some(model) = VodStreams::find_by_id(*id).one(conn).await? else {
            return Ok(());
        };
        let fail_count = model.tmdb_fail_count + 1;
        let mut active: vod_streams::ActiveModel = model.into();
        active.tmdb_status = Set(TmdbStatus::Failed.to_string());
        active.tmdb_error = Set(Some(truncate(message, 500)));
        active.tmdb_error_kind = Set(Some(kind.to_string()));
        active.tmdb_last_sync = Set(Some(now));
        active.tmdb_fail_count = Set(fail_count);
        active.updated_at = Set(now);
        active.update(conn).await?;
        Ok(())
    }

    /// Write a hydrated metadata block, collapsing any duplicate row that
    /// already carries the same tmdb id in this provider. A synced duplicate
    /// beats an unsynced item: the item row is deleted and the duplicate
    /// refreshed instead.
    pub async fn apply_metadata<C: ConnectionTrait>(
        conn: &C,
        id: &Uuid,
        provider_id: &Uuid,
        block: &MetadataBlock,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let Some(item) = VodStreams::find_by_id(*id).one(conn).await? else {
            return Ok(());
        };

        let duplicate = VodStreams::find()
            .filter(vod_streams::Column::ProviderId.eq(*provider_id))
            .filter(vod_streams::Column::TmdbId.eq(block.tmdb_id))
            .filter(vod_streams::Column::Id.ne(*id))
            .order_by_desc(vod_streams::Column::CreatedAt)
            .order_by_desc(vod_streams::Column::Id)
            .one(conn)
            .await?;

        let target = match duplicate {
            Some(dup)
                if dup.tmdb_status == TmdbStatus::Synced.to_string()
                    && item.tmdb_status != TmdbStatus::Synced.to_string() =>
            {
                VodStreams::delete_by_id(item.id).exec(conn).await?;
                dup
            }
            Some(dup) => {
                VodStreams::delete_by_id(dup.id).exec(conn).await?;
                item
            }
            None => item,
        };

        let mut active: vod_streams::ActiveModel = target.into();
        active.tmdb_id = Set(Some(block.tmdb_id));
        active.tmdb_status = Set(TmdbStatus::Synced.to_string());
        active.tmdb_error = Set(None);
        active.tmdb_error_kind = Set(None);
        active.tmdb_fail_count = Set(0);
        active.tmdb_last_sync = Set(Some(now));
        active.tmdb_title = Set(block.title.clone());
        active.tmdb_overview = Set(block.overview.clone());
        active.tmdb_release_date = Set(block.release_date);
        active.tmdb_genres = Set(Some(serde_json::json!(block.genres)));
        active.tmdb_vote_average = Set(block.vote_average);
        active.tmdb_poster_path = Set(block.poster_path.clone());
        active.tmdb_backdrop_path = Set(block.backdrop_path.clone());
        active.tmdb_raw = Set(Some(block.raw.clone()));
        active.updated_at = Set(now);
        active.update(conn).await?;
        Ok(())
    }

    /// `(name, normalized_name, tmdb_title, overview)` rows used to build
    /// the EPG description enrichment map.
    pub async fn library_overviews(
        &self,
    ) -> Result<Vec<(String, Option<String>, Option<String>, String)>> {
        let models = VodStreams::find()
            .filter(vod_streams::Column::TmdbOverview.is_not_null())
            .all(&*self.connection)
            .await?;
        Ok(models
            .into_iter()
            .filter_map(|m| {
                m.tmdb_overview
                    .clone()
                    .map(|overview| (m.name, m.normalized_name, m.tmdb_title, overview))
            })
            .collect())
    }

    /// Active, synced rows for a set of tmdb ids (collection augmentation).
    pub async fn find_active_synced_by_tmdb_ids(
        &self,
        tmdb_ids: &[i32],
    ) -> Result<Vec<vod_streams::Model>> {
        if tmdb_ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = VodStreams::find()
            .filter(vod_streams::Column::TmdbId.is_in(tmdb_ids.iter().copied()))
            .filter(vod_streams::Column::TmdbStatus.eq(TmdbStatus::Synced.to_string()))
            .filter(vod_streams::Column::IsActive.eq(true))
            .all(&*self.connection)
            .await?;
        Ok(models)
    }
}

fn to_candidate(model: &vod_streams::Model) -> EnrichmentCandidate {
    EnrichmentCandidate {
        id: model.id,
        provider_id: model.provider_id,
        name: model.name.clone(),
        normalized_name: model.normalized_name.clone(),
        tmdb_id: model.tmdb_id,
        status: TmdbStatus::parse_or_missing(&model.tmdb_status),
        last_sync: model.tmdb_last_sync,
        error_kind: model
            .tmdb_error_kind
            .as_deref()
            .and_then(|raw| ErrorKind::from_str(raw).ok()),
        fail_count: model.tmdb_fail_count,
        created_at: model.created_at,
    }
}

fn donate_metadata(target: &mut vod_streams::ActiveModel, donor: &vod_streams::Model) {
    target.tmdb_id = Set(donor.tmdb_id);
    target.tmdb_status = Set(donor.tmdb_status.clone());
    target.tmdb_last_sync = Set(donor.tmdb_last_sync);
    target.tmdb_error = Set(None);
    target.tmdb_error_kind = Set(None);
    target.tmdb_fail_count = Set(0);
    target.tmdb_title = Set(donor.tmdb_title.clone());
    target.tmdb_overview = Set(donor.tmdb_overview.clone());
    target.tmdb_release_date = Set(donor.tmdb_release_date);
    target.tmdb_genres = Set(donor.tmdb_genres.clone());
    target.tmdb_vote_average = Set(donor.tmdb_vote_average);
    target.tmdb_poster_path = Set(donor.tmdb_poster_path.clone());
    target.tmdb_backdrop_path = Set(donor.tmdb_backdrop_path.clone());
    target.tmdb_raw = Set(donor.tmdb_raw.clone());
}

fn truncate(message: &str, max: usize) -> String {
    if message.len() <= max {
        return message.to_string();
    }
    let mut end = max;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}
