//! Series repository, including seasons and episodes
//!
//! Mirrors the VOD repository for the sync and enrichment paths; the extra
//! surface is the season/episode upsert fed by the series-info detail call.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::sea_query::NullOrdering;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Order,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::entities::{episodes, prelude::*, seasons, series_items};
use crate::errors::ErrorKind;
use crate::models::{EnrichmentCandidate, MetadataBlock, SeriesUpsert, TmdbStatus};

/// One season parsed from the series-info detail response.
#[derive(Debug, Clone)]
pub struct SeasonUpsert {
    pub season_number: i32,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub air_date: Option<NaiveDate>,
    pub episode_count: Option<i32>,
    pub cover: Option<String>,
    pub raw: serde_json::Value,
}

/// One episode parsed from the series-info detail response.
#[derive(Debug, Clone)]
pub struct EpisodeUpsert {
    pub season_number: i32,
    pub provider_episode_id: i32,
    pub episode_number: Option<i32>,
    pub title: Option<String>,
    pub container_extension: Option<String>,
    pub duration_seconds: Option<i32>,
    pub raw: serde_json::Value,
}

#[derive(Clone)]
pub struct SeriesItemRepository {
    connection: Arc<DatabaseConnection>,
}

impl SeriesItemRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn find_by_ext(
        &self,
        provider_id: &Uuid,
        ext_id: i32,
    ) -> Result<Option<series_items::Model>> {
        let model = SeriesItems::find()
            .filter(series_items::Column::ProviderId.eq(*provider_id))
            .filter(series_items::Column::ProviderSeriesId.eq(ext_id))
            .one(&*self.connection)
            .await?;
        Ok(model)
    }

    pub async fn upsert_from_catalog(
        &self,
        provider_id: &Uuid,
        category_id: &Uuid,
        row: &SeriesUpsert,
    ) -> Result<bool> {
        let now = Utc::now();
        match self.find_by_ext(provider_id, row.ext_id).await? {
            Some(existing) => {
                let unchanged = existing.name == row.name
                    && existing.cover == row.cover
                    && existing.category_id == Some(*category_id)
                    && existing.is_active;
                if unchanged {
                    return Ok(false);
                }
                let mut active: series_items::ActiveModel = existing.into();
                active.name = Set(row.name.clone());
                active.cover = Set(row.cover.clone());
                active.category_id = Set(Some(*category_id));
                active.is_active = Set(true);
                active.updated_at = Set(now);
                active.update(&*self.connection).await?;
                Ok(true)
            }
            None => {
                let model = series_items::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    provider_id: Set(*provider_id),
                    category_id: Set(Some(*category_id)),
                    provider_series_id: Set(row.ext_id),
                    name: Set(row.name.clone()),
                    normalized_name: Set(None),
                    cover: Set(row.cover.clone()),
                    custom_cover_url: Set(None),
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
        let existing = SeriesItems::find()
            .filter(series_items::Column::ProviderId.eq(*provider_id))
            .filter(series_items::Column::CategoryId.eq(*category_id))
            .filter(series_items::Column::IsActive.eq(true))
            .all(&*self.connection)
            .await?;

        let now = Utc::now();
        let mut changed = 0;
        for item in existing {
            if !seen_ext_ids.contains(&item.provider_series_id) {
                let mut active: series_items::ActiveModel = item.into();
                active.is_active = Set(false);
                active.updated_at = Set(now);
                active.update(&*self.connection).await?;
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Upsert seasons and episodes from a series-info detail response.
    pub async fn upsert_series_detail(
        &self,
        series_item_id: &Uuid,
        seasons_in: &[SeasonUpsert],
        episodes_in: &[EpisodeUpsert],
    ) -> Result<(usize, usize)> {
        let now = Utc::now();
        let mut season_ids: std::collections::HashMap<i32, Uuid> = std::collections::HashMap::new();
        let mut seasons_changed = 0;
        let mut episodes_changed = 0;

        for season in seasons_in {
            let existing = Seasons::find()
                .filter(seasons::Column::SeriesItemId.eq(*series_item_id))
                .filter(seasons::Column::SeasonNumber.eq(season.season_number))
                .one(&*self.connection)
                .await?;
            let season_id = match existing {
                Some(model) => {
                    let id = model.id;
                    let mut active: seasons::ActiveModel = model.into();
                    active.name = Set(season.name.clone());
                    active.overview = Set(season.overview.clone());
                    active.air_date = Set(season.air_date);
                    active.episode_count = Set(season.episode_count);
                    active.cover = Set(season.cover.clone());
                    active.raw = Set(Some(season.raw.clone()));
                    active.updated_at = Set(now);
                    active.update(&*self.connection).await?;
                    id
                }
                None => {
                    let id = Uuid::new_v4();
                    let model = seasons::ActiveModel {
                        id: Set(id),
                        series_item_id: Set(*series_item_id),
                        season_number: Set(season.season_number),
                        name: Set(season.name.clone()),
                        overview: Set(season.overview.clone()),
                        air_date: Set(season.air_date),
                        episode_count: Set(season.episode_count),
                        cover: Set(season.cover.clone()),
                        raw: Set(Some(season.raw.clone())),
                        created_at: Set(now),
                        updated_at: Set(now),
                    };
                    model.insert(&*self.connection).await?;
                    seasons_changed += 1;
                    id
                }
            };
            season_ids.insert(season.season_number, season_id);
        }

        for episode in episodes_in {
            let Some(season_id) = season_ids.get(&episode.season_number).copied() else {
                continue;
            };
            let existing = Episodes::find()
                .filter(episodes::Column::SeasonId.eq(season_id))
                .filter(episodes::Column::ProviderEpisodeId.eq(episode.provider_episode_id))
                .one(&*self.connection)
                .await?;
            match existing {
                Some(model) => {
                    let mut active: episodes::ActiveModel = model.into();
                    active.episode_number = Set(episode.episode_number);
                    active.title = Set(episode.title.clone());
                    active.container_extension = Set(episode.container_extension.clone());
                    active.duration_seconds = Set(episode.duration_seconds);
                    active.raw = Set(Some(episode.raw.clone()));
                    active.updated_at = Set(now);
                    active.update(&*self.connection).await?;
                }
                None => {
                    let model = episodes::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        season_id: Set(season_id),
                        series_item_id: Set(*series_item_id),
                        provider_episode_id: Set(episode.provider_episode_id),
                        episode_number: Set(episode.episode_number),
                        title: Set(episode.title.clone()),
                        container_extension: Set(episode.container_extension.clone()),
                        duration_seconds: Set(episode.duration_seconds),
                        raw: Set(Some(episode.raw.clone())),
                        created_at: Set(now),
                        updated_at: Set(now),
                    };
                    model.insert(&*self.connection).await?;
                    episodes_changed += 1;
                }
            }
        }

        Ok((seasons_changed, episodes_changed))
    }

    pub async fn candidates(&self, limit: u64) -> Result<Vec<EnrichmentCandidate>> {
        let models = SeriesItems::find()
            .order_by_with_nulls(
                series_items::Column::TmdbLastSync,
                Order::Asc,
                NullOrdering::First,
            )
            .order_by_asc(series_items::Column::CreatedAt)
            .limit(limit)
            .all(&*self.connection)
            .await?;
        Ok(models.iter().map(to_candidate).collect())
    }

    pub async fn load_candidate<C: ConnectionTrait>(
        conn: &C,
        id: &Uuid,
    ) -> Result<Option<EnrichmentCandidate>> {
        let model = SeriesItems::find_by_id(*id).one(conn).await?;
        Ok(model.as_ref().map(to_candidate))
    }

    pub async fn mark_missing<C: ConnectionTrait>(
        conn: &C,
        id: &Uuid,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let Some(model) = SeriesItems::find_by_id(*id).one(conn).await? else {
            return Ok(());
        };
        let mut active: series_items::ActiveModel = model.into();
        active.tmdb_status = Set(TmdbStatus::Missing.to_string());
        active.tmdb_error = Set(None);
        active.tmdb_error_kind = Set(Some(ErrorKind::NotFound.to_string()));
        active.tmdb_last_sync = Set(Some(now));
        active.tmdb_fail_count = Set(0);
        active.updated_at = Set(now);
        active.update(conn).await?;
        Ok(())
    }

    pub async fn mark_failed<C: ConnectionTrait>(
        conn: &C,
        id: &Uuid,
        kind: ErrorKind,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let Some(model) = SeriesItems::find_by_id(*id).one(conn).await? else {
            return Ok(());
        };
        let fail_count = model.tmdb_fail_count + 1;
        let mut active: series_items::ActiveModel = model.into();
        active.tmdb_status = Set(TmdbStatus::Failed.to_string());
        active.tmdb_error = Set(Some(truncate(message, 500)));
        active.tmdb_error_kind = Set(Some(kind.to_string()));
        active.tmdb_last_sync = Set(Some(now));
        active.tmdb_fail_count = Set(fail_count);
        active.updated_at = Set(now);
        active.update(conn).await?;
        Ok(())
    }

    pub async fn apply_metadata<C: ConnectionTrait>(
        conn: &C,
        id: &Uuid,
        provider_id: &Uuid,
        block: &MetadataBlock,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let Some(item) = SeriesItems::find_by_id(*id).one(conn).await? else {
            return Ok(());
        };

        let duplicate = SeriesItems::find()
            .filter(series_items::Column::ProviderId.eq(*provider_id))
            .filter(series_items::Column::TmdbId.eq(block.tmdb_id))
            .filter(series_items::Column::Id.ne(*id))
            .order_by_desc(series_items::Column::CreatedAt)
            .order_by_desc(series_items::Column::Id)
            .one(conn)
            .await?;

        let target = match duplicate {
            Some(dup)
                if dup.tmdb_status == TmdbStatus::Synced.to_string()
                    && item.tmdb_status != TmdbStatus::Synced.to_string() =>
            {
                SeriesItems::delete_by_id(item.id).exec(conn).await?;
                dup
            }
            Some(dup) => {
                SeriesItems::delete_by_id(dup.id).exec(conn).await?;
                item
            }
            None => item,
        };

        let mut active: series_items::ActiveModel = target.into();
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

    pub async fn library_overviews(
        &self,
    ) -> Result<Vec<(String, Option<String>, Option<String>, String)>> {
        let models = SeriesItems::find()
            .filter(series_items::Column::TmdbOverview.is_not_null())
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

    pub async fn find_active_synced_by_tmdb_ids(
        &self,
        tmdb_ids: &[i32],
    ) -> Result<Vec<series_items::Model>> {
        if tmdb_ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = SeriesItems::find()
            .filter(series_items::Column::TmdbId.is_in(tmdb_ids.iter().copied()))
            .filter(series_items::Column::TmdbStatus.eq(TmdbStatus::Synced.to_string()))
            .filter(series_items::Column::IsActive.eq(true))
            .all(&*self.connection)
            .await?;
        Ok(models)
    }
}

fn to_candidate(model: &series_items::Model) -> EnrichmentCandidate {
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
