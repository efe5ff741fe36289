//! On-demand movies under a provider
//!
//! Unique by `(provider_id, provider_stream_id)` and, when hydrated, by
//! `(provider_id, tmdb_id)`. The `tmdb_*` block is owned by the metadata
//! enrichment pipeline.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "vod_streams")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub provider_id: Uuid,
    pub category_id: Option<Uuid>,
    pub provider_stream_id: i32,
    pub name: String,
    pub normalized_name: Option<String>,
    pub stream_icon: Option<String>,
    pub custom_poster_url: Option<String>,
    pub container_extension: Option<String>,
    pub rating: Option<String>,
    /// Upstream "added" value; arrives as string or epoch, kept opaque.
    pub added: Option<String>,
    pub approved: bool,
    pub is_active: bool,
    pub tmdb_id: Option<i32>,
    /// `missing | synced | failed`
    pub tmdb_status: String,
    pub tmdb_last_sync: Option<DateTimeUtc>,
    pub tmdb_error: Option<String>,
    pub tmdb_error_kind: Option<String>,
    pub tmdb_fail_count: i32,
    pub tmdb_title: Option<String>,
    pub tmdb_overview: Option<String>,
    pub tmdb_release_date: Option<Date>,
    pub tmdb_genres: Option<Json>,
    pub tmdb_vote_average: Option<f64>,
    pub tmdb_poster_path: Option<String>,
    pub tmdb_backdrop_path: Option<String>,
    pub tmdb_raw: Option<Json>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
