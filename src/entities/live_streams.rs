//! Live channels under a provider
//!
//! Unique by `(provider_id, provider_stream_id)`, soft-deletable through
//! `is_active`. The `alt{1,2,3}_stream_id` columns are weak failover links
//! resolved lazily at URL-mint time; dangling references are tolerated.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "live_streams")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub provider_id: Uuid,
    pub category_id: Option<Uuid>,
    pub provider_stream_id: i32,
    pub name: String,
    /// Editor-provided search key used by metadata lookups and auto-match.
    pub normalized_name: Option<String>,
    /// >0, unique per provider when set.
    pub channel_number: Option<i32>,
    pub custom_logo_url: Option<String>,
    pub stream_icon: Option<String>,
    /// XMLTV channel id within `epg_source_id`.
    pub epg_channel_id: Option<String>,
    pub epg_source_id: Option<Uuid>,
    pub epg_time_offset_minutes: Option<i32>,
    pub approved: bool,
    pub alt1_stream_id: Option<Uuid>,
    pub alt2_stream_id: Option<Uuid>,
    pub alt3_stream_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
