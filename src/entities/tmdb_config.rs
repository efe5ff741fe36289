//! Process-wide metadata API configuration (database-backed singleton)
//!
//! Either the read access token or the api key is an acceptable credential;
//! the token wins when both are set.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tmdb_config")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub is_enabled: bool,
    pub api_key: Option<String>,
    pub read_access_token: Option<String>,
    pub language: Option<String>,
    pub region: Option<String>,
    pub requests_per_second: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
