//! Episodes owned by a season, keyed by `(season_id, provider_episode_id)`

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "episodes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub season_id: Uuid,
    pub series_item_id: Uuid,
    pub provider_episode_id: i32,
    pub episode_number: Option<i32>,
    pub title: Option<String>,
    pub container_extension: Option<String>,
    pub duration_seconds: Option<i32>,
    pub raw: Option<Json>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
