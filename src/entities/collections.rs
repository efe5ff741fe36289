//! Curated home-screen rows

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "collections")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub slug: String,
    /// `trending | list | discover | collection`
    pub source_type: String,
    pub source_id: Option<i32>,
    /// Opaque filter map interpreted by the browse dispatcher.
    pub filters: Option<Json>,
    pub cache_ttl_seconds: Option<i32>,
    pub enabled: bool,
    pub order_index: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
