//! Multi-tenant credential pairs under a provider
//!
//! Each user is addressable by a short opaque code used when minting
//! streaming URLs. The distinguished `ADMIN` alias is preferred for catalog
//! sync operations.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "provider_users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub provider_id: Uuid,
    pub alias: String,
    pub username: String,
    pub password: String,
    /// 6 alphanumeric chars, unique, collision-checked at insert.
    pub unique_code: String,
    pub is_enabled: bool,
    pub max_connections: Option<i32>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
