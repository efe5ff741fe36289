//! Provider user repository
//!
//! Provider users carry the credential pairs used to mint streaming URLs.
//! The `ADMIN` alias, when enabled, is preferred over the provider's legacy
//! credentials for sync operations.

use std::sync::Arc;

use anyhow::{Result, bail};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::entities::{prelude::ProviderUsers, provider_users, providers};
use crate::utils::unique_code::generate_unique_code;

const ADMIN_ALIAS: &str = "ADMIN";
const CODE_INSERT_ATTEMPTS: usize = 10;

#[derive(Clone)]
pub struct ProviderUserRepository {
    connection: Arc<DatabaseConnection>,
}

impl ProviderUserRepository {
    pub fn new(connection: Arc<DatabaseConnection>) -> Self {
        Self { connection }
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<provider_users::Model>> {
        let model = ProviderUsers::find()
            .filter(provider_users::Column::UniqueCode.eq(code))
            .one(&*self.connection)
            .await?;
        Ok(model)
    }

    pub async fn admin_for(&self, provider_id: &Uuid) -> Result<Option<provider_users::Model>> {
        let model = ProviderUsers::find()
            .filter(provider_users::Column::ProviderId.eq(*provider_id))
            .filter(provider_users::Column::Alias.eq(ADMIN_ALIAS))
            .filter(provider_users::Column::IsEnabled.eq(true))
            .one(&*self.connection)
            .await?;
        Ok(model)
    }

    /// Credentials used by catalog sync: the enabled ADMIN user when present,
    /// otherwise the provider's own credential pair.
    pub async fn sync_credentials(&self, provider: &providers::Model) -> Result<(String, String)> {
        if let Some(admin) = self.admin_for(&provider.id).await? {
            return Ok((admin.username, admin.password));
        }
        if !provider.username.is_empty() && !provider.password.is_empty() {
            return Ok((provider.username.clone(), provider.password.clone()));
        }
        bail!(
            "no sync credentials for provider '{}': create an ADMIN user or set provider credentials",
            provider.name
        )
    }

    /// Create a user with a fresh unique code, re-rolling on collision.
    pub async fn create(
        &self,
        provider_id: &Uuid,
        alias: &str,
        username: &str,
        password: &str,
        max_connections: Option<i32>,
    ) -> Result<provider_users::Model> {
        let now = Utc::now();
        for _ in 0..CODE_INSERT_ATTEMPTS {
            let code = generate_unique_code();
            let exists = ProviderUsers::find()
                .filter(provider_users::Column::UniqueCode.eq(&code))
                .one(&*self.connection)
                .await?
                .is_some();
            if exists {
                continue;
            }
            let model = provider_users::ActiveModel {
                id: Set(Uuid::new_v4()),
                provider_id: Set(*provider_id),
                alias: Set(alias.to_string()),
                username: Set(username.to_string()),
                password: Set(password.to_string()),
                unique_code: Set(code),
                is_enabled: Set(true),
                max_connections: Set(max_connections),
                created_at: Set(now),
                updated_at: Set(now),
            };
            return Ok(model.insert(&*self.connection).await?);
        }
        bail!("could not find a free unique code after {CODE_INSERT_ATTEMPTS} attempts")
    }
}
