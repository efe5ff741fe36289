use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create tables in order of dependencies
        self.create_providers_table(manager).await?;
        self.create_provider_users_table(manager).await?;
        self.create_provider_auto_sync_table(manager).await?;
        self.create_categories_table(manager).await?;
        self.create_epg_sources_table(manager).await?;
        self.create_epg_channels_table(manager).await?;
        self.create_epg_programs_table(manager).await?;
        self.create_live_streams_table(manager).await?;
        self.create_vod_streams_table(manager).await?;
        self.create_series_items_table(manager).await?;
        self.create_seasons_table(manager).await?;
        self.create_episodes_table(manager).await?;
        self.create_tmdb_config_table(manager).await?;
        self.create_collections_table(manager).await?;
        self.create_collection_cache_table(manager).await?;

        self.create_indexes(manager).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order
        for table in [
            CollectionCache::Table.into_iden(),
            Collections::Table.into_iden(),
            TmdbConfig::Table.into_iden(),
            Episodes::Table.into_iden(),
            Seasons::Table.into_iden(),
            SeriesItems::Table.into_iden(),
            VodStreams::Table.into_iden(),
            LiveStreams::Table.into_iden(),
            EpgPrograms::Table.into_iden(),
            EpgChannels::Table.into_iden(),
            EpgSources::Table.into_iden(),
            Categories::Table.into_iden(),
            ProviderAutoSync::Table.into_iden(),
            ProviderUsers::Table.into_iden(),
            Providers::Table.into_iden(),
        ] {
            manager
                .drop_table(Table::drop().table(table).to_owned())
                .await?;
        }
        Ok(())
    }
}

impl Migration {
    // Helper functions for database-specific column types. SQLite stores
    // uuids and timestamps as text; PostgreSQL gets native types.
    fn id_column(&self, manager: &SchemaManager, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.uuid().not_null(),
            _ => col.string().not_null(),
        };
        col
    }

    fn uuid_fk_column(&self, manager: &SchemaManager, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.uuid().not_null(),
            _ => col.string().not_null(),
        };
        col
    }

    fn nullable_uuid_fk_column(&self, manager: &SchemaManager, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.uuid(),
            _ => col.string(),
        };
        col
    }

    fn timestamp_column(&self, manager: &SchemaManager, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.timestamp_with_time_zone().not_null(),
            _ => col.string().not_null(),
        };
        col
    }

    fn nullable_timestamp_column(&self, manager: &SchemaManager, column: impl IntoIden) -> ColumnDef {
        let mut col = ColumnDef::new(column);
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => col.timestamp_with_time_zone(),
            _ => col.string(),
        };
        col
    }

    async fn create_providers_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Providers::Table)
                    .if_not_exists()
                    .col(self.id_column(manager, Providers::Id).primary_key())
                    .col(ColumnDef::new(Providers::Name).string_len(120).not_null())
                    .col(ColumnDef::new(Providers::BaseUrl).string_len(500).not_null())
                    .col(ColumnDef::new(Providers::Username).string_len(120).not_null())
                    .col(ColumnDef::new(Providers::Password).string_len(200).not_null())
                    .col(
                        ColumnDef::new(Providers::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(self.timestamp_column(manager, Providers::CreatedAt))
                    .col(self.timestamp_column(manager, Providers::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_provider_users_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProviderUsers::Table)
                    .if_not_exists()
                    .col(self.id_column(manager, ProviderUsers::Id).primary_key())
                    .col(self.uuid_fk_column(manager, ProviderUsers::ProviderId))
                    .col(ColumnDef::new(ProviderUsers::Alias).string_len(120).not_null())
                    .col(ColumnDef::new(ProviderUsers::Username).string_len(120).not_null())
                    .col(ColumnDef::new(ProviderUsers::Password).string_len(200).not_null())
                    .col(
                        ColumnDef::new(ProviderUsers::UniqueCode)
                            .string_len(6)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProviderUsers::IsEnabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(ProviderUsers::MaxConnections).integer())
                    .col(self.timestamp_column(manager, ProviderUsers::CreatedAt))
                    .col(self.timestamp_column(manager, ProviderUsers::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_provider_auto_sync_table(
        &self,
        manager: &SchemaManager<'_>,
    ) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProviderAutoSync::Table)
                    .if_not_exists()
                    .col(self.id_column(manager, ProviderAutoSync::Id).primary_key())
                    .col(self.uuid_fk_column(manager, ProviderAutoSync::ProviderId))
                    .col(
                        ColumnDef::new(ProviderAutoSync::IntervalMinutes)
                            .integer()
                            .not_null()
                            .default(60),
                    )
                    .col(self.nullable_timestamp_column(manager, ProviderAutoSync::LastRunAt))
                    .col(self.timestamp_column(manager, ProviderAutoSync::CreatedAt))
                    .col(self.timestamp_column(manager, ProviderAutoSync::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_categories_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(self.id_column(manager, Categories::Id).primary_key())
                    .col(self.uuid_fk_column(manager, Categories::ProviderId))
                    .col(ColumnDef::new(Categories::Kind).string_len(20).not_null())
                    .col(
                        ColumnDef::new(Categories::ProviderCategoryId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Categories::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Categories::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(self.timestamp_column(manager, Categories::CreatedAt))
                    .col(self.timestamp_column(manager, Categories::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_epg_sources_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EpgSources::Table)
                    .if_not_exists()
                    .col(self.id_column(manager, EpgSources::Id).primary_key())
                    .col(ColumnDef::new(EpgSources::Name).string_len(120).not_null())
                    .col(ColumnDef::new(EpgSources::XmltvUrl).string_len(1200).not_null())
                    .col(
                        ColumnDef::new(EpgSources::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(self.timestamp_column(manager, EpgSources::CreatedAt))
                    .col(self.timestamp_column(manager, EpgSources::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_epg_channels_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EpgChannels::Table)
                    .if_not_exists()
                    .col(self.id_column(manager, EpgChannels::Id).primary_key())
                    .col(self.uuid_fk_column(manager, EpgChannels::EpgSourceId))
                    .col(ColumnDef::new(EpgChannels::XmltvId).string_len(200).not_null())
                    .col(
                        ColumnDef::new(EpgChannels::DisplayName)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(EpgChannels::IconUrl).string_len(800))
                    .col(self.timestamp_column(manager, EpgChannels::CreatedAt))
                    .col(self.timestamp_column(manager, EpgChannels::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_epg_programs_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EpgPrograms::Table)
                    .if_not_exists()
                    .col(self.id_column(manager, EpgPrograms::Id).primary_key())
                    .col(self.uuid_fk_column(manager, EpgPrograms::EpgSourceId))
                    .col(self.uuid_fk_column(manager, EpgPrograms::ChannelId))
                    .col(self.timestamp_column(manager, EpgPrograms::StartTime))
                    .col(self.timestamp_column(manager, EpgPrograms::EndTime))
                    .col(ColumnDef::new(EpgPrograms::Title).string_len(255).not_null())
                    .col(ColumnDef::new(EpgPrograms::Description).string_len(2000))
                    .col(ColumnDef::new(EpgPrograms::Category).string_len(120))
                    .col(self.timestamp_column(manager, EpgPrograms::CreatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_live_streams_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LiveStreams::Table)
                    .if_not_exists()
                    .col(self.id_column(manager, LiveStreams::Id).primary_key())
                    .col(self.uuid_fk_column(manager, LiveStreams::ProviderId))
                    .col(self.nullable_uuid_fk_column(manager, LiveStreams::CategoryId))
                    .col(
                        ColumnDef::new(LiveStreams::ProviderStreamId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LiveStreams::Name).string_len(255).not_null())
                    .col(ColumnDef::new(LiveStreams::NormalizedName).string_len(255))
                    .col(ColumnDef::new(LiveStreams::ChannelNumber).integer())
                    .col(ColumnDef::new(LiveStreams::CustomLogoUrl).string_len(800))
                    .col(ColumnDef::new(LiveStreams::StreamIcon).string_len(800))
                    .col(ColumnDef::new(LiveStreams::EpgChannelId).string_len(200))
                    .col(self.nullable_uuid_fk_column(manager, LiveStreams::EpgSourceId))
                    .col(ColumnDef::new(LiveStreams::EpgTimeOffsetMinutes).integer())
                    .col(
                        ColumnDef::new(LiveStreams::Approved)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(self.nullable_uuid_fk_column(manager, LiveStreams::Alt1StreamId))
                    .col(self.nullable_uuid_fk_column(manager, LiveStreams::Alt2StreamId))
                    .col(self.nullable_uuid_fk_column(manager, LiveStreams::Alt3StreamId))
                    .col(
                        ColumnDef::new(LiveStreams::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(self.timestamp_column(manager, LiveStreams::CreatedAt))
                    .col(self.timestamp_column(manager, LiveStreams::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_vod_streams_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(VodStreams::Table)
                    .if_not_exists()
                    .col(self.id_column(manager, VodStreams::Id).primary_key())
                    .col(self.uuid_fk_column(manager, VodStreams::ProviderId))
                    .col(self.nullable_uuid_fk_column(manager, VodStreams::CategoryId))
                    .col(
                        ColumnDef::new(VodStreams::ProviderStreamId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(VodStreams::Name).string_len(255).not_null())
                    .col(ColumnDef::new(VodStreams::NormalizedName).string_len(255))
                    .col(ColumnDef::new(VodStreams::StreamIcon).string_len(800))
                    .col(ColumnDef::new(VodStreams::CustomPosterUrl).string_len(800))
                    .col(ColumnDef::new(VodStreams::ContainerExtension).string_len(20))
                    .col(ColumnDef::new(VodStreams::Rating).string_len(50))
                    .col(ColumnDef::new(VodStreams::Added).string_len(50))
                    .col(
                        ColumnDef::new(VodStreams::Approved)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(VodStreams::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(VodStreams::TmdbId).integer())
                    .col(
                        ColumnDef::new(VodStreams::TmdbStatus)
                            .string_len(20)
                            .not_null()
                            .default("missing"),
                    )
                    .col(self.nullable_timestamp_column(manager, VodStreams::TmdbLastSync))
                    .col(ColumnDef::new(VodStreams::TmdbError).string_len(500))
                    .col(ColumnDef::new(VodStreams::TmdbErrorKind).string_len(20))
                    .col(
                        ColumnDef::new(VodStreams::TmdbFailCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(VodStreams::TmdbTitle).string_len(255))
                    .col(ColumnDef::new(VodStreams::TmdbOverview).string_len(4000))
                    .col(ColumnDef::new(VodStreams::TmdbReleaseDate).date())
                    .col(ColumnDef::new(VodStreams::TmdbGenres).json())
                    .col(ColumnDef::new(VodStreams::TmdbVoteAverage).double())
                    .col(ColumnDef::new(VodStreams::TmdbPosterPath).string_len(255))
                    .col(ColumnDef::new(VodStreams::TmdbBackdropPath).string_len(255))
                    .col(ColumnDef::new(VodStreams::TmdbRaw).json())
                    .col(self.timestamp_column(manager, VodStreams::CreatedAt))
                    .col(self.timestamp_column(manager, VodStreams::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_series_items_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SeriesItems::Table)
                    .if_not_exists()
                    .col(self.id_column(manager, SeriesItems::Id).primary_key())
                    .col(self.uuid_fk_column(manager, SeriesItems::ProviderId))
                    .col(self.nullable_uuid_fk_column(manager, SeriesItems::CategoryId))
                    .col(
                        ColumnDef::new(SeriesItems::ProviderSeriesId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SeriesItems::Name).string_len(255).not_null())
                    .col(ColumnDef::new(SeriesItems::NormalizedName).string_len(255))
                    .col(ColumnDef::new(SeriesItems::Cover).string_len(800))
                    .col(ColumnDef::new(SeriesItems::CustomCoverUrl).string_len(800))
                    .col(
                        ColumnDef::new(SeriesItems::Approved)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(SeriesItems::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(SeriesItems::TmdbId).integer())
                    .col(
                        ColumnDef::new(SeriesItems::TmdbStatus)
                            .string_len(20)
                            .not_null()
                            .default("missing"),
                    )
                    .col(self.nullable_timestamp_column(manager, SeriesItems::TmdbLastSync))
                    .col(ColumnDef::new(SeriesItems::TmdbError).string_len(500))
                    .col(ColumnDef::new(SeriesItems::TmdbErrorKind).string_len(20))
                    .col(
                        ColumnDef::new(SeriesItems::TmdbFailCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(SeriesItems::TmdbTitle).string_len(255))
                    .col(ColumnDef::new(SeriesItems::TmdbOverview).string_len(4000))
                    .col(ColumnDef::new(SeriesItems::TmdbReleaseDate).date())
                    .col(ColumnDef::new(SeriesItems::TmdbGenres).json())
                    .col(ColumnDef::new(SeriesItems::TmdbVoteAverage).double())
                    .col(ColumnDef::new(SeriesItems::TmdbPosterPath).string_len(255))
                    .col(ColumnDef::new(SeriesItems::TmdbBackdropPath).string_len(255))
                    .col(ColumnDef::new(SeriesItems::TmdbRaw).json())
                    .col(self.timestamp_column(manager, SeriesItems::CreatedAt))
                    .col(self.timestamp_column(manager, SeriesItems::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_seasons_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Seasons::Table)
                    .if_not_exists()
                    .col(self.id_column(manager, Seasons::Id).primary_key())
                    .col(self.uuid_fk_column(manager, Seasons::SeriesItemId))
                    .col(ColumnDef::new(Seasons::SeasonNumber).integer().not_null())
                    .col(ColumnDef::new(Seasons::Name).string_len(255))
                    .col(ColumnDef::new(Seasons::Overview).string_len(4000))
                    .col(ColumnDef::new(Seasons::AirDate).date())
                    .col(ColumnDef::new(Seasons::EpisodeCount).integer())
                    .col(ColumnDef::new(Seasons::Cover).string_len(800))
                    .col(ColumnDef::new(Seasons::Raw).json())
                    .col(self.timestamp_column(manager, Seasons::CreatedAt))
                    .col(self.timestamp_column(manager, Seasons::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_episodes_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Episodes::Table)
                    .if_not_exists()
                    .col(self.id_column(manager, Episodes::Id).primary_key())
                    .col(self.uuid_fk_column(manager, Episodes::SeasonId))
                    .col(self.uuid_fk_column(manager, Episodes::SeriesItemId))
                    .col(
                        ColumnDef::new(Episodes::ProviderEpisodeId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Episodes::EpisodeNumber).integer())
                    .col(ColumnDef::new(Episodes::Title).string_len(255))
                    .col(ColumnDef::new(Episodes::ContainerExtension).string_len(20))
                    .col(ColumnDef::new(Episodes::DurationSeconds).integer())
                    .col(ColumnDef::new(Episodes::Raw).json())
                    .col(self.timestamp_column(manager, Episodes::CreatedAt))
                    .col(self.timestamp_column(manager, Episodes::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_tmdb_config_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TmdbConfig::Table)
                    .if_not_exists()
                    .col(self.id_column(manager, TmdbConfig::Id).primary_key())
                    .col(
                        ColumnDef::new(TmdbConfig::IsEnabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(TmdbConfig::ApiKey).string_len(128))
                    .col(ColumnDef::new(TmdbConfig::ReadAccessToken).string_len(512))
                    .col(ColumnDef::new(TmdbConfig::Language).string_len(16))
                    .col(ColumnDef::new(TmdbConfig::Region).string_len(8))
                    .col(
                        ColumnDef::new(TmdbConfig::RequestsPerSecond)
                            .integer()
                            .not_null()
                            .default(5),
                    )
                    .col(self.timestamp_column(manager, TmdbConfig::CreatedAt))
                    .col(self.timestamp_column(manager, TmdbConfig::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_collections_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Collections::Table)
                    .if_not_exists()
                    .col(self.id_column(manager, Collections::Id).primary_key())
                    .col(ColumnDef::new(Collections::Name).string_len(255).not_null())
                    .col(ColumnDef::new(Collections::Slug).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Collections::SourceType)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Collections::SourceId).integer())
                    .col(ColumnDef::new(Collections::Filters).json())
                    .col(ColumnDef::new(Collections::CacheTtlSeconds).integer())
                    .col(
                        ColumnDef::new(Collections::Enabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Collections::OrderIndex)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(self.timestamp_column(manager, Collections::CreatedAt))
                    .col(self.timestamp_column(manager, Collections::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_collection_cache_table(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CollectionCache::Table)
                    .if_not_exists()
                    .col(self.id_column(manager, CollectionCache::Id).primary_key())
                    .col(self.uuid_fk_column(manager, CollectionCache::CollectionId))
                    .col(ColumnDef::new(CollectionCache::Page).integer().not_null())
                    .col(ColumnDef::new(CollectionCache::Payload).json().not_null())
                    .col(self.timestamp_column(manager, CollectionCache::ExpiresAt))
                    .col(self.timestamp_column(manager, CollectionCache::CreatedAt))
                    .col(self.timestamp_column(manager, CollectionCache::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn create_indexes(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("uq_provider_users_unique_code")
                    .table(ProviderUsers::Table)
                    .col(ProviderUsers::UniqueCode)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("ix_provider_users_provider_alias")
                    .table(ProviderUsers::Table)
                    .col(ProviderUsers::ProviderId)
                    .col(ProviderUsers::Alias)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uq_provider_auto_sync_provider")
                    .table(ProviderAutoSync::Table)
                    .col(ProviderAutoSync::ProviderId)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uq_categories_provider_kind_extid")
                    .table(Categories::Table)
                    .col(Categories::ProviderId)
                    .col(Categories::Kind)
                    .col(Categories::ProviderCategoryId)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uq_live_streams_provider_streamid")
                    .table(LiveStreams::Table)
                    .col(LiveStreams::ProviderId)
                    .col(LiveStreams::ProviderStreamId)
                    .unique()
                    .to_owned(),
            )
            .await?;
        // Not unique: duplicate vod rows introduced by historical races are
        // collapsed by the sync dedup pass, which needs to see them first.
        manager
            .create_index(
                Index::create()
                    .name("ix_vod_streams_provider_streamid")
                    .table(VodStreams::Table)
                    .col(VodStreams::ProviderId)
                    .col(VodStreams::ProviderStreamId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("ix_vod_streams_provider_tmdb")
                    .table(VodStreams::Table)
                    .col(VodStreams::ProviderId)
                    .col(VodStreams::TmdbId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uq_series_items_provider_seriesid")
                    .table(SeriesItems::Table)
                    .col(SeriesItems::ProviderId)
                    .col(SeriesItems::ProviderSeriesId)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("ix_series_items_provider_tmdb")
                    .table(SeriesItems::Table)
                    .col(SeriesItems::ProviderId)
                    .col(SeriesItems::TmdbId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uq_seasons_series_number")
                    .table(Seasons::Table)
                    .col(Seasons::SeriesItemId)
                    .col(Seasons::SeasonNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uq_episodes_season_extid")
                    .table(Episodes::Table)
                    .col(Episodes::SeasonId)
                    .col(Episodes::ProviderEpisodeId)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uq_epg_channels_source_xmltvid")
                    .table(EpgChannels::Table)
                    .col(EpgChannels::EpgSourceId)
                    .col(EpgChannels::XmltvId)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uq_epg_programs_channel_start")
                    .table(EpgPrograms::Table)
                    .col(EpgPrograms::ChannelId)
                    .col(EpgPrograms::StartTime)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("ix_epg_programs_source")
                    .table(EpgPrograms::Table)
                    .col(EpgPrograms::EpgSourceId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uq_collections_slug")
                    .table(Collections::Table)
                    .col(Collections::Slug)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("uq_collection_cache_collection_page")
                    .table(CollectionCache::Table)
                    .col(CollectionCache::CollectionId)
                    .col(CollectionCache::Page)
                    .unique()
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("ix_collection_cache_expires_at")
                    .table(CollectionCache::Table)
                    .col(CollectionCache::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Providers {
    Table,
    Id,
    Name,
    BaseUrl,
    Username,
    Password,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ProviderUsers {
    Table,
    Id,
    ProviderId,
    Alias,
    Username,
    Password,
    UniqueCode,
    IsEnabled,
    MaxConnections,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ProviderAutoSync {
    Table,
    Id,
    ProviderId,
    IntervalMinutes,
    LastRunAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Categories {
    Table,
    Id,
    ProviderId,
    Kind,
    ProviderCategoryId,
    Name,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum LiveStreams {
    Table,
    Id,
    ProviderId,
    CategoryId,
    ProviderStreamId,
    Name,
    NormalizedName,
    ChannelNumber,
    CustomLogoUrl,
    StreamIcon,
    EpgChannelId,
    EpgSourceId,
    EpgTimeOffsetMinutes,
    Approved,
    Alt1StreamId,
    Alt2StreamId,
    Alt3StreamId,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum VodStreams {
    Table,
    Id,
    ProviderId,
    CategoryId,
    ProviderStreamId,
    Name,
    NormalizedName,
    StreamIcon,
    CustomPosterUrl,
    ContainerExtension,
    Rating,
    Added,
    Approved,
    IsActive,
    TmdbId,
    TmdbStatus,
    TmdbLastSync,
    TmdbError,
    TmdbErrorKind,
    TmdbFailCount,
    TmdbTitle,
    TmdbOverview,
    TmdbReleaseDate,
    TmdbGenres,
    TmdbVoteAverage,
    TmdbPosterPath,
    TmdbBackdropPath,
    TmdbRaw,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum SeriesItems {
    Table,
    Id,
    ProviderId,
    CategoryId,
    ProviderSeriesId,
    Name,
    NormalizedName,
    Cover,
    CustomCoverUrl,
    Approved,
    IsActive,
    TmdbId,
    TmdbStatus,
    TmdbLastSync,
    TmdbError,
    TmdbErrorKind,
    TmdbFailCount,
    TmdbTitle,
    TmdbOverview,
    TmdbReleaseDate,
    TmdbGenres,
    TmdbVoteAverage,
    TmdbPosterPath,
    TmdbBackdropPath,
    TmdbRaw,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Seasons {
    Table,
    Id,
    SeriesItemId,
    SeasonNumber,
    Name,
    Overview,
    AirDate,
    EpisodeCount,
    Cover,
    Raw,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Episodes {
    Table,
    Id,
    SeasonId,
    SeriesItemId,
    ProviderEpisodeId,
    EpisodeNumber,
    Title,
    ContainerExtension,
    DurationSeconds,
    Raw,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum EpgSources {
    Table,
    Id,
    Name,
    XmltvUrl,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum EpgChannels {
    Table,
    Id,
    EpgSourceId,
    XmltvId,
    DisplayName,
    IconUrl,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum EpgPrograms {
    Table,
    Id,
    EpgSourceId,
    ChannelId,
    StartTime,
    EndTime,
    Title,
    Description,
    Category,
    CreatedAt,
}

#[derive(DeriveIden)]
enum TmdbConfig {
    Table,
    Id,
    IsEnabled,
    ApiKey,
    ReadAccessToken,
    Language,
    Region,
    RequestsPerSecond,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Collections {
    Table,
    Id,
    Name,
    Slug,
    SourceType,
    SourceId,
    Filters,
    CacheTtlSeconds,
    Enabled,
    OrderIndex,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CollectionCache {
    Table,
    Id,
    CollectionId,
    Page,
    Payload,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}
