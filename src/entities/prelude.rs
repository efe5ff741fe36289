pub use super::categories::Entity as Categories;
pub use super::collection_cache::Entity as CollectionCache;
pub use super::collections::Entity as Collections;
pub use super::episodes::Entity as Episodes;
pub use super::epg_channels::Entity as EpgChannels;
pub use super::epg_programs::Entity as EpgPrograms;
pub use super::epg_sources::Entity as EpgSources;
pub use super::live_streams::Entity as LiveStreams;
pub use super::provider_auto_sync::Entity as ProviderAutoSync;
pub use super::provider_users::Entity as ProviderUsers;
pub use super::providers::Entity as Providers;
pub use super::seasons::Entity as Seasons;
pub use super::series_items::Entity as SeriesItems;
pub use super::tmdb_config::Entity as TmdbConfig;
pub use super::vod_streams::Entity as VodStreams;
