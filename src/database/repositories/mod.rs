//! SeaORM repositories, one per aggregate
//!
//! Repositories own storage-level semantics (upsert keys, soft-delete
//! toggles, duplicate collapse); the sync engines own orchestration.

pub mod auto_sync;
pub mod category;
pub mod collection;
pub mod epg;
pub mod live_stream;
pub mod provider;
pub mod provider_user;
pub mod series_item;
pub mod tmdb_config;
pub mod vod_stream;

pub use auto_sync::AutoSyncRepository;
pub use category::CategoryRepository;
pub use collection::CollectionRepository;
pub use epg::EpgRepository;
pub use live_stream::LiveStreamRepository;
pub use provider::ProviderRepository;
pub use provider_user::ProviderUserRepository;
pub use series_item::SeriesItemRepository;
pub use tmdb_config::TmdbConfigRepository;
pub use vod_stream::VodStreamRepository;
