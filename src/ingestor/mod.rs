//! Sync engines and the supervisor that drives them

pub mod catalog;
pub mod collections;
pub mod epg;
pub mod scheduler;
pub mod tmdb_sync;

pub use catalog::CatalogSynchronizer;
pub use collections::CollectionCacheEngine;
pub use epg::EpgIngestor;
pub use scheduler::Supervisor;
pub use tmdb_sync::EnrichmentPipeline;
