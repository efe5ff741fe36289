//! Supervisor
//!
//! Starts one long-running loop per background concern (catalog sync, EPG
//! ingest, metadata enrichment, collection cache sweep). Loops share only
//! the database handle and the rate limiters, check the shutdown token
//! between iterations, and never let a failure escape: errors are logged
//! and followed by the next sleep so the process cannot spin.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::database::Database;
use crate::database::repositories::TmdbConfigRepository;
use crate::ingestor::catalog::CatalogSynchronizer;
use crate::ingestor::collections::CollectionCacheEngine;
use crate::ingestor::epg::{EpgIngestor, EpgSyncOptions};
use crate::ingestor::tmdb_sync::EnrichmentPipeline;
use crate::models::ContentKind;

/// Catalog schedules are minute-granular; a short tick picks up due
/// providers promptly without hammering the store.
const CATALOG_TICK: Duration = Duration::from_secs(60);
const MIN_LOOP_INTERVAL: Duration = Duration::from_secs(60);

pub struct Supervisor {
    config: Config,
    catalog: Arc<CatalogSynchronizer>,
    epg: Arc<EpgIngestor>,
    enrichment: Arc<EnrichmentPipeline>,
    collections: Arc<CollectionCacheEngine>,
    tmdb_config: TmdbConfigRepository,
    shutdown: CancellationToken,
}

impl Supervisor {
    pub fn new(config: Config, database: &Database, shutdown: CancellationToken) -> Self {
        Self {
            config,
            catalog: Arc::new(CatalogSynchronizer::new(database)),
            epg: Arc::new(EpgIngestor::new(database)),
            enrichment: Arc::new(EnrichmentPipeline::new(database)),
            collections: Arc::new(CollectionCacheEngine::new(database)),
            tmdb_config: TmdbConfigRepository::new(database.connection()),
            shutdown: shutdown.clone(),
        }
    }

    pub fn catalog(&self) -> Arc<CatalogSynchronizer> {
        self.catalog.clone()
    }

    pub fn epg(&self) -> Arc<EpgIngestor> {
        self.epg.clone()
    }

    pub fn enrichment(&self) -> Arc<EnrichmentPipeline> {
        self.enrichment.clone()
    }

    pub fn collections(&self) -> Arc<CollectionCacheEngine> {
        self.collections.clone()
    }

    /// Start every loop. Handles resolve when the shutdown token fires.
    pub fn spawn_all(&self) -> Vec<JoinHandle<()>> {
        vec![
            self.spawn_catalog_loop(),
            self.spawn_epg_loop(),
            self.spawn_tmdb_loop(),
            self.spawn_collection_loop(),
        ]
    }

    fn spawn_catalog_loop(&self) -> JoinHandle<()> {
        let catalog = self.catalog.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            info!("catalog auto-sync loop started (tick {:?})", CATALOG_TICK);
            loop {
                if sleep_or_shutdown(&shutdown, CATALOG_TICK).await {
                    break;
                }
                if let Err(err) = catalog.auto_sync_tick().await {
                    error!(%err, "catalog auto-sync tick failed");
                }
            }
            info!("catalog auto-sync loop stopped");
        })
    }

    fn spawn_epg_loop(&self) -> JoinHandle<()> {
        let epg = self.epg.clone();
        let config = self.config.epg.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            if !config.enabled {
                info!("EPG auto-sync disabled");
                return;
            }
            let interval =
                Duration::from_secs(config.interval_minutes.saturating_mul(60)).max(MIN_LOOP_INTERVAL);
            info!(
                "EPG auto-sync loop started (every {} min, window {} h)",
                config.interval_minutes, config.window_hours
            );
            let options = EpgSyncOptions {
                hours: config.window_hours,
                enrich_missing_desc: config.enrich_missing_desc,
                max_desc_len: config.enrich_max_desc_len,
                ..EpgSyncOptions::default()
            };
            loop {
                if sleep_or_shutdown(&shutdown, interval).await {
                    break;
                }
                if let Err(err) = epg.sync_all_active(&options).await {
                    error!(%err, "EPG auto-sync pass failed");
                }
            }
            info!("EPG auto-sync loop stopped");
        })
    }

    fn spawn_tmdb_loop(&self) -> JoinHandle<()> {
        let enrichment = self.enrichment.clone();
        let tmdb_config = self.tmdb_config.clone();
        let config = self.config.tmdb.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            if !config.enabled {
                info!("metadata auto-sync disabled");
                return;
            }
            let interval =
                Duration::from_secs(config.interval_minutes.saturating_mul(60)).max(MIN_LOOP_INTERVAL);
            let idle = Duration::from_secs(config.idle_minutes.saturating_mul(60)).max(interval);
            info!(
                "metadata auto-sync loop started (every {} min, batches {}/{})",
                config.interval_minutes, config.batch_movies, config.batch_series
            );
            loop {
                let usable = match tmdb_config.get_or_create().await {
                    Ok(stored) => TmdbConfigRepository::is_usable(&stored),
                    Err(err) => {
                        error!(%err, "failed to read metadata configuration");
                        false
                    }
                };
                if !usable {
                    if sleep_or_shutdown(&shutdown, idle).await {
                        break;
                    }
                    continue;
                }

                let mut processed = 0;
                match enrichment
                    .run(
                        ContentKind::Movie,
                        config.batch_movies,
                        config.cooldown_override_minutes,
                    )
                    .await
                {
                    Ok(report) => processed += report.processed,
                    Err(err) => error!(%err, "movie enrichment batch failed"),
                }
                match enrichment
                    .run(
                        ContentKind::Series,
                        config.batch_series,
                        config.cooldown_override_minutes,
                    )
                    .await
                {
                    Ok(report) => processed += report.processed,
                    Err(err) => error!(%err, "series enrichment batch failed"),
                }

                // No work means the backlog is drained; back off.
                let sleep_for = if processed == 0 { idle } else { interval };
                if sleep_or_shutdown(&shutdown, sleep_for).await {
                    break;
                }
            }
            info!("metadata auto-sync loop stopped");
        })
    }

    fn spawn_collection_loop(&self) -> JoinHandle<()> {
        let collections = self.collections.clone();
        let config = self.config.collections.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            if !config.enabled {
                info!("collection cache sweep disabled");
                return;
            }
            let interval =
                Duration::from_secs(config.sweep_minutes.saturating_mul(60)).max(MIN_LOOP_INTERVAL);
            info!("collection cache sweep loop started (every {} min)", config.sweep_minutes);
            loop {
                if sleep_or_shutdown(&shutdown, interval).await {
                    break;
                }
                if let Err(err) = collections.refresh_expired().await {
                    error!(%err, "collection cache sweep failed");
                }
            }
            info!("collection cache sweep loop stopped");
        })
    }
}

/// Sleep for `duration`, returning true when shutdown fired instead.
async fn sleep_or_shutdown(shutdown: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}
