//! Catalog synchronizer
//!
//! Pulls categories and streams from each provider and converges the local
//! view: upsert what the provider lists, soft-deactivate what it no longer
//! does. Categories always refresh before streams. Per-category fetch
//! failures are recorded in the run report and do not abort the provider;
//! a failure to list categories does.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::Database;
use crate::database::repositories::{
    AutoSyncRepository, CategoryRepository, LiveStreamRepository, ProviderRepository,
    ProviderUserRepository, SeriesItemRepository, VodStreamRepository,
};
use crate::entities::{categories, providers, series_items};
use crate::models::{
    CategoryKind, CategorySyncDetail, LiveChannelUpsert, ProviderSyncReport, SeriesUpsert,
    StreamSyncReport, VodUpsert,
};
use crate::sources::XtreamClient;
use crate::utils::http::{Fetcher, FetcherConfig};
use crate::utils::rate_limit::SlotPacer;

/// Politeness toward provider panels; they throttle hard and ban easily.
const PROVIDER_RPS: u32 = 2;

/// Options for a VOD/series sync pass.
#[derive(Debug, Clone, Copy)]
pub struct StreamSyncOptions {
    pub include_inactive_categories: bool,
    /// Deactivate rows absent from the listing. Off by default: providers
    /// frequently return partial pages.
    pub deactivate_missing: bool,
}

impl Default for StreamSyncOptions {
    fn default() -> Self {
        Self {
            include_inactive_categories: false,
            deactivate_missing: false,
        }
    }
}

pub struct CatalogSynchronizer {
    providers: ProviderRepository,
    provider_users: ProviderUserRepository,
    auto_sync: AutoSyncRepository,
    categories: CategoryRepository,
    live: LiveStreamRepository,
    vod: VodStreamRepository,
    series: SeriesItemRepository,
    fetcher: Fetcher,
    pacers: Mutex<HashMap<Uuid, Arc<SlotPacer>>>,
}

impl CatalogSynchronizer {
    pub fn new(database: &Database) -> Self {
        let connection = database.connection();
        Self {
            providers: ProviderRepository::new(connection.clone()),
            provider_users: ProviderUserRepository::new(connection.clone()),
            auto_sync: AutoSyncRepository::new(connection.clone()),
            categories: CategoryRepository::new(connection.clone()),
            live: LiveStreamRepository::new(connection.clone()),
            vod: VodStreamRepository::new(connection.clone()),
            series: SeriesItemRepository::new(connection),
            fetcher: Fetcher::new(FetcherConfig::default()),
            pacers: Mutex::new(HashMap::new()),
        }
    }

    fn pacer_for(&self, provider_id: &Uuid) -> Arc<SlotPacer> {
        let mut pacers = self.pacers.lock().expect("pacer map lock poisoned");
        pacers
            .entry(*provider_id)
            .or_insert_with(|| Arc::new(SlotPacer::new(PROVIDER_RPS)))
            .clone()
    }

    async fn client_for(&self, provider: &providers::Model) -> Result<XtreamClient<'_>> {
        let (username, password) = self.provider_users.sync_credentials(provider).await?;
        Ok(XtreamClient::new(
            &self.fetcher,
            &provider.base_url,
            &username,
            &password,
        ))
    }

    /// Refresh all three category kinds for a provider. A failure to list
    /// any kind aborts the provider for this run.
    pub async fn sync_categories(&self, provider: &providers::Model) -> Result<usize> {
        let client = self.client_for(provider).await?;
        let pacer = self.pacer_for(&provider.id);

        let mut changed = 0;
        for kind in [CategoryKind::Live, CategoryKind::Vod, CategoryKind::Series] {
            pacer.wait().await;
            let listing = client.get_categories(kind).await?;
            changed += self.apply_category_set(&provider.id, kind, &listing).await?;
        }
        Ok(changed)
    }

    /// Converge one kind's category set on an upstream listing.
    pub async fn apply_category_set(
        &self,
        provider_id: &Uuid,
        kind: CategoryKind,
        listing: &[(i32, String)],
    ) -> Result<usize> {
        let mut changed = 0;
        let mut seen = Vec::with_capacity(listing.len());
        for (ext_id, name) in listing {
            if self.categories.upsert_active(provider_id, kind, *ext_id, name).await? {
                changed += 1;
            }
            seen.push(*ext_id);
        }
        changed += self.categories.deactivate_absent(provider_id, kind, &seen).await?;
        Ok(changed)
    }

    /// Sync live channels, one category at a time. Channels missing from a
    /// category listing are deactivated within that category.
    pub async fn sync_live(
        &self,
        provider: &providers::Model,
        options: StreamSyncOptions,
    ) -> Result<StreamSyncReport> {
        let client = self.client_for(provider).await?;
        let pacer = self.pacer_for(&provider.id);
        let mut report = StreamSyncReport::started(true);

        let cats = self
            .categories
            .list(&provider.id, CategoryKind::Live, options.include_inactive_categories)
            .await?;
        report.categories = cats.len();

        for cat in cats {
            pacer.wait().await;
            let listing = match client.get_live_streams(cat.provider_category_id).await {
                Ok(listing) => listing,
                Err(error) => {
                    report.details.push(CategorySyncDetail::failed(
                        cat.provider_category_id,
                        &cat.name,
                        error.to_string(),
                    ));
                    continue;
                }
            };

            let changed = self.apply_live_rows(&provider.id, &cat, &listing).await?;
            report.total_streams += listing.len();
            report.changed += changed;
            report.details.push(CategorySyncDetail::ok(
                cat.provider_category_id,
                &cat.name,
                listing.len(),
                changed,
            ));
        }

        report.finish();
        Ok(report)
    }

    pub async fn apply_live_rows(
        &self,
        provider_id: &Uuid,
        category: &categories::Model,
        listing: &[LiveChannelUpsert],
    ) -> Result<usize> {
        let mut changed = 0;
        let mut seen = Vec::with_capacity(listing.len());
        for row in listing {
            if self.live.upsert_from_catalog(provider_id, &category.id, row).await? {
                changed += 1;
            }
            seen.push(row.ext_id);
        }
        changed += self
            .live
            .deactivate_absent_in_category(provider_id, &category.id, &seen)
            .await?;
        Ok(changed)
    }

    /// Sync VOD streams. Absent rows stay active unless
    /// `deactivate_missing` is set; each category batch ends with a
    /// duplicate collapse.
    pub async fn sync_vod(
        &self,
        provider: &providers::Model,
        options: StreamSyncOptions,
    ) -> Result<StreamSyncReport> {
        let client = self.client_for(provider).await?;
        let pacer = self.pacer_for(&provider.id);
        let mut report = StreamSyncReport::started(options.deactivate_missing);

        // Category names drift; refresh the set first but tolerate failure.
        pacer.wait().await;
        match client.get_categories(CategoryKind::Vod).await {
            Ok(listing) => {
                self.apply_category_set(&provider.id, CategoryKind::Vod, &listing)
                    .await?;
            }
            Err(error) => {
                warn!(provider = %provider.name, %error, "vod category refresh failed");
            }
        }

        let cats = self
            .categories
            .list(&provider.id, CategoryKind::Vod, options.include_inactive_categories)
            .await?;
        report.categories = cats.len();

        for cat in cats {
            pacer.wait().await;
            let listing = match client.get_vod_streams(cat.provider_category_id).await {
                Ok(listing) => listing,
                Err(error) => {
                    report.details.push(CategorySyncDetail::failed(
                        cat.provider_category_id,
                        &cat.name,
                        error.to_string(),
                    ));
                    continue;
                }
            };

            let changed = self
                .apply_vod_rows(&provider.id, &cat, &listing, options.deactivate_missing)
                .await?;
            report.total_streams += listing.len();
            report.changed += changed;
            report.details.push(CategorySyncDetail::ok(
                cat.provider_category_id,
                &cat.name,
                listing.len(),
                changed,
            ));
        }

        report.finish();
        Ok(report)
    }

    pub async fn apply_vod_rows(
        &self,
        provider_id: &Uuid,
        category: &categories::Model,
        listing: &[VodUpsert],
        deactivate_missing: bool,
    ) -> Result<usize> {
        let mut changed = 0;
        let mut seen = Vec::with_capacity(listing.len());
        for row in listing {
            if self.vod.upsert_from_catalog(provider_id, &category.id, row).await? {
                changed += 1;
            }
            seen.push(row.ext_id);
        }
        if deactivate_missing {
            changed += self
                .vod
                .deactivate_absent_in_category(provider_id, &category.id, &seen)
                .await?;
        }
        changed += self.vod.collapse_duplicates_by_ext(provider_id, &seen).await?;
        Ok(changed)
    }

    pub async fn sync_series(
        &self,
        provider: &providers::Model,
        options: StreamSyncOptions,
    ) -> Result<StreamSyncReport> {
        let client = self.client_for(provider).await?;
        let pacer = self.pacer_for(&provider.id);
        let mut report = StreamSyncReport::started(false);

        pacer.wait().await;
        match client.get_categories(CategoryKind::Series).await {
            Ok(listing) => {
                self.apply_category_set(&provider.id, CategoryKind::Series, &listing)
                    .await?;
            }
            Err(error) => {
                warn!(provider = %provider.name, %error, "series category refresh failed");
            }
        }

        let cats = self
            .categories
            .list(&provider.id, CategoryKind::Series, options.include_inactive_categories)
            .await?;
        report.categories = cats.len();

        for cat in cats {
            pacer.wait().await;
            let listing = match client.get_series(cat.provider_category_id).await {
                Ok(listing) => listing,
                Err(error) => {
                    report.details.push(CategorySyncDetail::failed(
                        cat.provider_category_id,
                        &cat.name,
                        error.to_string(),
                    ));
                    continue;
                }
            };

            let changed = self.apply_series_rows(&provider.id, &cat, &listing).await?;
            report.total_streams += listing.len();
            report.changed += changed;
            report.details.push(CategorySyncDetail::ok(
                cat.provider_category_id,
                &cat.name,
                listing.len(),
                changed,
            ));
        }

        report.finish();
        Ok(report)
    }

    pub async fn apply_series_rows(
        &self,
        provider_id: &Uuid,
        category: &categories::Model,
        listing: &[SeriesUpsert],
    ) -> Result<usize> {
        let mut changed = 0;
        let mut seen = Vec::with_capacity(listing.len());
        for row in listing {
            if self.series.upsert_from_catalog(provider_id, &category.id, row).await? {
                changed += 1;
            }
            seen.push(row.ext_id);
        }
        changed += self
            .series
            .deactivate_absent_in_category(provider_id, &category.id, &seen)
            .await?;
        Ok(changed)
    }

    /// Fetch one series' seasons and episodes and upsert them.
    pub async fn sync_series_detail(
        &self,
        provider: &providers::Model,
        series_item: &series_items::Model,
    ) -> Result<(usize, usize)> {
        let client = self.client_for(provider).await?;
        self.pacer_for(&provider.id).wait().await;
        let (seasons, episodes) = client
            .get_series_info(series_item.provider_series_id)
            .await?;
        self.series
            .upsert_series_detail(&series_item.id, &seasons, &episodes)
            .await
    }

    /// Full provider refresh: categories first, then all three kinds.
    pub async fn sync_all(&self, provider: &providers::Model) -> Result<ProviderSyncReport> {
        let categories_changed = self.sync_categories(provider).await?;
        let options = StreamSyncOptions::default();
        let live = self.sync_live(provider, options).await?;
        let vod = self.sync_vod(provider, options).await?;
        let series = self.sync_series(provider, options).await?;
        Ok(ProviderSyncReport {
            provider_id: provider.id,
            categories_changed,
            live,
            vod,
            series,
        })
    }

    /// One supervisor tick: run every provider whose schedule is due.
    /// Failures are isolated per provider, and `last_run_at` advances
    /// regardless so a broken provider cannot hot-loop.
    pub async fn auto_sync_tick(&self) -> Result<usize> {
        let now = Utc::now();
        let providers = self.providers.list_active().await?;
        let mut ran = 0;

        for provider in providers {
            let config = self.auto_sync.get_or_create(&provider.id).await?;
            if !AutoSyncRepository::is_due(&config, now) {
                continue;
            }
            ran += 1;
            match self.sync_all(&provider).await {
                Ok(report) => {
                    info!(
                        provider = %provider.name,
                        live = report.live.total_streams,
                        vod = report.vod.total_streams,
                        series = report.series.total_streams,
                        "provider auto-sync complete"
                    );
                }
                Err(error) => {
                    warn!(provider = %provider.name, %error, "provider auto-sync failed");
                }
            }
            self.auto_sync.mark_ran(&provider.id, now).await?;
        }

        Ok(ran)
    }
}
