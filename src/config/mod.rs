//! Application configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then the
//! environment variables the deployment recognizes. The enrichment
//! pipeline's own knobs (`TMDB_SYNC_WORKERS`, `TMDB_RPS`, cooldowns) are
//! read at run time by its settings type.

use anyhow::Result;
use figment::providers::{Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub epg: EpgLoopConfig,
    #[serde(default)]
    pub tmdb: TmdbLoopConfig,
    #[serde(default)]
    pub collections: CollectionLoopConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            epg: EpgLoopConfig::default(),
            tmdb: TmdbLoopConfig::default(),
            collections: CollectionLoopConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/catalogd.db".to_string(),
            max_connections: None,
        }
    }
}

/// EPG auto-sync loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpgLoopConfig {
    pub enabled: bool,
    pub interval_minutes: u64,
    /// Forward window size in hours, clamped to 1..=168 at use.
    pub window_hours: i64,
    pub enrich_missing_desc: bool,
    pub enrich_max_desc_len: usize,
}

impl Default for EpgLoopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: 30,
            window_hours: 36,
            enrich_missing_desc: true,
            enrich_max_desc_len: 1900,
        }
    }
}

/// Metadata auto-sync loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbLoopConfig {
    pub enabled: bool,
    pub interval_minutes: u64,
    pub batch_movies: usize,
    pub batch_series: usize,
    pub cooldown_override_minutes: Option<i64>,
    /// Sleep when disabled or when a tick found no work.
    pub idle_minutes: u64,
}

impl Default for TmdbLoopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: 5,
            batch_movies: 5,
            batch_series: 5,
            cooldown_override_minutes: Some(60),
            idle_minutes: 30,
        }
    }
}

/// Collection cache sweep loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionLoopConfig {
    pub enabled: bool,
    pub sweep_minutes: u64,
}

impl Default for CollectionLoopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_minutes: 5,
        }
    }
}

impl Config {
    /// Load configuration: defaults, the TOML file when present, then the
    /// recognized environment variables.
    pub fn load_from_file(path: &str) -> Result<Self> {
        let mut config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(url) = env_str("DATABASE_URL") {
            self.database.url = url;
        }

        if let Some(enabled) = env_bool("EPG_AUTO_SYNC") {
            self.epg.enabled = enabled;
        }
        if let Some(minutes) = env_u64("EPG_AUTO_SYNC_MINUTES") {
            self.epg.interval_minutes = minutes;
        }
        if let Some(hours) = env_i64("EPG_AUTO_SYNC_HOURS") {
            self.epg.window_hours = hours;
        }
        if let Some(enabled) = env_bool("EPG_ENRICH_MISSING_DESC") {
            self.epg.enrich_missing_desc = enabled;
        }
        if let Some(len) = env_u64("EPG_ENRICH_MAX_DESC_LEN") {
            self.epg.enrich_max_desc_len = len as usize;
        }

        if let Some(enabled) = env_bool("TMDB_AUTO_SYNC") {
            self.tmdb.enabled = enabled;
        }
        if let Some(minutes) = env_u64("TMDB_AUTO_SYNC_MINUTES") {
            self.tmdb.interval_minutes = minutes;
        }
        if let Some(batch) = env_u64("TMDB_AUTO_SYNC_BATCH_MOVIES") {
            self.tmdb.batch_movies = batch as usize;
        }
        if let Some(batch) = env_u64("TMDB_AUTO_SYNC_BATCH_SERIES") {
            self.tmdb.batch_series = batch as usize;
        }
        if let Some(minutes) = env_i64("TMDB_AUTO_SYNC_COOLDOWN_MINUTES") {
            self.tmdb.cooldown_override_minutes = (minutes > 0).then_some(minutes);
        }
        if let Some(minutes) = env_u64("TMDB_AUTO_SYNC_IDLE_MINUTES") {
            self.tmdb.idle_minutes = minutes;
        }
    }
}

fn env_str(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|raw| !raw.trim().is_empty())
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|raw| {
        !matches!(
            raw.trim().to_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        )
    })
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|raw| raw.trim().parse().ok())
}

fn env_i64(key: &str) -> Option<i64> {
    env_str(key).and_then(|raw| raw.trim().parse().ok())
}
