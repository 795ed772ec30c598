use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::data::loader::LoadError;
use crate::data::view::DEFAULT_PAGE_SIZE;

pub const CONFIG_PATH_VAR: &str = "STREAMER_DASHBOARD_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "dashboard.toml";

const DEFAULT_TTL_SECS: u64 = 300;
const DEFAULT_TIMEOUT_SECS: u64 = 5;

// ---------------------------------------------------------------------------
// Connection parameters
// ---------------------------------------------------------------------------

/// `[mongodb]` table as written by the operator; any key may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MongoSettings {
    pub uri: Option<String>,
    pub database: Option<String>,
    pub collection: Option<String>,
}

/// Fully resolved connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoTarget {
    pub uri: String,
    pub database: String,
    pub collection: String,
}

impl MongoSettings {
    /// Every key must be present and non-empty.
    pub fn resolve(&self) -> Result<MongoTarget, LoadError> {
        fn required(value: &Option<String>, key: &str) -> Result<String, LoadError> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| LoadError::Configuration(format!("missing `mongodb.{key}`")))
        }
        Ok(MongoTarget {
            uri: required(&self.uri, "uri")?,
            database: required(&self.database, "database")?,
            collection: required(&self.collection, "collection")?,
        })
    }
}

/// Where the dashboard reads its records from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Mongo(MongoSettings),
    Snapshot(PathBuf),
}

// ---------------------------------------------------------------------------
// Dashboard configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    pub mongodb: MongoSettings,
    /// When set, read this file instead of the collection.
    pub snapshot: Option<PathBuf>,
    pub cache_ttl: Duration,
    pub connect_timeout: Duration,
    pub page_size: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            mongodb: MongoSettings::default(),
            snapshot: None,
            cache_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl DashboardConfig {
    /// Load configuration from a TOML file (path via STREAMER_DASHBOARD_CONFIG or
    /// ./dashboard.toml), then apply environment overrides.
    pub fn load() -> Self {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let p = Path::new(&path);
        let mut config = if p.exists() {
            match Self::from_path(p) {
                Ok(c) => {
                    log::info!("Loaded configuration from {path}");
                    c
                }
                Err(e) => {
                    log::warn!("Failed to load {path}: {e:#}; using defaults");
                    Self::default()
                }
            }
        } else {
            log::info!("No config file at {path}; using defaults and environment");
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let parsed: DashboardToml = toml::from_str(text).context("parsing TOML")?;
        Ok(parsed.overlay(Self::default()))
    }

    /// Override from `MONGODB_URI`, `MONGODB_DATABASE`, `MONGODB_COLLECTION`
    /// and `STREAMER_DASHBOARD_SNAPSHOT`; empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(v) = get("MONGODB_URI") {
            self.mongodb.uri = Some(v);
        }
        if let Some(v) = get("MONGODB_DATABASE") {
            self.mongodb.database = Some(v);
        }
        if let Some(v) = get("MONGODB_COLLECTION") {
            self.mongodb.collection = Some(v);
        }
        if let Some(v) = get("STREAMER_DASHBOARD_SNAPSHOT") {
            self.snapshot = Some(PathBuf::from(v));
        }
    }

    pub fn source(&self) -> DataSource {
        match &self.snapshot {
            Some(path) => DataSource::Snapshot(path.clone()),
            None => DataSource::Mongo(self.mongodb.clone()),
        }
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, Deserialize)]
struct DashboardToml {
    cache_ttl_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
    page_size: Option<usize>,
    snapshot: Option<PathBuf>,
    mongodb: Option<MongoSettings>,
}

impl DashboardToml {
    fn overlay(self, mut base: DashboardConfig) -> DashboardConfig {
        if let Some(secs) = self.cache_ttl_secs.filter(|s| *s > 0) {
            base.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = self.connect_timeout_secs.filter(|s| *s > 0) {
            base.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(size) = self.page_size.filter(|s| *s > 0) {
            base.page_size = size;
        }
        if self.snapshot.is_some() {
            base.snapshot = self.snapshot;
        }
        if let Some(m) = self.mongodb {
            base.mongodb = m;
        }
        base
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_match_dashboard_contract() {
        let c = DashboardConfig::default();
        assert_eq!(c.cache_ttl, Duration::from_secs(300));
        assert_eq!(c.connect_timeout, Duration::from_secs(5));
        assert_eq!(c.page_size, 50);
        assert_eq!(c.source(), DataSource::Mongo(MongoSettings::default()));
    }

    #[test]
    fn toml_overlays_defaults() {
        let c = DashboardConfig::from_toml_str(
            r#"
            cache_ttl_secs = 60

            [mongodb]
            uri = "mongodb://localhost:27017"
            database = "twitch"
            collection = "streamers"
            "#,
        )
        .unwrap();
        assert_eq!(c.cache_ttl, Duration::from_secs(60));
        assert_eq!(c.connect_timeout, Duration::from_secs(5));
        let target = c.mongodb.resolve().unwrap();
        assert_eq!(target.database, "twitch");
        assert_eq!(target.collection, "streamers");
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(DashboardConfig::from_toml_str("cache_ttl_secs = \"soon\"").is_err());
    }

    #[test]
    fn missing_key_names_the_key() {
        let settings = MongoSettings {
            uri: Some("mongodb://localhost".into()),
            database: Some("  ".into()),
            collection: Some("streamers".into()),
        };
        let err = settings.resolve().unwrap_err();
        assert!(matches!(err, LoadError::Configuration(_)));
        assert!(err.to_string().contains("mongodb.database"));
    }

    #[test]
    fn environment_overrides_file() {
        let env: HashMap<&str, &str> = [
            ("MONGODB_URI", "mongodb://db:27017"),
            ("MONGODB_COLLECTION", ""),
            ("STREAMER_DASHBOARD_SNAPSHOT", "dump.json"),
        ]
        .into_iter()
        .collect();
        let mut c = DashboardConfig::default();
        c.mongodb.collection = Some("streamers".into());
        c.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(c.mongodb.uri.as_deref(), Some("mongodb://db:27017"));
        assert_eq!(c.mongodb.collection.as_deref(), Some("streamers"));
        assert_eq!(c.source(), DataSource::Snapshot(PathBuf::from("dump.json")));
    }
}
