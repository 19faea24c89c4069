//! User settings and tile cache configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::defaults;
use crate::types::{Meters, Px};

/// Editing preferences stored with a project.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Meters per storey when height is derived from a storey count
    #[serde(deserialize_with = "non_negative")]
    pub storey_height: f64,
    pub snap_threshold_px: f64,
    pub snap_enabled: bool,
    pub zoom_step_percent: f64,
    pub default_storeys: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storey_height: defaults::STOREY_HEIGHT.raw(),
            snap_threshold_px: defaults::SNAP_THRESHOLD_PX.raw(),
            snap_enabled: true,
            zoom_step_percent: defaults::ZOOM_STEP_PERCENT,
            default_storeys: defaults::DEFAULT_STOREYS,
        }
    }
}

impl Settings {
    pub fn storey_height(&self) -> Meters {
        Meters(self.storey_height)
    }

    pub fn snap_threshold(&self) -> Px {
        Px(self.snap_threshold_px)
    }

    /// Multiplicative zoom factor of one zoom step
    pub fn zoom_step_factor(&self) -> f64 {
        1.0 + self.zoom_step_percent / 100.0
    }
}

fn non_negative<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = f64::deserialize(deserializer)?;
    Meters::try_non_negative(value)
        .map(Meters::raw)
        .map_err(serde::de::Error::custom)
}

/// Where and how map tiles are cached and fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub cache_dir: PathBuf,
    /// Decoded tiles kept in memory
    pub memory_capacity: usize,
    pub workers: usize,
    pub timeout: Duration,
    /// Consecutive failures after which a key stays failed until reloaded
    pub max_attempts: u32,
    pub user_agent: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            memory_capacity: defaults::TILE_MEMORY_CAPACITY,
            workers: defaults::TILE_WORKERS,
            timeout: Duration::from_secs(defaults::TILE_TIMEOUT_SECS),
            max_attempts: defaults::TILE_MAX_ATTEMPTS,
            user_agent: defaults::TILE_USER_AGENT.to_string(),
        }
    }
}

pub const ENV_TILE_DIR: &str = "CITYSKETCH_TILE_DIR";
pub const ENV_TILE_MEMORY: &str = "CITYSKETCH_TILE_MEMORY";
pub const ENV_TILE_WORKERS: &str = "CITYSKETCH_TILE_WORKERS";
pub const ENV_TILE_TIMEOUT_SECS: &str = "CITYSKETCH_TILE_TIMEOUT_SECS";

impl CacheConfig {
    /// Defaults overridden by `CITYSKETCH_TILE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`CacheConfig::from_env`], reading variables through `lookup`.
    /// Unparseable or zero values are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse = |name: &str| lookup(name).and_then(|v| parse_positive::<u64>(&v));
        let mut config = Self::default();

        if let Some(dir) = lookup(ENV_TILE_DIR).filter(|d| !d.trim().is_empty()) {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Some(capacity) = parse(ENV_TILE_MEMORY) {
            config.memory_capacity = capacity as usize;
        }
        if let Some(workers) = parse(ENV_TILE_WORKERS) {
            config.workers = workers as usize;
        }
        if let Some(secs) = parse(ENV_TILE_TIMEOUT_SECS) {
            config.timeout = Duration::from_secs(secs);
        }
        config
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }
}

fn parse_positive<T: FromStr + PartialOrd + Default>(value: &str) -> Option<T> {
    value.trim().parse::<T>().ok().filter(|v| *v > T::default())
}

fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("citysketch_tiles")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn settings_defaults() {
        let s = Settings::default();
        assert_eq!(s.storey_height(), Meters(3.3));
        assert_eq!(s.snap_threshold(), Px(15.0));
        assert!(s.snap_enabled);
        assert_eq!(s.default_storeys, 3);
        assert!((s.zoom_step_factor() - 1.2).abs() < 1e-12);
    }

    #[test]
    fn settings_fill_missing_fields() {
        let s: Settings = serde_json::from_str(r#"{"storey_height": 3.0}"#).unwrap();
        assert_eq!(s.storey_height, 3.0);
        assert_eq!(s.default_storeys, 3);
        assert!(s.snap_enabled);
    }

    #[test]
    fn settings_reject_negative_storey_height() {
        let err = serde_json::from_str::<Settings>(r#"{"storey_height": -2.0}"#).unwrap_err();
        assert!(err.to_string().contains("negative"), "{err}");
    }

    #[test]
    fn cache_config_defaults() {
        let c = CacheConfig::default();
        assert_eq!(c.memory_capacity, 100);
        assert_eq!(c.workers, 4);
        assert_eq!(c.timeout, Duration::from_secs(5));
        assert_eq!(c.max_attempts, 2);
        assert!(c.cache_dir.ends_with("citysketch_tiles"));
        assert!(c.user_agent.starts_with("citysketch/"));
    }

    #[test]
    fn cache_config_reads_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_TILE_DIR, "/var/cache/tiles"),
            (ENV_TILE_MEMORY, "250"),
            (ENV_TILE_WORKERS, " 8 "),
            (ENV_TILE_TIMEOUT_SECS, "12"),
        ]
        .into_iter()
        .collect();
        let c = CacheConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(c.cache_dir, PathBuf::from("/var/cache/tiles"));
        assert_eq!(c.memory_capacity, 250);
        assert_eq!(c.workers, 8);
        assert_eq!(c.timeout, Duration::from_secs(12));
    }

    #[test]
    fn cache_config_ignores_garbage() {
        let vars: HashMap<&str, &str> = [
            (ENV_TILE_MEMORY, "lots"),
            (ENV_TILE_WORKERS, "0"),
            (ENV_TILE_DIR, "  "),
        ]
        .into_iter()
        .collect();
        let c = CacheConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(c, CacheConfig::default());
    }
}
