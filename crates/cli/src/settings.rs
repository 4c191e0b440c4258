//! Environment overrides, read from `VINOLINK_*` variables (and `.env`).

use serde::Deserialize;
use std::path::PathBuf;
use vinolink_backend_vivino::VivinoConfig;
use vinolink_ranking::RankingConfig;
use vinolink_service::HealthThresholds;

pub const ENV_PREFIX: &str = "VINOLINK_";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    /// JSON snapshot backing the store
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    pub vivino_base_url: Option<String>,
    /// Minimum interval between explore requests
    pub vivino_interval_ms: Option<u64>,
    pub trust_floor: Option<f32>,
    pub producer_avg_min_sample: Option<usize>,
    pub catalog_stale_minutes: Option<i64>,
    pub signal_stale_minutes: Option<i64>,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/vinolink.json")
}

impl Settings {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::prefixed(ENV_PREFIX).from_env()
    }

    pub fn vivino_config(&self) -> VivinoConfig {
        let mut config = VivinoConfig::default();
        if let Some(base_url) = &self.vivino_base_url {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(interval) = self.vivino_interval_ms {
            config.explore_interval_ms = interval;
        }
        config
    }

    pub fn ranking_config(&self) -> RankingConfig {
        let mut config = RankingConfig::default();
        if let Some(trust_floor) = self.trust_floor {
            config.trust_floor = trust_floor;
        }
        if let Some(min_sample) = self.producer_avg_min_sample {
            config.producer_avg_min_sample = min_sample;
        }
        config
    }

    pub fn health_thresholds(&self) -> HealthThresholds {
        let defaults = HealthThresholds::default();
        HealthThresholds {
            catalog_stale_minutes: self.catalog_stale_minutes.unwrap_or(defaults.catalog_stale_minutes),
            signal_stale_minutes: self.signal_stale_minutes.unwrap_or(defaults.signal_stale_minutes),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        envy::prefixed(ENV_PREFIX)
            .from_iter(vars.iter().map(|(k, v)| (k.to_string(), v.to_string())))
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[]);
        assert_eq!(settings.store_path, PathBuf::from("data/vinolink.json"));
        assert_eq!(settings.vivino_config().base_url, "https://www.vivino.com");
        assert_eq!(settings.ranking_config().trust_floor, 0.72);
        assert_eq!(settings.health_thresholds(), HealthThresholds::default());
    }

    #[test]
    fn test_overrides() {
        let settings = settings(&[
            ("VINOLINK_STORE_PATH", "/tmp/wines.json"),
            ("VINOLINK_VIVINO_BASE_URL", "http://localhost:8080/"),
            ("VINOLINK_VIVINO_INTERVAL_MS", "0"),
            ("VINOLINK_TRUST_FLOOR", "0.8"),
            ("VINOLINK_SIGNAL_STALE_MINUTES", "60"),
        ]);
        assert_eq!(settings.store_path, PathBuf::from("/tmp/wines.json"));
        assert_eq!(settings.vivino_config().base_url, "http://localhost:8080");
        assert_eq!(settings.vivino_config().explore_interval_ms, 0);
        assert_eq!(settings.ranking_config().trust_floor, 0.8);
        assert_eq!(settings.health_thresholds().signal_stale_minutes, 60);
        assert_eq!(settings.health_thresholds().catalog_stale_minutes, 1440);
    }
}
