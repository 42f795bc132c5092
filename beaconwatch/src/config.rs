//! Layered settings: compile-time defaults, overridable by a TOML file and
//! environment variables. Constructed once at process start and passed down
//! by value — nothing in the pipeline reads a global at call time.

use serde::Deserialize;
use std::path::Path;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Tier1Config {
    pub zscore_threshold: f64,
    pub interval_max_avg_s: f64,
    pub interval_max_jitter_s: f64,
    pub iqr_max: f64,
    pub min_requests: usize,
}

impl Default for Tier1Config {
    fn default() -> Self {
        Self {
            zscore_threshold: 3.0,
            interval_max_avg_s: 360.0,
            interval_max_jitter_s: 10.0,
            iqr_max: 15.0,
            min_requests: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Tier2Config {
    pub confidence_threshold: f64,
    pub top_features_n: usize,
}

impl Default for Tier2Config {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.70,
            top_features_n: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub contamination: f64,
    pub random_state: u64,
    pub subsample_size: usize,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            contamination: 0.01,
            random_state: 42,
            subsample_size: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub group_min: usize,
    pub tier1: Tier1Config,
    pub tier2: Tier2Config,
    pub forest: ForestConfig,
    pub known_bad_domains: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            group_min: 30,
            tier1: Tier1Config::default(),
            tier2: Tier2Config::default(),
            forest: ForestConfig::default(),
            known_bad_domains: vec![
                "malware-c2.ru".to_string(),
                "botnet-cmd.cn".to_string(),
                "evil-update.net".to_string(),
                "payload-drop.xyz".to_string(),
                "c2-handler.io".to_string(),
            ],
        }
    }
}

impl Config {
    /// Load defaults, then overlay a TOML file if one is given, then overlay
    /// recognised `BEACONWATCH_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = Config::default();

        if let Some(p) = path {
            let text = std::fs::read_to_string(p)?;
            cfg = toml::from_str(&text)
                .map_err(|e| PipelineError::Config(format!("invalid config file {}: {e}", p.display())))?;
        }

        if let Ok(v) = std::env::var("BEACONWATCH_GROUP_MIN") {
            cfg.group_min = v
                .parse()
                .map_err(|_| PipelineError::Config(format!("BEACONWATCH_GROUP_MIN not a number: {v}")))?;
        }
        if let Ok(v) = std::env::var("BEACONWATCH_RANDOM_STATE") {
            cfg.forest.random_state = v
                .parse()
                .map_err(|_| PipelineError::Config(format!("BEACONWATCH_RANDOM_STATE not a number: {v}")))?;
        }

        Ok(cfg)
    }
}
