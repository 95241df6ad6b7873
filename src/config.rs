//! Typed configuration, loadable from a YAML file merged with environment
//! overrides.
//!
//! Grounded in the teacher's `infrastructure::config::loader::ConfigLoader`
//! (`figment` with a defaults → file → env precedence chain and a
//! post-extract validation pass), adapted to this crate's config shape.

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::models::sequence::GlobalPolicy;
use crate::domain::models::weather::{SiteLocation, WeatherLimits};
use crate::logging::LogConfig;

/// Whole-process configuration: session policy defaults, the observing
/// site, weather gate thresholds, and logging.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub global_policy: GlobalPolicy,
    #[serde(default)]
    pub site: SiteLocation,
    #[serde(default)]
    pub weather_limits: WeatherLimits,
    #[serde(default)]
    pub logging: LogConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("meridian_window_minutes must be positive, got {0}")]
    InvalidMeridianWindow(f64),
    #[error("thread_pool_size must be at least 1, got {0}")]
    InvalidThreadPoolSize(usize),
    #[error("site latitude {0} out of range [-90, 90]")]
    InvalidLatitude(f64),
    #[error("site longitude {0} out of range [-180, 180]")]
    InvalidLongitude(f64),
}

/// Loads [`AppConfig`] with the precedence: built-in defaults, then an
/// optional YAML file, then `SEQUENCER_`-prefixed environment variables
/// (highest priority).
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from `path` (if it exists) merged over defaults and env.
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<AppConfig> {
        let config: AppConfig = Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("SEQUENCER_").split("__"))
            .extract()?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Load from defaults and environment only, with no config file.
    pub fn load_defaults() -> anyhow::Result<AppConfig> {
        let config: AppConfig = Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Env::prefixed("SEQUENCER_").split("__"))
            .extract()?;
        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
        if config.global_policy.meridian_window_minutes <= 0.0 {
            return Err(ConfigError::InvalidMeridianWindow(config.global_policy.meridian_window_minutes));
        }
        if config.global_policy.thread_pool_size == 0 {
            return Err(ConfigError::InvalidThreadPoolSize(config.global_policy.thread_pool_size));
        }
        if !(-90.0..=90.0).contains(&config.site.latitude_degrees) {
            return Err(ConfigError::InvalidLatitude(config.site.latitude_degrees));
        }
        if !(-180.0..=180.0).contains(&config.site.longitude_degrees) {
            return Err(ConfigError::InvalidLongitude(config.site.longitude_degrees));
        }
        Ok(())
    }
}
