//! Engine tuning.
//!
//! All thresholds the recorder and follower use live here so hosts can
//! adjust them per device. Every field has a default, so a host only
//! needs to send the values it wants to change.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Recording gate settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Minimum time between accepted fixes, in milliseconds.
    pub min_interval_ms: i64,
    /// Decimal places kept for stored coordinates (7 is ~1 cm).
    pub coordinate_decimals: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 800,
            coordinate_decimals: 7,
        }
    }
}

/// Guidance settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowConfig {
    /// Waypoints searched on each side of the current progress index.
    pub search_window: usize,
    /// Distance to the final waypoint that counts as arrival, in meters.
    pub arrival_threshold_m: f64,
    /// How often the host should call `tick` without a new fix.
    pub refresh_interval_ms: u64,
    pub almost_there_m: f64,
    pub getting_close_m: f64,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            search_window: 5,
            arrival_threshold_m: 5.0,
            refresh_interval_ms: 2000,
            almost_there_m: 10.0,
            getting_close_m: 50.0,
        }
    }
}

/// Accuracy bands for rating a fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub excellent_below_m: f64,
    pub good_below_m: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            excellent_below_m: 10.0,
            good_below_m: 30.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub recorder: RecorderConfig,
    pub follow: FollowConfig,
    pub quality: QualityConfig,
}

impl EngineConfig {
    /// Parse and validate a JSON config. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recorder.min_interval_ms < 0 {
            return Err(ConfigError::Invalid(format!(
                "min_interval_ms must not be negative, got {}",
                self.recorder.min_interval_ms
            )));
        }
        if self.recorder.coordinate_decimals > 15 {
            return Err(ConfigError::Invalid(format!(
                "coordinate_decimals must be at most 15, got {}",
                self.recorder.coordinate_decimals
            )));
        }
        if !(self.follow.arrival_threshold_m >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "arrival_threshold_m must not be negative, got {}",
                self.follow.arrival_threshold_m
            )));
        }
        if !(self.quality.excellent_below_m < self.quality.good_below_m) {
            return Err(ConfigError::Invalid(format!(
                "quality bands must increase: excellent {} >= good {}",
                self.quality.excellent_below_m, self.quality.good_below_m
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_field_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.recorder.min_interval_ms, 800);
        assert_eq!(config.recorder.coordinate_decimals, 7);
        assert_eq!(config.follow.search_window, 5);
        assert_eq!(config.follow.arrival_threshold_m, 5.0);
        assert_eq!(config.follow.refresh_interval_ms, 2000);
        assert_eq!(config.quality.excellent_below_m, 10.0);
        assert_eq!(config.quality.good_below_m, 30.0);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = EngineConfig::from_json(r#"{"follow": {"arrival_threshold_m": 8.0}}"#).unwrap();
        assert_eq!(config.follow.arrival_threshold_m, 8.0);
        assert_eq!(config.follow.search_window, 5);
        assert_eq!(config.recorder, RecorderConfig::default());
    }

    #[test]
    fn empty_object_is_default() {
        assert_eq!(EngineConfig::from_json("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn rejects_negative_arrival_threshold() {
        let result = EngineConfig::from_json(r#"{"follow": {"arrival_threshold_m": -1.0}}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_inverted_quality_bands() {
        let result = EngineConfig::from_json(
            r#"{"quality": {"excellent_below_m": 40.0, "good_below_m": 30.0}}"#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(EngineConfig::from_json("{not json"), Err(ConfigError::Parse(_))));
    }
}
