//! Live position input.
//!
//! Fixes are pushed in by the host one at a time. A position error is
//! never fatal: the engine just skips that tick.

use serde::{Deserialize, Serialize};

use crate::config::QualityConfig;
use crate::geo::Coordinate;
use crate::trail::Timestamp;

/// One position reading from the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionFix {
    pub coordinate: Coordinate,
    pub accuracy_m: f64,
    pub timestamp_ms: Timestamp,
}

impl PositionFix {
    pub fn new(lat: f64, lon: f64, accuracy_m: f64, timestamp_ms: Timestamp) -> Self {
        Self {
            coordinate: Coordinate::new(lat, lon),
            accuracy_m,
            timestamp_ms,
        }
    }

    pub fn quality(&self, config: &QualityConfig) -> FixQuality {
        FixQuality::classify(self.accuracy_m, config)
    }
}

/// Coarse rating of a fix's horizontal accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixQuality {
    Excellent,
    Good,
    Poor,
}

impl FixQuality {
    pub fn classify(accuracy_m: f64, config: &QualityConfig) -> Self {
        if accuracy_m < config.excellent_below_m {
            FixQuality::Excellent
        } else if accuracy_m < config.good_below_m {
            FixQuality::Good
        } else {
            FixQuality::Poor
        }
    }
}

/// Why the position source produced no fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionError {
    PermissionDenied,
    Unavailable,
    Timeout,
}

impl PositionError {
    /// Map a W3C geolocation error code. Unknown codes count as unavailable.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => PositionError::PermissionDenied,
            3 => PositionError::Timeout,
            _ => PositionError::Unavailable,
        }
    }
}

impl std::fmt::Display for PositionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            PositionError::PermissionDenied => "location permission denied",
            PositionError::Unavailable => "location unavailable",
            PositionError::Timeout => "location request timed out",
        };
        f.write_str(text)
    }
}
