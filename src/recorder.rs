//! Trail recording.
//!
//! Turns a stream of position fixes into a waypoint list. Fixes arriving
//! faster than the configured interval, or out of order, are dropped.
//! Finalizing seals the list into a [`Trail`] and starts over.

use chrono::{Local, Utc};
use log::{debug, info};
use thiserror::Error;

use crate::config::RecorderConfig;
use crate::fix::PositionFix;
use crate::trail::{StyleTag, Timestamp, Trail, Waypoint, DEFAULT_COLOR_TAG};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecorderError {
    #[error("a trail needs at least 2 points, got {found}")]
    InsufficientPoints { found: usize },
}

/// In-progress recording session.
#[derive(Debug, Clone)]
pub struct Recorder {
    config: RecorderConfig,
    waypoints: Vec<Waypoint>,
    last_accepted_at: Option<Timestamp>,
    color_tag: String,
    style_tag: StyleTag,
}

impl Recorder {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            waypoints: Vec::new(),
            last_accepted_at: None,
            color_tag: DEFAULT_COLOR_TAG.to_string(),
            style_tag: StyleTag::default(),
        }
    }

    /// Color applied to waypoints accepted from now on.
    pub fn set_color_tag(&mut self, color: impl Into<String>) {
        self.color_tag = color.into();
    }

    /// Style applied to waypoints accepted from now on.
    pub fn set_style_tag(&mut self, style: StyleTag) {
        self.style_tag = style;
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Offer a fix to the recorder.
    ///
    /// Returns the new waypoint when the fix passes the time gate, or
    /// `None` when it is dropped. A dropped fix leaves no trace.
    pub fn accept_fix(&mut self, fix: &PositionFix) -> Option<Waypoint> {
        if let Some(last) = self.last_accepted_at {
            // None on overflow, which only extreme timestamps can cause.
            let elapsed = fix.timestamp_ms.checked_sub(last);
            if !elapsed.is_some_and(|e| e > 0 && e >= self.config.min_interval_ms) {
                debug!("Dropping fix at {} (last point at {})", fix.timestamp_ms, last);
                return None;
            }
        }

        let waypoint = Waypoint {
            coordinate: fix.coordinate.rounded(self.config.coordinate_decimals),
            captured_at: fix.timestamp_ms,
            color_tag: self.color_tag.clone(),
            style_tag: self.style_tag,
        };

        self.waypoints.push(waypoint.clone());
        self.last_accepted_at = Some(fix.timestamp_ms);

        if self.waypoints.len() % 5 == 0 {
            debug!("Trail points: {}", self.waypoints.len());
        }

        Some(waypoint)
    }

    /// Seal the recorded points into a trail and reset the recorder.
    ///
    /// On error the recorded points are kept so recording can continue.
    pub fn finalize(&mut self, name: &str) -> Result<Trail, RecorderError> {
        if self.waypoints.len() < 2 {
            return Err(RecorderError::InsufficientPoints {
                found: self.waypoints.len(),
            });
        }

        let name = match name.trim() {
            "" => default_trail_name(),
            trimmed => trimmed.to_string(),
        };
        let created_at = Utc::now().timestamp_millis();
        let waypoints = std::mem::take(&mut self.waypoints);
        self.last_accepted_at = None;

        let trail = Trail::new(
            format!("trail_{created_at}"),
            name,
            waypoints,
            self.style_tag,
            self.color_tag.clone(),
            created_at,
        );

        info!(
            "Finalized trail {:?}: {} points, {:.2} m, {:.1} s",
            trail.name(),
            trail.len(),
            trail.total_distance_m(),
            trail.duration_s()
        );

        Ok(trail)
    }

    /// Drop the in-progress points without creating a trail.
    pub fn clear(&mut self) {
        if !self.waypoints.is_empty() {
            info!("Discarding {} recorded points", self.waypoints.len());
        }
        self.waypoints.clear();
        self.last_accepted_at = None;
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new(RecorderConfig::default())
    }
}

fn default_trail_name() -> String {
    format!("Trail_{}", Local::now().format("%Y-%m-%d"))
}
