//! Recorded trail data.
//!
//! A [`Trail`] is the sealed result of a recording session: an ordered
//! list of [`Waypoint`]s plus summary statistics. Trails are plain serde
//! structures so they can be stored as JSON or cross the JNI boundary.

use serde::{Deserialize, Serialize};

use crate::geo::{self, Coordinate};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Rendering style of a trail. Opaque to the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleTag {
    #[default]
    Particles,
    Line,
    Sparks,
}

/// Default color tag for new recordings.
pub const DEFAULT_COLOR_TAG: &str = "#EC4899";

/// One recorded sample of a trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub coordinate: Coordinate,
    pub captured_at: Timestamp,
    pub color_tag: String,
    pub style_tag: StyleTag,
}

/// A finalized, immutable trail.
///
/// Fields are only readable; the statistics are computed once by
/// [`Trail::new`] and never change afterwards. Deserializing goes through
/// [`Trail::new`] as well, so stored statistics are recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TrailRecord")]
pub struct Trail {
    id: String,
    name: String,
    waypoints: Vec<Waypoint>,
    total_distance_m: f64,
    duration_s: f64,
    style_tag: StyleTag,
    color_tag: String,
    created_at: Timestamp,
}

/// Serialized form of a [`Trail`]. Statistics fields are ignored on input.
#[derive(Deserialize)]
struct TrailRecord {
    id: String,
    name: String,
    waypoints: Vec<Waypoint>,
    style_tag: StyleTag,
    color_tag: String,
    created_at: Timestamp,
}

impl From<TrailRecord> for Trail {
    fn from(r: TrailRecord) -> Self {
        Trail::new(r.id, r.name, r.waypoints, r.style_tag, r.color_tag, r.created_at)
    }
}

impl Trail {
    /// Build a trail and compute its distance and duration.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        waypoints: Vec<Waypoint>,
        style_tag: StyleTag,
        color_tag: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        let total_distance_m = geo::path_length_m(waypoints.iter().map(|w| &w.coordinate));
        let duration_s = match (waypoints.first(), waypoints.last()) {
            (Some(first), Some(last)) => {
                last.captured_at.saturating_sub(first.captured_at) as f64 / 1000.0
            }
            _ => 0.0,
        };

        Self {
            id: id.into(),
            name: name.into(),
            waypoints,
            total_distance_m,
            duration_s,
            style_tag,
            color_tag: color_tag.into(),
            created_at,
        }
    }

    /// A copy of this trail under a different id.
    pub fn with_id(&self, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..self.clone()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn total_distance_m(&self) -> f64 {
        self.total_distance_m
    }

    pub fn duration_s(&self) -> f64 {
        self.duration_s
    }

    pub fn style_tag(&self) -> StyleTag {
        self.style_tag
    }

    pub fn color_tag(&self) -> &str {
        &self.color_tag
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }
}
