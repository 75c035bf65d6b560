//! GPX 1.1 import.
//!
//! Wraps the `gpx` crate so that a track exported from another app can
//! be followed like a recorded trail. Points are replayed through a
//! [`Recorder`], so imported trails get the same rounding, ordering and
//! statistics as recorded ones.

use std::io::Read;

use chrono::DateTime;
use log::{debug, warn};
use thiserror::Error;

use crate::config::RecorderConfig;
use crate::fix::PositionFix;
use crate::recorder::{Recorder, RecorderError};
use crate::trail::{Timestamp, Trail};

/// Spacing given to points of a track without timestamps.
const SYNTHETIC_SPACING_MS: Timestamp = 1000;

#[derive(Debug, Error)]
pub enum GpxImportError {
    #[error("GPX parse error: {0}")]
    Parse(#[from] gpx::errors::GpxError),
    #[error("GPX file contains no track")]
    NoTrack,
    #[error("invalid GPX time: {0}")]
    Time(String),
    #[error(transparent)]
    Recorder(#[from] RecorderError),
}

/// Read the first track of a GPX document as a trail.
///
/// Multi-segment tracks are flattened. Point times are used when every
/// point has one; otherwise the points are spaced one second apart.
/// `fallback_name` is used when the track has no name.
pub fn trail_from_gpx<R: Read>(
    reader: R,
    fallback_name: &str,
    config: &RecorderConfig,
) -> Result<Trail, GpxImportError> {
    let gpx = gpx::read(reader)?;
    let track = gpx.tracks.first().ok_or(GpxImportError::NoTrack)?;

    let points: Vec<&gpx::Waypoint> = track.segments.iter().flat_map(|seg| seg.points.iter()).collect();
    let timed = !points.is_empty() && points.iter().all(|wp| wp.time.is_some());
    if !timed {
        debug!("GPX track has untimed points, using {SYNTHETIC_SPACING_MS} ms spacing");
    }

    let mut recorder = Recorder::new(RecorderConfig {
        min_interval_ms: 0,
        ..config.clone()
    });

    let mut skipped = 0;
    for (i, wp) in points.iter().enumerate() {
        let timestamp_ms = match &wp.time {
            Some(time) if timed => {
                let iso = time.format().map_err(|e| GpxImportError::Time(e.to_string()))?;
                parse_time(&iso)?
            }
            _ => i as Timestamp * SYNTHETIC_SPACING_MS,
        };
        let fix = PositionFix::new(wp.point().y(), wp.point().x(), 0.0, timestamp_ms);
        if recorder.accept_fix(&fix).is_none() {
            skipped += 1;
        }
    }
    if skipped > 0 {
        warn!("Skipped {skipped} GPX points with out-of-order times");
    }

    let name = track.name.as_deref().unwrap_or(fallback_name);
    Ok(recorder.finalize(name)?)
}

/// Import from a byte slice. Convenience wrapper for JNI.
pub fn trail_from_gpx_bytes(
    data: &[u8],
    fallback_name: &str,
    config: &RecorderConfig,
) -> Result<Trail, GpxImportError> {
    trail_from_gpx(data, fallback_name, config)
}

fn parse_time(iso: &str) -> Result<Timestamp, GpxImportError> {
    let parsed = DateTime::parse_from_rfc3339(iso).map_err(|e| GpxImportError::Time(e.to_string()))?;
    Ok(parsed.timestamp_millis())
}
