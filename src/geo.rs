//! Great-circle geometry.
//!
//! Platform-agnostic distance and bearing computations shared by the
//! recorder and the follower. All coordinates use WGS84 (lat/lon in
//! degrees) on a spherical Earth.

use serde::{Deserialize, Serialize};

/// Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A geographic coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Round both components to `decimals` places, half away from zero.
    /// Rounding, not truncation, so a stored point is the nearest one.
    pub fn rounded(self, decimals: u32) -> Self {
        let scale = 10f64.powi(decimals as i32);
        Self {
            lat: (self.lat * scale).round() / scale,
            lon: (self.lon * scale).round() / scale,
        }
    }
}

/// Haversine distance between two coordinates in meters.
pub fn distance_m(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Initial bearing from `a` towards `b` in degrees [0, 360).
///
/// Meaningless when `a == b`; callers check for a zero-length leg first.
pub fn initial_bearing_deg(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    let bearing = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative angles
    if bearing >= 360.0 {
        0.0
    } else {
        bearing
    }
}

/// Total length of a coordinate path in meters.
pub fn path_length_m<'a, I>(coords: I) -> f64
where
    I: IntoIterator<Item = &'a Coordinate>,
{
    let mut total = 0.0;
    let mut prev: Option<&Coordinate> = None;
    for c in coords {
        if let Some(p) = prev {
            total += distance_m(p, c);
        }
        prev = Some(c);
    }
    total
}
