//! Trail following.
//!
//! A [`FollowSession`] tracks how far along a recorded trail the user is
//! and which waypoint to head for next. Each position fix moves the
//! progress index to the nearest waypoint inside a small window around
//! the current index, so GPS jitter cannot make it jump far ahead or far
//! back. Reaching the last waypoint, or coming within the arrival
//! threshold of it, completes the session.

use std::sync::Arc;

use log::{debug, info};
use serde::Serialize;
use thiserror::Error;

use crate::config::FollowConfig;
use crate::fix::PositionFix;
use crate::geo;
use crate::trail::{Trail, Waypoint};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FollowError {
    #[error("cannot follow a trail without waypoints")]
    EmptyTrail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowState {
    Idle,
    Active,
    Completed,
    Aborted,
}

/// Result of one guidance step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FollowUpdate {
    InProgress {
        distance_to_target_m: f64,
        bearing_to_target_deg: f64,
        progress_index: usize,
    },
    TrailCompleted,
    /// The session is not active; nothing was evaluated.
    Stale,
}

impl FollowUpdate {
    /// The waypoint an `InProgress` update points at.
    pub fn target<'a>(&self, session: &'a FollowSession) -> Option<&'a Waypoint> {
        match self {
            FollowUpdate::InProgress { progress_index, .. } => {
                session.trail.waypoints().get(progress_index + 1)
            }
            _ => None,
        }
    }
}

/// How near the next waypoint is, for status hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Proximity {
    AlmostThere,
    GettingClose,
    EnRoute,
}

impl Proximity {
    pub fn classify(distance_m: f64, config: &FollowConfig) -> Self {
        if distance_m < config.almost_there_m {
            Proximity::AlmostThere
        } else if distance_m < config.getting_close_m {
            Proximity::GettingClose
        } else {
            Proximity::EnRoute
        }
    }
}

/// Guidance state for one trail.
#[derive(Debug, Clone)]
pub struct FollowSession {
    trail: Arc<Trail>,
    progress_index: usize,
    state: FollowState,
    last_bearing: Option<f64>,
    last_fix: Option<PositionFix>,
}

impl FollowSession {
    pub fn trail(&self) -> &Trail {
        &self.trail
    }

    pub fn progress_index(&self) -> usize {
        self.progress_index
    }

    pub fn state(&self) -> FollowState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == FollowState::Active
    }

    /// Most recent fix passed to `advance`.
    pub fn last_fix(&self) -> Option<&PositionFix> {
        self.last_fix.as_ref()
    }
}

/// Drives [`FollowSession`]s with a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct Follower {
    config: FollowConfig,
}

impl Follower {
    pub fn new(config: FollowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FollowConfig {
        &self.config
    }

    /// Begin following `trail` from its first waypoint.
    pub fn start(&self, trail: impl Into<Arc<Trail>>) -> Result<FollowSession, FollowError> {
        let trail = trail.into();
        if trail.is_empty() {
            return Err(FollowError::EmptyTrail);
        }

        info!("Following trail {:?} ({} points)", trail.name(), trail.len());

        Ok(FollowSession {
            trail,
            progress_index: 0,
            state: FollowState::Active,
            last_bearing: None,
            last_fix: None,
        })
    }

    /// Evaluate one position fix against the session.
    pub fn advance(&self, session: &mut FollowSession, fix: &PositionFix) -> FollowUpdate {
        if session.state != FollowState::Active {
            return FollowUpdate::Stale;
        }
        session.last_fix = Some(*fix);

        let waypoints = session.trail.waypoints();
        let last_index = waypoints.len() - 1;
        let nearest = nearest_in_window(waypoints, session.progress_index, self.config.search_window, fix);
        session.progress_index = nearest;

        if nearest == last_index {
            return self.complete(session);
        }

        let target = &waypoints[nearest + 1].coordinate;
        let distance = geo::distance_m(&fix.coordinate, target);
        let bearing = if distance > 0.0 {
            geo::initial_bearing_deg(&fix.coordinate, target)
        } else {
            session.last_bearing.unwrap_or(0.0)
        };
        session.last_bearing = Some(bearing);

        if nearest + 1 >= last_index && distance < self.config.arrival_threshold_m {
            return self.complete(session);
        }

        debug!(
            "Progress {}/{}: {:.1} m to next point, bearing {:.0}",
            nearest, last_index, distance, bearing
        );

        FollowUpdate::InProgress {
            distance_to_target_m: distance,
            bearing_to_target_deg: bearing,
            progress_index: nearest,
        }
    }

    /// Re-evaluate the most recent fix.
    ///
    /// Meant to be called on a timer every `refresh_interval_ms` so that
    /// guidance keeps updating when the position source is slow.
    pub fn tick(&self, session: &mut FollowSession) -> FollowUpdate {
        match session.last_fix {
            Some(fix) => self.advance(session, &fix),
            None => FollowUpdate::Stale,
        }
    }

    /// Abort guidance. Safe to call in any state.
    pub fn stop(&self, session: &mut FollowSession) {
        if session.state != FollowState::Aborted {
            info!("Stopped following trail {:?}", session.trail.name());
        }
        session.state = FollowState::Aborted;
    }

    fn complete(&self, session: &mut FollowSession) -> FollowUpdate {
        info!("Trail {:?} completed", session.trail.name());
        session.state = FollowState::Completed;
        FollowUpdate::TrailCompleted
    }
}

/// Index of the waypoint closest to `fix` within `window` of `center`.
/// Ties keep the lower index.
fn nearest_in_window(waypoints: &[Waypoint], center: usize, window: usize, fix: &PositionFix) -> usize {
    let start = center.saturating_sub(window);
    let end = center.saturating_add(window).min(waypoints.len() - 1);

    let mut best = center;
    let mut best_distance = f64::INFINITY;
    for (i, wp) in waypoints.iter().enumerate().take(end + 1).skip(start) {
        let d = geo::distance_m(&fix.coordinate, &wp.coordinate);
        if d < best_distance {
            best_distance = d;
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::trail::{StyleTag, Timestamp};

    // ~0.0009 degrees of latitude is ~100 m.
    const STEP: f64 = 0.0009;

    fn wp(lat: f64, lon: f64, t: Timestamp) -> Waypoint {
        Waypoint {
            coordinate: Coordinate::new(lat, lon),
            captured_at: t,
            color_tag: "#EC4899".to_string(),
            style_tag: StyleTag::Particles,
        }
    }

    fn line_trail(points: usize) -> Trail {
        let waypoints = (0..points)
            .map(|i| wp(48.0 + i as f64 * STEP, 16.0, i as Timestamp * 1000))
            .collect();
        Trail::new("t", "Line", waypoints, StyleTag::Particles, "#EC4899", 0)
    }

    fn fix_at(c: &Coordinate) -> PositionFix {
        PositionFix::new(c.lat, c.lon, 5.0, 0)
    }

    #[test]
    fn start_rejects_empty_trail() {
        let follower = Follower::default();
        let empty = Trail::new("e", "Empty", Vec::new(), StyleTag::Line, "#fff", 0);
        assert_eq!(follower.start(empty).unwrap_err(), FollowError::EmptyTrail);
    }

    #[test]
    fn start_begins_active_at_zero() {
        let session = Follower::default().start(line_trail(3)).unwrap();
        assert_eq!(session.state(), FollowState::Active);
        assert_eq!(session.progress_index(), 0);
        assert!(session.last_fix().is_none());
    }

    #[test]
    fn fix_on_middle_point_targets_last() {
        let trail = line_trail(3);
        let w1 = trail.waypoints()[1].coordinate;
        let w2 = trail.waypoints()[2].coordinate;
        let follower = Follower::default();
        let mut session = follower.start(trail).unwrap();

        let update = follower.advance(&mut session, &fix_at(&w1));
        match update {
            FollowUpdate::InProgress { distance_to_target_m, bearing_to_target_deg, progress_index } => {
                assert_eq!(progress_index, 1);
                assert!((distance_to_target_m - geo::distance_m(&w1, &w2)).abs() < 1e-6);
                assert!(bearing_to_target_deg < 0.1 || bearing_to_target_deg > 359.9);
            }
            other => panic!("expected InProgress, got {other:?}"),
        }
        assert_eq!(update.target(&session).map(|w| w.coordinate), Some(w2));
        assert_eq!(session.progress_index(), 1);
    }

    #[test]
    fn arriving_near_final_point_completes() {
        let trail = line_trail(3);
        let w1 = trail.waypoints()[1].coordinate;
        let w2 = trail.waypoints()[2].coordinate;
        let follower = Follower::default();
        let mut session = follower.start(trail).unwrap();
        follower.advance(&mut session, &fix_at(&w1));

        // ~3 m short of W2, still nearer to W2 than W1.
        let close = Coordinate::new(w2.lat - 0.000027, w2.lon);
        let update = follower.advance(&mut session, &fix_at(&close));
        assert_eq!(update, FollowUpdate::TrailCompleted);
        assert_eq!(session.state(), FollowState::Completed);

        assert_eq!(follower.advance(&mut session, &fix_at(&w1)), FollowUpdate::Stale);
        assert_eq!(follower.tick(&mut session), FollowUpdate::Stale);
    }

    #[test]
    fn early_arrival_from_second_to_last_point() {
        // Points W0, W1, W2 with W2 only 4 m past W1.
        let waypoints = vec![
            wp(48.0, 16.0, 0),
            wp(48.0 + STEP, 16.0, 1000),
            wp(48.0 + STEP + 0.000036, 16.0, 2000),
        ];
        let trail = Trail::new("t", "Short end", waypoints, StyleTag::Line, "#fff", 0);
        let w1 = trail.waypoints()[1].coordinate;
        let follower = Follower::default();
        let mut session = follower.start(trail).unwrap();

        let update = follower.advance(&mut session, &fix_at(&w1));
        assert_eq!(session.progress_index(), 1);
        assert_eq!(update, FollowUpdate::TrailCompleted);
    }

    #[test]
    fn reaching_last_index_completes() {
        let trail = line_trail(4);
        let last = trail.waypoints()[3].coordinate;
        let follower = Follower::default();
        let mut session = follower.start(trail).unwrap();

        // Past the end of the trail, nearest is the last point.
        let beyond = Coordinate::new(last.lat + STEP, last.lon);
        assert_eq!(follower.advance(&mut session, &fix_at(&beyond)), FollowUpdate::TrailCompleted);
        assert_eq!(session.progress_index(), 3);
    }

    #[test]
    fn single_point_trail_completes_immediately() {
        let trail = Trail::new("s", "Dot", vec![wp(48.0, 16.0, 0)], StyleTag::Line, "#fff", 0);
        let follower = Follower::default();
        let mut session = follower.start(trail).unwrap();
        let update = follower.advance(&mut session, &PositionFix::new(47.0, 15.0, 5.0, 0));
        assert_eq!(update, FollowUpdate::TrailCompleted);
    }

    #[test]
    fn search_is_bounded_by_window() {
        let trail = line_trail(20);
        let far = trail.waypoints()[15].coordinate;
        let follower = Follower::default();
        let mut session = follower.start(trail).unwrap();

        let update = follower.advance(&mut session, &fix_at(&far));
        assert_eq!(session.progress_index(), 5);
        assert!(matches!(update, FollowUpdate::InProgress { progress_index: 5, .. }));

        follower.advance(&mut session, &fix_at(&far));
        assert_eq!(session.progress_index(), 10);
        follower.advance(&mut session, &fix_at(&far));
        assert_eq!(session.progress_index(), 15);
    }

    #[test]
    fn backtracking_is_limited_to_window() {
        let trail = line_trail(20);
        let start = trail.waypoints()[0].coordinate;
        let w12 = trail.waypoints()[12].coordinate;
        let follower = Follower::default();
        let mut session = follower.start(trail).unwrap();
        for _ in 0..3 {
            follower.advance(&mut session, &fix_at(&w12));
        }
        assert_eq!(session.progress_index(), 12);

        follower.advance(&mut session, &fix_at(&start));
        assert_eq!(session.progress_index(), 7);
    }

    #[test]
    fn zero_distance_without_bearing_reports_north() {
        // W1 and W2 share a coordinate; W3 lies far to the east.
        let waypoints = vec![
            wp(48.0, 16.0, 0),
            wp(48.0, 16.0, 1000),
            wp(48.0, 16.0, 2000),
            wp(48.0, 16.01, 3000),
            wp(48.0, 16.02, 4000),
        ];
        let trail = Trail::new("z", "Pause", waypoints, StyleTag::Line, "#fff", 0);
        let follower = Follower::default();
        let mut session = follower.start(trail).unwrap();

        // Ties at index 0..=2 keep the lowest index, target is W1 at 0 m.
        let here = PositionFix::new(48.0, 16.0, 5.0, 0);
        match follower.advance(&mut session, &here) {
            FollowUpdate::InProgress { distance_to_target_m, bearing_to_target_deg, progress_index } => {
                assert_eq!(progress_index, 0);
                assert_eq!(distance_to_target_m, 0.0);
                assert_eq!(bearing_to_target_deg, 0.0);
            }
            other => panic!("expected InProgress, got {other:?}"),
        }
    }

    #[test]
    fn zero_distance_keeps_previous_bearing() {
        // W1 and W2 share a coordinate east of W0.
        let waypoints = vec![
            wp(48.0, 15.999, 0),
            wp(48.0, 16.0, 1000),
            wp(48.0, 16.0, 2000),
            wp(48.0, 16.01, 3000),
            wp(48.0, 16.02, 4000),
        ];
        let trail = Trail::new("z", "Pause", waypoints, StyleTag::Line, "#fff", 0);
        let follower = Follower::default();
        let mut session = follower.start(trail).unwrap();

        let approach = follower.advance(&mut session, &PositionFix::new(48.0, 15.9985, 5.0, 0));
        let heading = match approach {
            FollowUpdate::InProgress { bearing_to_target_deg, progress_index, .. } => {
                assert_eq!(progress_index, 0);
                assert!((bearing_to_target_deg - 90.0).abs() < 0.1, "got {bearing_to_target_deg}");
                bearing_to_target_deg
            }
            other => panic!("expected InProgress, got {other:?}"),
        };

        // On W1 the target W2 is 0 m away, so the earlier heading is kept.
        match follower.advance(&mut session, &PositionFix::new(48.0, 16.0, 5.0, 1000)) {
            FollowUpdate::InProgress { distance_to_target_m, bearing_to_target_deg, progress_index } => {
                assert_eq!(progress_index, 1);
                assert_eq!(distance_to_target_m, 0.0);
                assert_eq!(bearing_to_target_deg, heading);
            }
            other => panic!("expected InProgress, got {other:?}"),
        }
    }

    #[test]
    fn tick_reuses_last_fix() {
        let trail = line_trail(5);
        let w2 = trail.waypoints()[2].coordinate;
        let follower = Follower::default();
        let mut session = follower.start(trail).unwrap();

        assert_eq!(follower.tick(&mut session), FollowUpdate::Stale);
        let first = follower.advance(&mut session, &fix_at(&w2));
        assert_eq!(follower.tick(&mut session), first);
        assert_eq!(session.progress_index(), 2);
    }

    #[test]
    fn stop_is_idempotent_from_any_state() {
        let follower = Follower::default();
        let mut active = follower.start(line_trail(3)).unwrap();
        follower.stop(&mut active);
        assert_eq!(active.state(), FollowState::Aborted);
        follower.stop(&mut active);
        assert_eq!(active.state(), FollowState::Aborted);
        assert_eq!(follower.advance(&mut active, &PositionFix::new(48.0, 16.0, 5.0, 0)), FollowUpdate::Stale);

        let trail = line_trail(3);
        let end = trail.waypoints()[2].coordinate;
        let mut done = follower.start(trail).unwrap();
        follower.advance(&mut done, &fix_at(&end));
        assert_eq!(done.state(), FollowState::Completed);
        follower.stop(&mut done);
        assert_eq!(done.state(), FollowState::Aborted);
    }

    #[test]
    fn progress_never_moves_back_without_window() {
        let trail = line_trail(8);
        let points: Vec<_> = trail.waypoints().iter().map(|w| w.coordinate).collect();
        let follower = Follower::new(FollowConfig { search_window: 5, ..Default::default() });
        let mut session = follower.start(trail).unwrap();

        let mut last = 0;
        for c in points.iter().take(6) {
            follower.advance(&mut session, &fix_at(c));
            assert!(session.progress_index() >= last);
            last = session.progress_index();
        }
    }

    #[test]
    fn proximity_bands() {
        let config = FollowConfig::default();
        assert_eq!(Proximity::classify(3.0, &config), Proximity::AlmostThere);
        assert_eq!(Proximity::classify(25.0, &config), Proximity::GettingClose);
        assert_eq!(Proximity::classify(120.0, &config), Proximity::EnRoute);
    }

    #[test]
    fn update_serializes_with_kind_tag() {
        let update = FollowUpdate::InProgress {
            distance_to_target_m: 12.5,
            bearing_to_target_deg: 90.0,
            progress_index: 3,
        };
        let json = serde_json::to_value(update).unwrap();
        assert_eq!(json["kind"], "in_progress");
        assert_eq!(json["progress_index"], 3);
        assert_eq!(serde_json::to_value(FollowUpdate::Stale).unwrap()["kind"], "stale");
    }
}
