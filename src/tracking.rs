// tracking.rs: geolocation / visual-tracking fusion
//
// Two channels feed this module:
//   - absolute but noisy geolocation fixes
//   - locally precise but drifting camera poses in scene space
//
// Each fix is paired with the camera pose active at that instant. The pair gives
// one sample of the offset between the scene ground plane and a local ENU plane
// around the session origin. The fused offset is the weighted mean over a
// sliding window; its standard error is the accuracy scalar.
//
// Nothing here fails. Degenerate input is rejected as an event and simply
// delays confidence.

use std::collections::VecDeque;

use serde::Deserialize;

use crate::types::{
    scene_to_ground, CameraPose, GeoCoordinate, GroundVec, LocationFix, TrackingEstimate,
};

/// Lower bound of the confidence window. Smaller values are treated as noise.
pub const CONFIDENT_MIN_ACCURACY: f64 = 0.0001;
/// Upper bound of the confidence window (metres).
pub const CONFIDENT_MAX_ACCURACY: f64 = 1.0;

/// True when an accuracy value is good enough to reposition scene content.
pub fn is_confident(accuracy: f64) -> bool {
    accuracy >= CONFIDENT_MIN_ACCURACY && accuracy <= CONFIDENT_MAX_ACCURACY
}

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Correspondences kept in the sliding window.
    pub window_size: usize,
    /// Correspondences required before accuracy becomes meaningful.
    pub min_correspondences: usize,
    /// Offset deviation that marks a discontinuous scene frame (metres).
    pub jump_threshold_m: f64,
    /// Camera translation jump between consecutive frames that marks a reset (metres).
    pub frame_jump_threshold_m: f64,
    /// Floor applied to reported fix accuracy when weighting (metres).
    pub min_fix_accuracy_m: f64,
    /// Fixes reporting worse accuracy are rejected (metres).
    pub max_fix_accuracy_m: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            window_size: 20,
            min_correspondences: 2,
            jump_threshold_m: 30.0,
            frame_jump_threshold_m: 10.0,
            min_fix_accuracy_m: 1.0,
            max_fix_accuracy_m: 65.0,
        }
    }
}

// ─── Events ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetReason {
    /// A fix disagreed with the fused offset beyond the jump threshold.
    OffsetDiscontinuity,
    /// The camera teleported between consecutive frames.
    PoseDiscontinuity,
    /// The tracking session was relaunched or failed.
    SessionRelaunched,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectReason {
    InvalidCoordinate,
    DegeneratePose,
    PoorAccuracy,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TrackingEvent {
    CorrespondenceRecorded { count: usize },
    EstimateUpdated(TrackingEstimate),
    FixRejected { reason: RejectReason },
    SessionReset { reason: ResetReason },
}

// ─── Estimator ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct Correspondence {
    offset: GroundVec,
    weight: f64,
}

pub struct TrackingAccuracyEstimator {
    config: TrackingConfig,
    origin: Option<GeoCoordinate>,
    correspondences: VecDeque<Correspondence>,
    fused_offset: Option<GroundVec>,
    accuracy: f64,
    last_estimate: Option<TrackingEstimate>,
    last_pose: Option<CameraPose>,
    reset_count: u64,
}

impl TrackingAccuracyEstimator {
    pub fn new(config: TrackingConfig) -> Self {
        Self {
            correspondences: VecDeque::with_capacity(config.window_size),
            origin: None,
            fused_offset: None,
            accuracy: 0.0,
            last_estimate: None,
            last_pose: None,
            reset_count: 0,
            config,
        }
    }

    /// Record a correspondence between `fix` and the camera pose at fix time.
    pub fn handle_location_update(&mut self, fix: &LocationFix, pose: &CameraPose) -> Vec<TrackingEvent> {
        let mut events = Vec::new();

        if !fix.coordinate.is_valid() {
            events.push(self.reject(RejectReason::InvalidCoordinate));
            return events;
        }
        if !pose.is_finite() {
            events.push(self.reject(RejectReason::DegeneratePose));
            return events;
        }
        let reported = fix.horizontal_accuracy.filter(|a| a.is_finite() && *a > 0.0);
        if reported.map_or(false, |a| a > self.config.max_fix_accuracy_m) {
            events.push(self.reject(RejectReason::PoorAccuracy));
            return events;
        }

        let origin = *self.origin.get_or_insert(fix.coordinate);
        let geo_ground = fix.coordinate.to_ground(&origin);
        let scene_ground = scene_to_ground(&pose.translation());
        let offset = geo_ground - scene_ground;

        if self.correspondences.len() >= self.config.min_correspondences {
            if let Some(fused) = self.fused_offset {
                let deviation = (offset - fused).norm();
                if deviation > self.config.jump_threshold_m {
                    log::warn!(
                        "[TRACKING] offset jumped {:.1} m (threshold {:.1} m), resetting correspondences",
                        deviation,
                        self.config.jump_threshold_m
                    );
                    events.push(self.reset(ResetReason::OffsetDiscontinuity));
                }
            }
        }

        let weight = match reported {
            Some(acc) => {
                let sigma = acc.max(self.config.min_fix_accuracy_m);
                1.0 / (sigma * sigma)
            }
            None => 1.0,
        };
        self.correspondences.push_back(Correspondence { offset, weight });
        while self.correspondences.len() > self.config.window_size.max(1) {
            self.correspondences.pop_front();
        }
        events.push(TrackingEvent::CorrespondenceRecorded {
            count: self.correspondences.len(),
        });

        self.refit();

        if let Some(coordinate) = self.location_for_pose(pose) {
            let estimate = TrackingEstimate {
                coordinate,
                accuracy: self.accuracy,
                timestamp: fix.timestamp,
            };
            self.last_estimate = Some(estimate);
            events.push(TrackingEvent::EstimateUpdated(estimate));
        }

        events
    }

    /// Watch per-frame camera poses for a discontinuous local frame.
    pub fn observe_pose(&mut self, pose: &CameraPose) -> Vec<TrackingEvent> {
        let mut events = Vec::new();
        if !pose.is_finite() {
            return events;
        }
        if let Some(previous) = self.last_pose {
            let jump = (pose.translation() - previous.translation()).norm();
            if jump > self.config.frame_jump_threshold_m {
                log::warn!("[TRACKING] camera jumped {:.1} m between frames, resetting", jump);
                events.push(self.reset(ResetReason::PoseDiscontinuity));
            }
        }
        self.last_pose = Some(*pose);
        events
    }

    /// Drop every correspondence. Accuracy returns to the unconfident state.
    pub fn reset(&mut self, reason: ResetReason) -> TrackingEvent {
        self.correspondences.clear();
        self.fused_offset = None;
        self.accuracy = 0.0;
        self.last_estimate = None;
        self.last_pose = None;
        self.reset_count += 1;
        log::info!("[TRACKING] reset #{} ({:?})", self.reset_count, reason);
        TrackingEvent::SessionReset { reason }
    }

    pub fn last_recognized_location(&self) -> Option<TrackingEstimate> {
        self.last_estimate
    }

    /// Current accuracy in metres; 0.0 means unknown.
    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub fn is_confident(&self) -> bool {
        is_confident(self.accuracy)
    }

    /// Fused geo position of the device at `pose`.
    pub fn location_for_pose(&self, pose: &CameraPose) -> Option<GeoCoordinate> {
        let origin = self.origin?;
        let offset = self.fused_offset?;
        if !pose.is_finite() {
            return None;
        }
        let ground = scene_to_ground(&pose.translation()) + offset;
        Some(GeoCoordinate::from_ground(&ground, &origin))
    }

    pub fn correspondence_count(&self) -> usize {
        self.correspondences.len()
    }

    pub fn reset_count(&self) -> u64 {
        self.reset_count
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    fn reject(&self, reason: RejectReason) -> TrackingEvent {
        log::debug!("[TRACKING] fix rejected: {:?}", reason);
        TrackingEvent::FixRejected { reason }
    }

    fn refit(&mut self) {
        let total_weight: f64 = self.correspondences.iter().map(|c| c.weight).sum();
        if self.correspondences.is_empty() || total_weight <= 0.0 {
            self.fused_offset = None;
            self.accuracy = 0.0;
            return;
        }

        let mean = self
            .correspondences
            .iter()
            .fold(GroundVec::zeros(), |acc, c| acc + c.offset * c.weight)
            / total_weight;
        self.fused_offset = Some(mean);

        if self.correspondences.len() < self.config.min_correspondences.max(2) {
            self.accuracy = 0.0;
            return;
        }

        let variance = self
            .correspondences
            .iter()
            .map(|c| c.weight * (c.offset - mean).norm_squared())
            .sum::<f64>()
            / total_weight;
        let sum_sq_weight: f64 = self.correspondences.iter().map(|c| c.weight * c.weight).sum();
        let effective_n = total_weight * total_weight / sum_sq_weight;

        let accuracy = (variance / effective_n).sqrt();
        self.accuracy = if accuracy.is_finite() { accuracy } else { 0.0 };
    }
}
