//! Visual-tracking side of the session: tracking state and floor estimation.
//!
//! Horizontal plane anchors are only used to infer the local floor height,
//! which is the lowest anchor seen so far.

use std::collections::HashMap;

use serde::Serialize;

use crate::types::{CameraFrame, CameraPose, LimitedReason, TrackingQuality};

/// Floor height assumed before any plane is detected (metres, scene y).
pub const DEFAULT_FLOOR_HEIGHT: f64 = -1.5;

pub type AnchorId = String;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneState {
    Normal,
    NormalEmptyAnchors,
    NotAvailable,
    LimitedInitializing,
    LimitedExcessiveMotion,
    LimitedInsufficientFeatures,
    Relocalizing,
    Interrupted,
    InterruptionEnded,
    Failed(String),
}

impl SceneState {
    pub fn from_frame(quality: TrackingQuality, anchor_count: usize) -> Self {
        match quality {
            TrackingQuality::Normal if anchor_count == 0 => SceneState::NormalEmptyAnchors,
            TrackingQuality::Normal => SceneState::Normal,
            TrackingQuality::NotAvailable => SceneState::NotAvailable,
            TrackingQuality::Limited(LimitedReason::Initializing) => SceneState::LimitedInitializing,
            TrackingQuality::Limited(LimitedReason::ExcessiveMotion) => SceneState::LimitedExcessiveMotion,
            TrackingQuality::Limited(LimitedReason::InsufficientFeatures) => {
                SceneState::LimitedInsufficientFeatures
            }
            TrackingQuality::Limited(LimitedReason::Relocalizing) => SceneState::Relocalizing,
        }
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, SceneState::Normal | SceneState::NormalEmptyAnchors)
    }

    /// User-facing guidance for degraded states.
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            SceneState::NormalEmptyAnchors => Some("Point the camera at the ground"),
            SceneState::NotAvailable => Some("Camera tracking unavailable"),
            SceneState::LimitedInitializing => Some("Initializing camera tracking"),
            SceneState::LimitedExcessiveMotion => Some("Move the device more slowly"),
            SceneState::LimitedInsufficientFeatures => Some("Point the camera at a more detailed surface"),
            SceneState::Relocalizing => Some("Recovering camera tracking"),
            SceneState::Interrupted => Some("Camera tracking interrupted"),
            SceneState::Normal | SceneState::InterruptionEnded | SceneState::Failed(_) => None,
        }
    }
}

pub struct SceneTracker {
    state: SceneState,
    camera: Option<CameraPose>,
    last_frame_ts: Option<f64>,
    recognized_heights: HashMap<AnchorId, f64>,
    frame_count: u64,
}

impl SceneTracker {
    pub fn new() -> Self {
        Self {
            state: SceneState::LimitedInitializing,
            camera: None,
            last_frame_ts: None,
            recognized_heights: HashMap::new(),
            frame_count: 0,
        }
    }

    /// Returns the new state when it changed.
    pub fn handle_frame(&mut self, frame: &CameraFrame) -> Option<SceneState> {
        self.frame_count += 1;
        self.last_frame_ts = Some(frame.timestamp);
        if frame.pose.is_finite() {
            self.camera = Some(frame.pose);
        }
        let state = SceneState::from_frame(frame.quality, frame.anchor_count);
        self.set_state(state)
    }

    pub fn set_state(&mut self, state: SceneState) -> Option<SceneState> {
        if state == self.state {
            return None;
        }
        log::debug!("[SCENE] {:?} -> {:?}", self.state, state);
        self.state = state.clone();
        Some(state)
    }

    pub fn plane_added(&mut self, id: &str, height: f64) {
        if height.is_finite() {
            self.recognized_heights.insert(id.to_string(), height);
        }
    }

    pub fn plane_updated(&mut self, id: &str, height: f64) {
        self.plane_added(id, height);
    }

    pub fn plane_removed(&mut self, id: &str) {
        self.recognized_heights.remove(id);
    }

    pub fn estimated_floor_height(&self) -> f64 {
        self.recognized_heights
            .values()
            .copied()
            .fold(None, |min: Option<f64>, h| Some(min.map_or(h, |m| m.min(h))))
            .unwrap_or(DEFAULT_FLOOR_HEIGHT)
    }

    pub fn current_camera(&self) -> Option<CameraPose> {
        self.camera
    }

    pub fn state(&self) -> &SceneState {
        &self.state
    }

    pub fn last_frame_timestamp(&self) -> Option<f64> {
        self.last_frame_ts
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Forget anchors and the camera; called whenever the session is (re)launched.
    pub fn clear(&mut self) {
        self.recognized_heights.clear();
        self.camera = None;
        self.state = SceneState::LimitedInitializing;
    }
}

impl Default for SceneTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(quality: TrackingQuality, anchors: usize) -> CameraFrame {
        CameraFrame {
            timestamp: 1.0,
            pose: CameraPose::identity(),
            quality,
            anchor_count: anchors,
        }
    }

    #[test]
    fn test_floor_default_and_minimum() {
        let mut scene = SceneTracker::new();
        assert_eq!(scene.estimated_floor_height(), DEFAULT_FLOOR_HEIGHT);

        scene.plane_added("table", -0.7);
        scene.plane_added("floor", -1.4);
        assert_eq!(scene.estimated_floor_height(), -1.4);

        scene.plane_updated("table", -1.6);
        assert_eq!(scene.estimated_floor_height(), -1.6);

        scene.plane_removed("table");
        assert_eq!(scene.estimated_floor_height(), -1.4);

        scene.clear();
        assert_eq!(scene.estimated_floor_height(), DEFAULT_FLOOR_HEIGHT);
    }

    #[test]
    fn test_state_from_frames() {
        let mut scene = SceneTracker::new();
        assert_eq!(
            scene.handle_frame(&frame(TrackingQuality::Normal, 0)),
            Some(SceneState::NormalEmptyAnchors)
        );
        assert_eq!(scene.handle_frame(&frame(TrackingQuality::Normal, 0)), None);
        assert_eq!(
            scene.handle_frame(&frame(TrackingQuality::Limited(LimitedReason::Relocalizing), 2)),
            Some(SceneState::Relocalizing)
        );
        assert!(scene.current_camera().is_some());
        assert_eq!(scene.frame_count(), 3);
    }
}
