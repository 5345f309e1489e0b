//! Single-writer session state.
//!
//! `SessionCore` owns every mutable piece of a play session: the tracking
//! estimator, the scene tracker, the destination marker, quest progression and
//! relaunch bookkeeping. Inputs are handled one at a time and produce an
//! ordered list of [`UiEffect`]s.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::QuestError;
use crate::live_status::{current_timestamp, LiveStatus};
use crate::marker::DestinationMarkerController;
use crate::model::{Quest, TaskPosition};
use crate::progression::{ProgressEffect, ProgressEvent, QuestProgressionEngine, ARRIVAL_RADIUS_METERS};
use crate::projection::{scene_distance, SCENE_RADIUS};
use crate::relaunch::{RelaunchConfig, RelaunchState};
use crate::scene::{SceneState, SceneTracker};
use crate::tracking::{
    ResetReason, TrackingAccuracyEstimator, TrackingConfig, TrackingEvent, CONFIDENT_MAX_ACCURACY,
    CONFIDENT_MIN_ACCURACY,
};
use crate::types::{
    AuthorizationStatus, CameraFrame, CameraPose, GeoCoordinate, LocationFix, TrackingEstimate,
};
use crate::ui::UiEffect;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub arrival_radius_m: f64,
    pub scene_radius_m: f64,
    pub confident_min_accuracy: f64,
    pub confident_max_accuracy: f64,
    pub marker_prefix: String,
    pub tracking: TrackingConfig,
    pub relaunch: RelaunchConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            arrival_radius_m: ARRIVAL_RADIUS_METERS,
            scene_radius_m: SCENE_RADIUS,
            confident_min_accuracy: CONFIDENT_MIN_ACCURACY,
            confident_max_accuracy: CONFIDENT_MAX_ACCURACY,
            marker_prefix: "destination".to_string(),
            tracking: TrackingConfig::default(),
            relaunch: RelaunchConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LocationInput {
    Fix(LocationFix),
    Heading { timestamp: f64, degrees: f64 },
    Authorization { status: AuthorizationStatus },
    Failure { message: String },
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackingInput {
    Frame(CameraFrame),
    PlaneAdded { id: String, height: f64 },
    PlaneUpdated { id: String, height: f64 },
    PlaneRemoved { id: String },
    Interrupted,
    InterruptionEnded,
    Failed { message: String },
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserInput {
    HintAcknowledged { task: TaskPosition },
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "source", content = "event", rename_all = "snake_case")]
pub enum SessionInput {
    Location(LocationInput),
    Tracking(TrackingInput),
    User(UserInput),
}

pub struct SessionCore {
    quest: Arc<Quest>,
    config: SessionConfig,
    ar_enabled: bool,
    authorization: AuthorizationStatus,
    estimator: TrackingAccuracyEstimator,
    scene: SceneTracker,
    marker: DestinationMarkerController,
    marker_positioned: bool,
    engine: QuestProgressionEngine,
    relaunch: RelaunchState,
    clock: f64,
    heading: Option<f64>,
    last_estimate: Option<TrackingEstimate>,
    last_distance: Option<f64>,
    fix_count: u64,
    rejected_fixes: u64,
    started: bool,
}

impl SessionCore {
    pub fn new(quest: Arc<Quest>, config: SessionConfig, ar_supported: bool) -> Self {
        let engine = QuestProgressionEngine::new(quest.clone(), config.arrival_radius_m);
        Self {
            estimator: TrackingAccuracyEstimator::new(config.tracking.clone()),
            relaunch: RelaunchState::new("tracking", &config.relaunch),
            quest,
            ar_enabled: ar_supported,
            authorization: AuthorizationStatus::NotDetermined,
            scene: SceneTracker::new(),
            marker: DestinationMarkerController::new(),
            marker_positioned: false,
            engine,
            clock: 0.0,
            heading: None,
            last_estimate: None,
            last_distance: None,
            fix_count: 0,
            rejected_fixes: 0,
            started: false,
            config,
        }
    }

    /// Begin the quest. Calling it again has no effect.
    pub fn start(&mut self) -> Vec<UiEffect> {
        let mut effects = Vec::new();
        if self.started {
            return effects;
        }
        self.started = true;
        log::info!(
            "[SESSION] starting '{}' ({} tasks, ar={})",
            self.quest.title,
            self.quest.len(),
            self.ar_enabled
        );

        if !self.ar_enabled {
            effects.push(UiEffect::ShowMessage(QuestError::SensorUnavailable.to_string()));
        }
        let progress = self.engine.apply(ProgressEvent::Start);
        self.apply_progress(progress, &mut effects);
        effects
    }

    pub fn handle(&mut self, input: SessionInput) -> Vec<UiEffect> {
        let mut effects = Vec::new();
        match input {
            SessionInput::Location(input) => self.handle_location(input, &mut effects),
            SessionInput::Tracking(input) => self.handle_tracking(input, &mut effects),
            SessionInput::User(UserInput::HintAcknowledged { task }) => {
                let progress = self.engine.apply(ProgressEvent::HintAcknowledged { task });
                self.apply_progress(progress, &mut effects);
            }
        }
        effects
    }

    pub fn is_finished(&self) -> bool {
        self.engine.is_finished()
    }

    pub fn is_ar_enabled(&self) -> bool {
        self.ar_enabled
    }

    pub fn quest(&self) -> &Quest {
        &self.quest
    }

    pub fn status(&self) -> LiveStatus {
        let accuracy = self.estimator.accuracy();
        LiveStatus {
            timestamp: current_timestamp(),
            session_clock: self.clock,
            quest_id: self.quest.id,
            quest_title: self.quest.title.clone(),
            task_count: self.quest.len(),
            current_task: self.engine.current_position().map(TaskPosition::index),
            tasks_completed: self.engine.advance_count(),
            finished: self.engine.is_finished(),
            distance_to_goal: self.last_distance,
            location: self.last_estimate.map(|e| e.coordinate),
            accuracy,
            confident: self.is_confident(accuracy),
            correspondences: self.estimator.correspondence_count(),
            location_fixes: self.fix_count,
            rejected_fixes: self.rejected_fixes,
            camera_frames: self.scene.frame_count(),
            tracking_resets: self.estimator.reset_count(),
            heading_deg: self.heading,
            ar_enabled: self.ar_enabled,
            scene_state: self.scene.state().clone(),
            floor_height: self.scene.estimated_floor_height(),
            marker_present: self.marker.is_present(),
            relaunches: self.relaunch.total_relaunches,
            relaunch_status: self.relaunch.status(self.clock),
        }
    }

    fn is_confident(&self, accuracy: f64) -> bool {
        accuracy >= self.config.confident_min_accuracy && accuracy <= self.config.confident_max_accuracy
    }

    fn tick(&mut self, timestamp: f64) {
        if timestamp.is_finite() && timestamp > self.clock {
            self.clock = timestamp;
        }
    }

    // ── Location ─────────────────────────────────────────────────────────

    fn handle_location(&mut self, input: LocationInput, effects: &mut Vec<UiEffect>) {
        match input {
            LocationInput::Fix(fix) => {
                self.tick(fix.timestamp);
                self.handle_fix(&fix, effects);
            }
            LocationInput::Heading { timestamp, degrees } => {
                self.tick(timestamp);
                if degrees.is_finite() {
                    self.heading = Some(degrees.rem_euclid(360.0));
                }
            }
            LocationInput::Authorization { status } => {
                self.authorization = status;
                let error = match status {
                    AuthorizationStatus::Denied => Some(QuestError::LocationAuthorizationDenied),
                    AuthorizationStatus::Restricted => Some(QuestError::LocationAuthorizationRestricted),
                    AuthorizationStatus::Authorized | AuthorizationStatus::NotDetermined => None,
                };
                if let Some(error) = error {
                    log::warn!("[SESSION] {}", error);
                    effects.push(UiEffect::ShowMessage(error.to_string()));
                }
            }
            LocationInput::Failure { message } => {
                let error = QuestError::LocationFailure(message);
                log::warn!("[SESSION] {}", error);
                effects.push(UiEffect::ShowMessage(error.to_string()));
            }
        }
    }

    fn handle_fix(&mut self, fix: &LocationFix, effects: &mut Vec<UiEffect>) {
        if matches!(
            self.authorization,
            AuthorizationStatus::Denied | AuthorizationStatus::Restricted
        ) {
            log::debug!("[SESSION] fix ignored, location not authorized");
            return;
        }
        self.fix_count += 1;

        if !self.ar_enabled {
            // Plain geolocation drives progression.
            if !fix.coordinate.is_valid() {
                self.rejected_fixes += 1;
                return;
            }
            let estimate = TrackingEstimate {
                coordinate: fix.coordinate,
                accuracy: fix.horizontal_accuracy.unwrap_or(0.0),
                timestamp: fix.timestamp,
            };
            self.handle_estimate(estimate, None, effects);
            return;
        }

        let pose = match self.scene.current_camera() {
            Some(pose) => pose,
            None => {
                log::debug!("[SESSION] fix before first camera frame, skipped");
                return;
            }
        };

        for event in self.estimator.handle_location_update(fix, &pose) {
            match event {
                TrackingEvent::EstimateUpdated(estimate) => self.handle_estimate(estimate, Some(pose), effects),
                TrackingEvent::FixRejected { .. } => self.rejected_fixes += 1,
                TrackingEvent::SessionReset { .. } => self.marker_positioned = false,
                TrackingEvent::CorrespondenceRecorded { .. } => {}
            }
        }
    }

    fn handle_estimate(&mut self, estimate: TrackingEstimate, pose: Option<CameraPose>, effects: &mut Vec<UiEffect>) {
        self.last_estimate = Some(estimate);
        effects.push(UiEffect::ShowAccuracy(estimate.accuracy));

        let (task, goal) = match self.engine.current_location_goal() {
            Some(current) => current,
            None => return,
        };
        let distance = estimate.coordinate.distance(&goal);
        self.last_distance = Some(distance);

        if let Some(pose) = pose {
            if self.marker.is_present() && (self.is_confident(estimate.accuracy) || !self.marker_positioned) {
                self.reposition_marker(&pose, &estimate.coordinate);
                self.drain_marker(effects);
            }
        }

        let progress = self.engine.apply(ProgressEvent::DistanceMeasured { task, distance });
        self.apply_progress(progress, effects);
    }

    // ── Tracking ─────────────────────────────────────────────────────────

    fn handle_tracking(&mut self, input: TrackingInput, effects: &mut Vec<UiEffect>) {
        if !self.ar_enabled {
            return;
        }
        match input {
            TrackingInput::Frame(frame) => self.handle_frame(&frame, effects),
            TrackingInput::PlaneAdded { id, height } => {
                let floor = self.scene.estimated_floor_height();
                self.scene.plane_added(&id, height);
                self.refresh_height(floor, effects);
            }
            TrackingInput::PlaneUpdated { id, height } => {
                let floor = self.scene.estimated_floor_height();
                self.scene.plane_updated(&id, height);
                self.refresh_height(floor, effects);
            }
            TrackingInput::PlaneRemoved { id } => {
                let floor = self.scene.estimated_floor_height();
                self.scene.plane_removed(&id);
                self.refresh_height(floor, effects);
            }
            TrackingInput::Interrupted => {
                if let Some(state) = self.scene.set_state(SceneState::Interrupted) {
                    self.show_guidance(&state, effects);
                }
            }
            TrackingInput::InterruptionEnded => {
                self.scene.set_state(SceneState::InterruptionEnded);
                self.relaunch_tracking(effects);
            }
            TrackingInput::Failed { message } => {
                let error = QuestError::TrackingSessionFailure(message.clone());
                log::warn!("[SESSION] {}", error);
                effects.push(UiEffect::ShowMessage(error.to_string()));
                self.scene.set_state(SceneState::Failed(message));
                self.relaunch_tracking(effects);
            }
        }
    }

    fn handle_frame(&mut self, frame: &CameraFrame, effects: &mut Vec<UiEffect>) {
        self.tick(frame.timestamp);

        for event in self.estimator.observe_pose(&frame.pose) {
            if let TrackingEvent::SessionReset { .. } = event {
                self.marker_positioned = false;
            }
        }

        if let Some(state) = self.scene.handle_frame(frame) {
            if state.is_normal() {
                self.relaunch.record_success();
            }
            self.show_guidance(&state, effects);
        }

        if self.relaunch.can_retry(self.clock) {
            // The last attempt had its full cooldown to recover.
            if self.relaunch.is_exhausted() {
                self.degrade_to_location_only(effects);
                return;
            }
            self.begin_relaunch(effects);
        }

        // Camera motion moves the fused position between fixes.
        if let Some(coordinate) = self.estimator.location_for_pose(&frame.pose) {
            let estimate = TrackingEstimate {
                coordinate,
                accuracy: self.estimator.accuracy(),
                timestamp: frame.timestamp,
            };
            self.handle_estimate(estimate, Some(frame.pose), effects);
        }
    }

    /// Discard the local frame and ask the surface to restart tracking.
    fn relaunch_tracking(&mut self, effects: &mut Vec<UiEffect>) {
        if self.relaunch.is_exhausted() {
            self.degrade_to_location_only(effects);
            return;
        }

        self.estimator.reset(ResetReason::SessionRelaunched);
        self.scene.clear();
        self.marker_positioned = false;
        self.relaunch.signal_relaunch();

        if self.relaunch.can_retry(self.clock) {
            self.begin_relaunch(effects);
        }
    }

    fn begin_relaunch(&mut self, effects: &mut Vec<UiEffect>) {
        self.relaunch.begin_attempt(self.clock);
        effects.push(UiEffect::RelaunchTracking { reset: true });
    }

    fn degrade_to_location_only(&mut self, effects: &mut Vec<UiEffect>) {
        log::warn!(
            "[SESSION] tracking did not recover after {} relaunches, continuing without AR",
            self.relaunch.attempts
        );
        self.ar_enabled = false;
        self.marker.remove();
        self.drain_marker(effects);
        effects.push(UiEffect::ShowMessage(QuestError::SensorUnavailable.to_string()));
    }

    fn show_guidance(&self, state: &SceneState, effects: &mut Vec<UiEffect>) {
        if let Some(text) = state.guidance() {
            effects.push(UiEffect::ShowMessage(text.to_string()));
        }
    }

    fn refresh_height(&mut self, previous_floor: f64, effects: &mut Vec<UiEffect>) {
        let floor = self.scene.estimated_floor_height();
        if floor == previous_floor || !self.marker_positioned {
            return;
        }
        if let Some(distance) = self.last_distance {
            self.marker.apply_height(distance, floor);
            self.marker.commit();
            self.drain_marker(effects);
        }
    }

    // ── Marker & progression ─────────────────────────────────────────────

    fn reposition_marker(&mut self, pose: &CameraPose, anchor: &GeoCoordinate) {
        let radius = self.config.scene_radius_m;
        if let Some(distance) = self.marker.update(pose, anchor, radius) {
            self.marker.apply_scale(scene_distance(distance, radius));
            self.marker.apply_height(distance, self.scene.estimated_floor_height());
            self.marker.commit();
            self.marker_positioned = true;
        }
    }

    fn place_marker(&mut self, task: TaskPosition, coordinate: GeoCoordinate, effects: &mut Vec<UiEffect>) {
        if !self.ar_enabled {
            return;
        }
        let identifier = format!("{}-{}", self.config.marker_prefix, task.index());
        self.marker.ensure_marker(&identifier, task, coordinate);
        self.marker_positioned = false;

        // First placement uses whatever estimate exists, confident or not.
        if let Some(camera) = self.scene.current_camera() {
            if let Some(anchor) = self.estimator.location_for_pose(&camera) {
                self.reposition_marker(&camera, &anchor);
            }
        }
        self.drain_marker(effects);
    }

    fn drain_marker(&mut self, effects: &mut Vec<UiEffect>) {
        effects.extend(self.marker.take_commands().into_iter().map(UiEffect::Marker));
    }

    fn apply_progress(&mut self, progress: Vec<ProgressEffect>, effects: &mut Vec<UiEffect>) {
        for effect in progress {
            match effect {
                ProgressEffect::TaskActivated(position) => {
                    self.last_distance = None;
                    log::info!("[SESSION] task {} active", position);
                }
                ProgressEffect::PlaceMarker { task, coordinate } => self.place_marker(task, coordinate, effects),
                ProgressEffect::RemoveMarker => {
                    self.marker.remove();
                    self.drain_marker(effects);
                }
                ProgressEffect::ShowHint { task, text } => effects.push(UiEffect::ShowHint { task, text }),
                ProgressEffect::EnableNext => effects.push(UiEffect::EnableNext),
                ProgressEffect::DisableNext => effects.push(UiEffect::DisableNext),
                ProgressEffect::ShowDistance(distance) => effects.push(UiEffect::ShowDistance(distance)),
                ProgressEffect::Finished => effects.push(UiEffect::ShowFinish {
                    quest_id: self.quest.id,
                }),
            }
        }
    }
}
