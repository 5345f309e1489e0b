//! Effects delivered to the UI context and the traits that consume them.

use serde::Serialize;

use crate::marker::{DestinationMarker, MarkerCommand};
use crate::model::{EntityId, TaskPosition};

#[derive(Clone, Debug, PartialEq)]
pub enum UiEffect {
    Marker(MarkerCommand),
    ShowMessage(String),
    ShowDistance(f64),
    ShowAccuracy(f64),
    ShowHint { task: TaskPosition, text: String },
    EnableNext,
    DisableNext,
    ShowFinish { quest_id: EntityId },
    RelaunchTracking { reset: bool },
}

impl UiEffect {
    /// Short name used in logs and replay output.
    pub fn kind(&self) -> &'static str {
        match self {
            UiEffect::Marker(MarkerCommand::Add(_)) => "marker_add",
            UiEffect::Marker(MarkerCommand::Update(_)) => "marker_update",
            UiEffect::Marker(MarkerCommand::Remove { .. }) => "marker_remove",
            UiEffect::ShowMessage(_) => "show_message",
            UiEffect::ShowDistance(_) => "show_distance",
            UiEffect::ShowAccuracy(_) => "show_accuracy",
            UiEffect::ShowHint { .. } => "show_hint",
            UiEffect::EnableNext => "enable_next",
            UiEffect::DisableNext => "disable_next",
            UiEffect::ShowFinish { .. } => "show_finish",
            UiEffect::RelaunchTracking { .. } => "relaunch_tracking",
        }
    }
}

/// Scene-graph side of the UI.
pub trait RenderSurface {
    fn add_marker(&mut self, marker: &DestinationMarker);
    fn update_marker(&mut self, marker: &DestinationMarker);
    fn remove_marker(&mut self, identifier: &str);
    fn relaunch_tracking(&mut self, reset: bool);
}

/// Text and control side of the UI.
pub trait Presenter {
    fn show_message(&mut self, text: &str);
    fn show_distance(&mut self, metres: f64);
    fn show_accuracy(&mut self, metres: f64);
    fn show_hint(&mut self, task: TaskPosition, text: &str);
    fn set_next_enabled(&mut self, enabled: bool);
    fn show_finish(&mut self, quest_id: EntityId);
}

pub fn apply_effect<R, P>(effect: &UiEffect, surface: &mut R, presenter: &mut P)
where
    R: RenderSurface + ?Sized,
    P: Presenter + ?Sized,
{
    match effect {
        UiEffect::Marker(MarkerCommand::Add(marker)) => surface.add_marker(marker),
        UiEffect::Marker(MarkerCommand::Update(marker)) => surface.update_marker(marker),
        UiEffect::Marker(MarkerCommand::Remove { identifier }) => surface.remove_marker(identifier),
        UiEffect::RelaunchTracking { reset } => surface.relaunch_tracking(*reset),
        UiEffect::ShowMessage(text) => presenter.show_message(text),
        UiEffect::ShowDistance(d) => presenter.show_distance(*d),
        UiEffect::ShowAccuracy(a) => presenter.show_accuracy(*a),
        UiEffect::ShowHint { task, text } => presenter.show_hint(*task, text),
        UiEffect::EnableNext => presenter.set_next_enabled(true),
        UiEffect::DisableNext => presenter.set_next_enabled(false),
        UiEffect::ShowFinish { quest_id } => presenter.show_finish(*quest_id),
    }
}

/// Records everything it receives. Used by the replay binary and tests.
#[derive(Debug, Default, Serialize)]
pub struct RecordingUi {
    pub markers_added: u32,
    pub markers_removed: u32,
    pub marker_updates: u32,
    pub live_marker: Option<String>,
    pub relaunches: u32,
    pub messages: Vec<String>,
    pub hints: Vec<String>,
    pub last_distance: Option<f64>,
    pub last_accuracy: Option<f64>,
    pub next_enabled: bool,
    pub finished: Vec<EntityId>,
}

impl RenderSurface for RecordingUi {
    fn add_marker(&mut self, marker: &DestinationMarker) {
        self.markers_added += 1;
        self.live_marker = Some(marker.identifier.clone());
    }

    fn update_marker(&mut self, _marker: &DestinationMarker) {
        self.marker_updates += 1;
    }

    fn remove_marker(&mut self, identifier: &str) {
        self.markers_removed += 1;
        if self.live_marker.as_deref() == Some(identifier) {
            self.live_marker = None;
        }
    }

    fn relaunch_tracking(&mut self, _reset: bool) {
        self.relaunches += 1;
    }
}

impl Presenter for RecordingUi {
    fn show_message(&mut self, text: &str) {
        self.messages.push(text.to_string());
    }

    fn show_distance(&mut self, metres: f64) {
        self.last_distance = Some(metres);
    }

    fn show_accuracy(&mut self, metres: f64) {
        self.last_accuracy = Some(metres);
    }

    fn show_hint(&mut self, _task: TaskPosition, text: &str) {
        self.hints.push(text.to_string());
    }

    fn set_next_enabled(&mut self, enabled: bool) {
        self.next_enabled = enabled;
    }

    fn show_finish(&mut self, quest_id: EntityId) {
        self.finished.push(quest_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoCoordinate;

    #[test]
    fn test_apply_routes_effects() {
        let mut ui = RecordingUi::default();
        let marker = DestinationMarker {
            identifier: "destination-0".to_string(),
            task: TaskPosition(0),
            coordinate: GeoCoordinate::new(1.0, 1.0),
            position: Default::default(),
            scale: 2.0,
            height: 0.0,
        };

        let effects = vec![
            UiEffect::Marker(MarkerCommand::Add(marker.clone())),
            UiEffect::Marker(MarkerCommand::Update(marker)),
            UiEffect::EnableNext,
            UiEffect::ShowHint { task: TaskPosition(1), text: "go left".to_string() },
            UiEffect::Marker(MarkerCommand::Remove { identifier: "destination-0".to_string() }),
            UiEffect::ShowFinish { quest_id: 9 },
        ];
        let mut surface = RecordingUi::default();
        for effect in &effects {
            apply_effect(effect, &mut surface, &mut ui);
        }
        assert_eq!(surface.markers_added, 1);
        assert_eq!(surface.marker_updates, 1);
        assert_eq!(surface.markers_removed, 1);
        assert_eq!(surface.live_marker, None);

        assert_eq!(ui.hints, vec!["go left".to_string()]);
        assert!(ui.next_enabled);
        assert_eq!(ui.finished, vec![9]);
        assert_eq!(ui.markers_added, 0);
    }
}
