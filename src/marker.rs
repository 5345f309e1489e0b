use crate::model::TaskPosition;
use crate::projection::project;
use crate::types::{CameraPose, GeoCoordinate, ScenePosition};

/// Smallest rendered marker scale.
pub const MIN_MARKER_SCALE: f64 = 2.0;
/// Scale growth per metre of distance.
pub const MARKER_SCALE_PER_METRE: f64 = 0.3;
/// Distance at which marker height stops following the distance.
pub const HEIGHT_CAP_DISTANCE: f64 = 10.0;

/// `max(2, distance * 0.3)`.
pub fn scale_for_distance(distance: f64) -> f64 {
    let scale = distance * MARKER_SCALE_PER_METRE;
    if scale < MIN_MARKER_SCALE {
        MIN_MARKER_SCALE
    } else {
        scale
    }
}

/// Marker height above the floor.
///
/// Grows with distance up to 10 m, then drops to a flat `floor + 10`. The jump
/// at the boundary is intentional.
pub fn height_for_distance(distance: f64, floor_height: f64) -> f64 {
    if distance < HEIGHT_CAP_DISTANCE {
        return 1.0 + distance + floor_height;
    }
    HEIGHT_CAP_DISTANCE + floor_height
}

/// The single scene entity representing the active location goal.
#[derive(Clone, Debug, PartialEq)]
pub struct DestinationMarker {
    pub identifier: String,
    pub task: TaskPosition,
    pub coordinate: GeoCoordinate,
    pub position: ScenePosition,
    pub scale: f64,
    pub height: f64,
}

impl DestinationMarker {
    fn new(identifier: &str, task: TaskPosition, coordinate: GeoCoordinate) -> Self {
        Self {
            identifier: identifier.to_string(),
            task,
            coordinate,
            position: ScenePosition::zeros(),
            scale: MIN_MARKER_SCALE,
            height: 0.0,
        }
    }

    /// Final render position: projected ground position lifted to `height`.
    pub fn render_position(&self) -> ScenePosition {
        ScenePosition::new(self.position.x, self.height, self.position.z)
    }
}

/// Render primitives for the rendering surface, in submission order.
#[derive(Clone, Debug, PartialEq)]
pub enum MarkerCommand {
    Add(DestinationMarker),
    Update(DestinationMarker),
    Remove { identifier: String },
}

/// Owns the lifecycle of at most one destination marker.
///
/// `absent -> present -> absent`. Adding and removing queue a
/// [`MarkerCommand`] immediately. Position, scale and height changes are
/// staged and leave as one `Update` on [`DestinationMarkerController::commit`].
/// The caller drains the queue with [`DestinationMarkerController::take_commands`].
#[derive(Default)]
pub struct DestinationMarkerController {
    marker: Option<DestinationMarker>,
    commands: Vec<MarkerCommand>,
    dirty: bool,
}

impl DestinationMarkerController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the marker named `identifier`, creating it if needed.
    ///
    /// A marker with another identifier belongs to a previous task and is
    /// removed first, so at most one marker ever exists.
    pub fn ensure_marker(
        &mut self,
        identifier: &str,
        task: TaskPosition,
        coordinate: GeoCoordinate,
    ) -> &DestinationMarker {
        let stale = self
            .marker
            .as_ref()
            .map_or(false, |m| m.identifier != identifier);
        if stale {
            self.remove();
        }

        let commands = &mut self.commands;
        self.marker.get_or_insert_with(|| {
            let marker = DestinationMarker::new(identifier, task, coordinate);
            log::debug!("[MARKER] add {} for task {}", identifier, task);
            commands.push(MarkerCommand::Add(marker.clone()));
            marker
        })
    }

    /// Reposition against the current pose and anchor. Returns the true
    /// distance from `anchor` to the goal, or `None` without a marker.
    pub fn update(&mut self, pose: &CameraPose, anchor: &GeoCoordinate, threshold_distance: f64) -> Option<f64> {
        let marker = self.marker.as_mut()?;
        marker.position = project(&marker.coordinate, anchor, pose, threshold_distance);
        self.dirty = true;
        Some(anchor.distance(&marker.coordinate))
    }

    pub fn apply_scale(&mut self, distance: f64) {
        if let Some(marker) = self.marker.as_mut() {
            marker.scale = scale_for_distance(distance);
            self.dirty = true;
        }
    }

    pub fn apply_height(&mut self, distance: f64, floor_height: f64) {
        if let Some(marker) = self.marker.as_mut() {
            marker.height = height_for_distance(distance, floor_height);
            self.dirty = true;
        }
    }

    /// Queue a single `Update` carrying every staged change. Returns whether
    /// one was queued.
    pub fn commit(&mut self) -> bool {
        if !std::mem::take(&mut self.dirty) {
            return false;
        }
        match self.marker.as_ref() {
            Some(marker) => {
                self.commands.push(MarkerCommand::Update(marker.clone()));
                true
            }
            None => false,
        }
    }

    /// Remove the marker. A no-op when none exists.
    pub fn remove(&mut self) {
        self.dirty = false;
        if let Some(marker) = self.marker.take() {
            log::debug!("[MARKER] remove {}", marker.identifier);
            self.commands.push(MarkerCommand::Remove {
                identifier: marker.identifier,
            });
        }
    }

    pub fn marker(&self) -> Option<&DestinationMarker> {
        self.marker.as_ref()
    }

    pub fn is_present(&self) -> bool {
        self.marker.is_some()
    }

    pub fn take_commands(&mut self) -> Vec<MarkerCommand> {
        std::mem::take(&mut self.commands)
    }
}
