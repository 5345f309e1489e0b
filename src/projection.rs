//! Geo → scene projection.
//!
//! Pure geometry: given the fused anchor coordinate of the camera and its pose,
//! place a target coordinate in scene space along its true bearing, clamped to
//! a maximum render radius so distant goals stay visible.

use crate::types::{CameraPose, GeoCoordinate, ScenePosition};

/// Default render radius for destination content (metres).
pub const SCENE_RADIUS: f64 = 100.0;

/// Below this distance the bearing is meaningless and the default offset is used.
pub const MIN_PROJECTION_DISTANCE: f64 = 1e-3;

/// Offset used for degenerate input: one metre north of the camera.
pub fn default_offset() -> ScenePosition {
    ScenePosition::new(0.0, 0.0, -1.0)
}

/// Project `target` into scene space relative to `pose`.
///
/// `anchor` is the geo position of the camera at `pose`. The returned position
/// is always finite.
pub fn project(
    target: &GeoCoordinate,
    anchor: &GeoCoordinate,
    pose: &CameraPose,
    max_radius: f64,
) -> ScenePosition {
    let origin = pose_origin(pose);

    if !target.is_valid() || !anchor.is_valid() || !(max_radius > 0.0) {
        return origin + default_offset();
    }

    let distance = anchor.distance(target);
    if !(distance > MIN_PROJECTION_DISTANCE) {
        return origin + default_offset();
    }

    let rendered = distance.min(max_radius);
    let bearing = anchor.bearing(target).to_radians();
    let offset = ScenePosition::new(rendered * bearing.sin(), 0.0, -rendered * bearing.cos());

    let position = origin + offset;
    if position.iter().all(|v| v.is_finite()) {
        position
    } else {
        origin + default_offset()
    }
}

/// Rendered (clamped) distance for a true distance.
pub fn scene_distance(distance: f64, max_radius: f64) -> f64 {
    if distance > max_radius {
        max_radius
    } else {
        distance
    }
}

fn pose_origin(pose: &CameraPose) -> ScenePosition {
    let t = pose.translation();
    if t.iter().all(|v| v.is_finite()) {
        t
    } else {
        ScenePosition::zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn anchor() -> GeoCoordinate {
        GeoCoordinate::new(50.4501, 30.5234)
    }

    #[test]
    fn test_identical_coordinates_give_finite_default() {
        let pose = CameraPose::from_translation(0.5, 1.2, -0.3);
        let p = project(&anchor(), &anchor(), &pose, SCENE_RADIUS);
        assert!(p.iter().all(|v| v.is_finite()));
        assert_eq!(p, pose.translation() + default_offset());
    }

    #[test]
    fn test_north_target_goes_negative_z() {
        let target = GeoCoordinate::from_ground(&crate::types::GroundVec::new(0.0, 20.0), &anchor());
        let p = project(&target, &anchor(), &CameraPose::identity(), SCENE_RADIUS);
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-3);
        assert_relative_eq!(p.z, -20.0, epsilon = 1e-2);
    }

    #[test]
    fn test_far_target_clamped_preserving_bearing() {
        let target = GeoCoordinate::from_ground(&crate::types::GroundVec::new(3000.0, 4000.0), &anchor());
        let pose = CameraPose::from_translation(10.0, 0.0, 10.0);
        let p = project(&target, &anchor(), &pose, 50.0);
        let offset = p - pose.translation();

        assert_relative_eq!(offset.norm(), 50.0, epsilon = 1e-6);
        // east/north ratio preserved: 3:4
        assert_relative_eq!(offset.x / -offset.z, 0.75, epsilon = 5e-3);
    }

    #[test]
    fn test_degenerate_pose_and_radius() {
        let target = GeoCoordinate::new(50.46, 30.53);
        let mut pose = CameraPose::identity();
        pose.transform[(0, 3)] = f64::NAN;
        let p = project(&target, &anchor(), &pose, SCENE_RADIUS);
        assert!(p.iter().all(|v| v.is_finite()));

        let q = project(&target, &anchor(), &CameraPose::identity(), 0.0);
        assert_eq!(q, default_offset());
    }

    #[test]
    fn test_scene_distance_clamp() {
        assert_eq!(scene_distance(120.0, SCENE_RADIUS), SCENE_RADIUS);
        assert_eq!(scene_distance(12.0, SCENE_RADIUS), 12.0);
    }
}
