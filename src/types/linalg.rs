//! Linear algebra aliases for scene space.
//!
//! Scene space is gravity-and-heading aligned: +x east, +y up, -z north.
//! All geometry in the crate goes through these aliases so the convention
//! lives in one place.

use nalgebra::{Matrix4, Vector2, Vector3};

// ===== Scene space =====
pub type PoseMat = Matrix4<f64>;
pub type ScenePosition = Vector3<f64>;

// ===== Ground plane (east, north) in metres =====
pub type GroundVec = Vector2<f64>;

/// Mean earth radius used by the local tangent-plane conversions (metres).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Project a scene position onto the ground plane as (east, north).
pub fn scene_to_ground(position: &ScenePosition) -> GroundVec {
    GroundVec::new(position.x, -position.z)
}

/// Lift a ground-plane (east, north) offset into scene space at height `y`.
pub fn ground_to_scene(ground: &GroundVec, y: f64) -> ScenePosition {
    ScenePosition::new(ground.x, y, -ground.y)
}
