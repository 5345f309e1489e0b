pub mod linalg;

pub use linalg::*;

use geo::{HaversineBearing, HaversineDistance, Point};
use serde::{Deserialize, Serialize};

/// WGS84 coordinate in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude.abs() <= 90.0
            && self.longitude.abs() <= 180.0
    }

    fn point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }

    /// Great-circle distance in metres. Identical coordinates give exactly 0.
    pub fn distance(&self, to: &GeoCoordinate) -> f64 {
        if self == to {
            return 0.0;
        }
        let d = self.point().haversine_distance(&to.point());
        if d.is_finite() {
            d.max(0.0)
        } else {
            0.0
        }
    }

    /// Initial bearing towards `to`, degrees clockwise from north.
    pub fn bearing(&self, to: &GeoCoordinate) -> f64 {
        if self == to {
            return 0.0;
        }
        let b = self.point().haversine_bearing(to.point());
        if b.is_finite() {
            b
        } else {
            0.0
        }
    }

    /// Local tangent-plane offset of `self` from `origin` as (east, north) metres.
    pub fn to_ground(&self, origin: &GeoCoordinate) -> GroundVec {
        let d_lat = (self.latitude - origin.latitude).to_radians();
        let d_lon = (self.longitude - origin.longitude).to_radians();
        GroundVec::new(
            EARTH_RADIUS_M * d_lon * origin.latitude.to_radians().cos(),
            EARTH_RADIUS_M * d_lat,
        )
    }

    /// Inverse of [`GeoCoordinate::to_ground`].
    pub fn from_ground(ground: &GroundVec, origin: &GeoCoordinate) -> Self {
        let d_lat = ground.y / EARTH_RADIUS_M;
        // Guard against the pole where cos(lat) vanishes.
        let cos_lat = origin.latitude.to_radians().cos().max(1e-9);
        let d_lon = ground.x / (EARTH_RADIUS_M * cos_lat);
        Self {
            latitude: origin.latitude + d_lat.to_degrees(),
            longitude: origin.longitude + d_lon.to_degrees(),
        }
    }
}

/// Device pose in scene space at one instant.
///
/// Serialized as the 16 column-major entries of the transform.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 16]", into = "[f64; 16]")]
pub struct CameraPose {
    pub transform: PoseMat,
}

impl CameraPose {
    pub fn new(transform: PoseMat) -> Self {
        Self { transform }
    }

    pub fn identity() -> Self {
        Self::new(PoseMat::identity())
    }

    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self::new(PoseMat::new_translation(&ScenePosition::new(x, y, z)))
    }

    pub fn translation(&self) -> ScenePosition {
        self.transform.fixed_view::<3, 1>(0, 3).into_owned()
    }

    pub fn is_finite(&self) -> bool {
        self.transform.iter().all(|v| v.is_finite())
    }
}

impl Default for CameraPose {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<[f64; 16]> for CameraPose {
    fn from(values: [f64; 16]) -> Self {
        Self::new(PoseMat::from_column_slice(&values))
    }
}

impl From<CameraPose> for [f64; 16] {
    fn from(pose: CameraPose) -> Self {
        let mut out = [0.0; 16];
        out.copy_from_slice(pose.transform.as_slice());
        out
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub timestamp: f64,
    pub coordinate: GeoCoordinate,
    #[serde(default)]
    pub heading: Option<f64>,
    /// Reported horizontal accuracy radius in metres.
    #[serde(default)]
    pub horizontal_accuracy: Option<f64>,
}

/// Fused anchor coordinate. Recomputed on every sensor event, never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TrackingEstimate {
    pub coordinate: GeoCoordinate,
    pub accuracy: f64,
    pub timestamp: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    NotDetermined,
    Authorized,
    Denied,
    Restricted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitedReason {
    Initializing,
    ExcessiveMotion,
    InsufficientFeatures,
    Relocalizing,
}

/// Tracking quality reported with every camera frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingQuality {
    Normal,
    Limited(LimitedReason),
    NotAvailable,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraFrame {
    pub timestamp: f64,
    pub pose: CameraPose,
    pub quality: TrackingQuality,
    /// Number of anchors currently tracked in the frame.
    #[serde(default)]
    pub anchor_count: usize,
}
