use serde::Serialize;
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::model::EntityId;
use crate::relaunch::RelaunchStatus;
use crate::scene::SceneState;
use crate::types::GeoCoordinate;

/// Informational snapshot of a play session.
#[derive(Serialize, Clone, Debug)]
pub struct LiveStatus {
    pub timestamp: f64,
    pub session_clock: f64,
    // Quest
    pub quest_id: EntityId,
    pub quest_title: String,
    pub task_count: usize,
    pub current_task: Option<usize>,
    pub tasks_completed: usize,
    pub finished: bool,
    pub distance_to_goal: Option<f64>,
    // Tracking
    pub location: Option<GeoCoordinate>,
    pub accuracy: f64,
    pub confident: bool,
    pub correspondences: usize,
    pub location_fixes: u64,
    pub rejected_fixes: u64,
    pub camera_frames: u64,
    pub tracking_resets: u64,
    pub heading_deg: Option<f64>,
    // Scene
    pub ar_enabled: bool,
    pub scene_state: SceneState,
    pub floor_height: f64,
    pub marker_present: bool,
    // Relaunch
    pub relaunches: u32,
    pub relaunch_status: RelaunchStatus,
}

impl LiveStatus {
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
