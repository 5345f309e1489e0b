//! Core of a location-based AR quest game.
//!
//! Noisy geolocation fixes are fused with locally precise camera poses into a
//! stable position estimate. The estimate places a single destination marker
//! in scene space and drives a quest's ordered task list to completion.

pub mod directory;
pub mod error;
pub mod live_status;
pub mod marker;
pub mod model;
pub mod progression;
pub mod projection;
pub mod relaunch;
pub mod runtime;
pub mod scene;
pub mod session;
pub mod tracking;
pub mod types;
pub mod ui;

pub use error::{QuestError, QuestResult};
pub use model::{Goal, Quest, Task, TaskPosition};
pub use session::{SessionConfig, SessionCore, SessionInput};
