//! Quest and task entities.
//!
//! Loaded once per session and treated as immutable afterwards. Tasks use the
//! flat wire shape `{id, title, latitude, longitude, hint}`: a task with both
//! coordinates is a location goal, anything else is a hint goal.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::GeoCoordinate;

pub type EntityId = u64;

/// Stable sequence position of a task inside its quest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskPosition(pub usize);

impl TaskPosition {
    pub fn index(self) -> usize {
        self.0
    }

    pub fn next(self) -> TaskPosition {
        TaskPosition(self.0 + 1)
    }
}

impl fmt::Display for TaskPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Goal {
    Location(GeoCoordinate),
    Hint(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "TaskRecord", into = "TaskRecord")]
pub struct Task {
    pub id: Option<EntityId>,
    pub title: String,
    pub goal: Goal,
}

impl Task {
    pub fn new(title: &str, goal: Goal) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            goal,
        }
    }

    pub fn location(title: &str, coordinate: GeoCoordinate) -> Self {
        Self::new(title, Goal::Location(coordinate))
    }

    pub fn hint(title: &str, text: &str) -> Self {
        Self::new(title, Goal::Hint(text.to_string()))
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn location_goal(&self) -> Option<GeoCoordinate> {
        match self.goal {
            Goal::Location(coordinate) => Some(coordinate),
            Goal::Hint(_) => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct TaskRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<EntityId>,
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl From<TaskRecord> for Task {
    fn from(record: TaskRecord) -> Self {
        let goal = match (record.latitude, record.longitude) {
            (Some(lat), Some(lon)) => Goal::Location(GeoCoordinate::new(lat, lon)),
            _ => Goal::Hint(record.hint.unwrap_or_default()),
        };
        Task {
            id: record.id,
            title: record.title,
            goal,
        }
    }
}

impl From<Task> for TaskRecord {
    fn from(task: Task) -> Self {
        let (latitude, longitude, hint) = match task.goal {
            Goal::Location(c) => (Some(c.latitude), Some(c.longitude), None),
            Goal::Hint(text) => (None, None, Some(text)),
        };
        TaskRecord {
            id: task.id,
            title: task.title,
            latitude,
            longitude,
            hint,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    Draft,
    Active,
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Public,
    Private,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub id: EntityId,
    pub title: String,
    pub status: QuestStatus,
    pub access_level: AccessLevel,
    pub owner: User,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Quest {
    pub fn task(&self, position: TaskPosition) -> Option<&Task> {
        self.tasks.get(position.index())
    }

    pub fn first_position(&self) -> Option<TaskPosition> {
        if self.tasks.is_empty() {
            None
        } else {
            Some(TaskPosition(0))
        }
    }

    /// Position of the task right after `position` in the fixed order.
    ///
    /// Lookup is by index only; two tasks with identical content are still
    /// distinct steps.
    pub fn task_after(&self, position: TaskPosition) -> Option<TaskPosition> {
        let next = position.next();
        if next.index() < self.tasks.len() {
            Some(next)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
