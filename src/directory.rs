//! Read-only quest catalog.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{QuestError, QuestResult};
use crate::model::{AccessLevel, EntityId, Quest, QuestStatus, Task};

pub trait QuestDirectory {
    /// Quests open to everyone.
    fn load_quests(&self) -> QuestResult<Vec<Quest>>;
    fn load_own_quests(&self, owner: EntityId) -> QuestResult<Vec<Quest>>;
    fn load_tasks(&self, quest_id: EntityId) -> QuestResult<Vec<Task>>;
    fn join_by_code(&self, code: &str) -> QuestResult<Quest>;

    fn quest(&self, quest_id: EntityId) -> QuestResult<Quest>;
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    quest: Quest,
    #[serde(default)]
    join_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Catalog {
    quests: Vec<CatalogEntry>,
}

/// Catalog file: `{"quests": [{"quest": {...}, "join_code": "..."}]}`.
#[derive(Debug)]
pub struct JsonQuestDirectory {
    entries: Vec<CatalogEntry>,
}

impl JsonQuestDirectory {
    pub fn from_path(path: &Path) -> QuestResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| QuestError::DirectoryUnavailable(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> QuestResult<Self> {
        let catalog: Catalog =
            serde_json::from_str(text).map_err(|e| QuestError::InvalidCatalog(e.to_string()))?;

        let mut seen = std::collections::HashSet::new();
        for entry in &catalog.quests {
            if !seen.insert(entry.quest.id) {
                return Err(QuestError::InvalidCatalog(format!(
                    "duplicate quest id {}",
                    entry.quest.id
                )));
            }
        }
        log::debug!("[DIRECTORY] loaded {} quests", catalog.quests.len());
        Ok(Self {
            entries: catalog.quests,
        })
    }

    fn entry(&self, quest_id: EntityId) -> QuestResult<&CatalogEntry> {
        self.entries
            .iter()
            .find(|e| e.quest.id == quest_id)
            .ok_or_else(|| QuestError::QuestNotFound(format!("id {}", quest_id)))
    }
}

impl QuestDirectory for JsonQuestDirectory {
    fn load_quests(&self) -> QuestResult<Vec<Quest>> {
        Ok(self
            .entries
            .iter()
            .map(|e| &e.quest)
            .filter(|q| q.access_level == AccessLevel::Public && q.status == QuestStatus::Active)
            .cloned()
            .collect())
    }

    fn load_own_quests(&self, owner: EntityId) -> QuestResult<Vec<Quest>> {
        Ok(self
            .entries
            .iter()
            .map(|e| &e.quest)
            .filter(|q| q.owner.id == owner)
            .cloned()
            .collect())
    }

    fn load_tasks(&self, quest_id: EntityId) -> QuestResult<Vec<Task>> {
        Ok(self.entry(quest_id)?.quest.tasks.clone())
    }

    fn join_by_code(&self, code: &str) -> QuestResult<Quest> {
        let code = code.trim();
        self.entries
            .iter()
            .find(|e| {
                e.join_code
                    .as_deref()
                    .map_or(false, |c| c.eq_ignore_ascii_case(code))
            })
            .filter(|e| e.quest.status != QuestStatus::Draft)
            .map(|e| e.quest.clone())
            .ok_or_else(|| QuestError::QuestNotFound(format!("join code '{}'", code)))
    }

    fn quest(&self, quest_id: EntityId) -> QuestResult<Quest> {
        Ok(self.entry(quest_id)?.quest.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Goal;

    const CATALOG: &str = r#"{
        "quests": [
            {
                "quest": {
                    "id": 1, "title": "Old town", "status": "active", "access_level": "public",
                    "owner": {"id": 10, "name": "Ann"},
                    "tasks": [
                        {"id": 100, "title": "Fountain", "latitude": 50.45, "longitude": 30.52},
                        {"id": 101, "title": "Riddle", "hint": "Look under the bridge"}
                    ]
                }
            },
            {
                "quest": {
                    "id": 2, "title": "Secret", "status": "active", "access_level": "private",
                    "owner": {"id": 11, "name": "Bo"}
                },
                "join_code": "QX42"
            },
            {
                "quest": {
                    "id": 3, "title": "Unfinished", "status": "draft", "access_level": "private",
                    "owner": {"id": 10, "name": "Ann"}
                },
                "join_code": "DRAFT"
            }
        ]
    }"#;

    #[test]
    fn test_public_listing_and_tasks() {
        let directory = JsonQuestDirectory::from_json(CATALOG).unwrap();
        let quests = directory.load_quests().unwrap();
        assert_eq!(quests.len(), 1);
        assert_eq!(quests[0].id, 1);

        let tasks = directory.load_tasks(1).unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(matches!(tasks[1].goal, Goal::Hint(ref t) if t == "Look under the bridge"));

        assert_eq!(directory.load_own_quests(10).unwrap().len(), 2);
        assert!(matches!(directory.load_tasks(99), Err(QuestError::QuestNotFound(_))));
    }

    #[test]
    fn test_join_by_code() {
        let directory = JsonQuestDirectory::from_json(CATALOG).unwrap();
        assert_eq!(directory.join_by_code(" qx42 ").unwrap().id, 2);
        assert!(matches!(directory.join_by_code("DRAFT"), Err(QuestError::QuestNotFound(_))));
        assert!(matches!(directory.join_by_code("nope"), Err(QuestError::QuestNotFound(_))));
    }

    #[test]
    fn test_invalid_catalog() {
        assert!(matches!(
            JsonQuestDirectory::from_json("{\"quests\": 3}"),
            Err(QuestError::InvalidCatalog(_))
        ));
        let dup = r#"{"quests": [
            {"quest": {"id": 1, "title": "a", "status": "active", "access_level": "public", "owner": {"id": 1, "name": "x"}}},
            {"quest": {"id": 1, "title": "b", "status": "active", "access_level": "public", "owner": {"id": 1, "name": "x"}}}
        ]}"#;
        assert!(matches!(JsonQuestDirectory::from_json(dup), Err(QuestError::InvalidCatalog(_))));
        assert!(matches!(
            JsonQuestDirectory::from_path(Path::new("/nonexistent/catalog.json")),
            Err(QuestError::DirectoryUnavailable(_))
        ));
    }
}
