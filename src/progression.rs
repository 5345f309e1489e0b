//! Quest progression state machine.
//!
//! `NotStarted -> InProgress(position) -> Finished`. The transition function is
//! pure: it takes the current state and an event and returns the next state
//! plus the effects the session must perform. Events carry the task position
//! they refer to, so readings or acknowledgements that arrive late for a task
//! that is no longer current are ignored.

use std::sync::Arc;

use serde::Serialize;

use crate::model::{Goal, Quest, Task, TaskPosition};
use crate::types::GeoCoordinate;

/// A location goal is reached strictly inside this radius (metres).
pub const ARRIVAL_RADIUS_METERS: f64 = 5.0;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressState {
    NotStarted,
    InProgress {
        position: TaskPosition,
        hint_presented: bool,
    },
    Finished,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    Start,
    DistanceMeasured { task: TaskPosition, distance: f64 },
    HintAcknowledged { task: TaskPosition },
}

#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEffect {
    TaskActivated(TaskPosition),
    PlaceMarker { task: TaskPosition, coordinate: GeoCoordinate },
    RemoveMarker,
    ShowHint { task: TaskPosition, text: String },
    EnableNext,
    DisableNext,
    ShowDistance(f64),
    Finished,
}

/// Pure transition: `(state, event) -> (new state, effects)`.
pub fn transition(
    quest: &Quest,
    state: &ProgressState,
    event: &ProgressEvent,
    arrival_radius: f64,
) -> (ProgressState, Vec<ProgressEffect>) {
    match (state, event) {
        (ProgressState::NotStarted, ProgressEvent::Start) => match quest.first_position() {
            Some(first) => enter(quest, first, Vec::new()),
            None => finish(Vec::new()),
        },

        (
            ProgressState::InProgress { position, .. },
            ProgressEvent::DistanceMeasured { task, distance },
        ) if position == task => {
            let is_location = quest
                .task(*position)
                .map_or(false, |t| matches!(t.goal, Goal::Location(_)));
            if !is_location || !distance.is_finite() {
                return unchanged(state);
            }
            let mut effects = vec![ProgressEffect::ShowDistance(*distance)];
            if *distance < arrival_radius {
                log::info!("[QUEST] reached task {} at {:.2} m", position, distance);
                effects.push(ProgressEffect::RemoveMarker);
                advance(quest, *position, effects)
            } else {
                (state.clone(), effects)
            }
        }

        (
            ProgressState::InProgress {
                position,
                hint_presented: true,
            },
            ProgressEvent::HintAcknowledged { task },
        ) if position == task => {
            log::info!("[QUEST] hint {} acknowledged", position);
            advance(quest, *position, vec![ProgressEffect::DisableNext])
        }

        _ => unchanged(state),
    }
}

fn unchanged(state: &ProgressState) -> (ProgressState, Vec<ProgressEffect>) {
    (state.clone(), Vec::new())
}

fn advance(
    quest: &Quest,
    from: TaskPosition,
    effects: Vec<ProgressEffect>,
) -> (ProgressState, Vec<ProgressEffect>) {
    match quest.task_after(from) {
        Some(next) => enter(quest, next, effects),
        None => finish(effects),
    }
}

fn enter(
    quest: &Quest,
    position: TaskPosition,
    mut effects: Vec<ProgressEffect>,
) -> (ProgressState, Vec<ProgressEffect>) {
    let task: &Task = match quest.task(position) {
        Some(task) => task,
        None => return finish(effects),
    };
    effects.push(ProgressEffect::TaskActivated(position));

    match &task.goal {
        Goal::Location(coordinate) => {
            effects.push(ProgressEffect::DisableNext);
            effects.push(ProgressEffect::PlaceMarker {
                task: position,
                coordinate: *coordinate,
            });
            (
                ProgressState::InProgress {
                    position,
                    hint_presented: false,
                },
                effects,
            )
        }
        Goal::Hint(text) => {
            effects.push(ProgressEffect::RemoveMarker);
            effects.push(ProgressEffect::ShowHint {
                task: position,
                text: text.clone(),
            });
            effects.push(ProgressEffect::EnableNext);
            (
                ProgressState::InProgress {
                    position,
                    hint_presented: true,
                },
                effects,
            )
        }
    }
}

fn finish(mut effects: Vec<ProgressEffect>) -> (ProgressState, Vec<ProgressEffect>) {
    effects.push(ProgressEffect::DisableNext);
    effects.push(ProgressEffect::Finished);
    (ProgressState::Finished, effects)
}

/// Owns the progression state of one quest for one play session.
pub struct QuestProgressionEngine {
    quest: Arc<Quest>,
    state: ProgressState,
    arrival_radius: f64,
    finish_notified: bool,
    advance_count: usize,
}

impl QuestProgressionEngine {
    pub fn new(quest: Arc<Quest>, arrival_radius: f64) -> Self {
        Self {
            quest,
            state: ProgressState::NotStarted,
            arrival_radius,
            finish_notified: false,
            advance_count: 0,
        }
    }

    pub fn apply(&mut self, event: ProgressEvent) -> Vec<ProgressEffect> {
        let previous = self.current_position();
        let (next, mut effects) = transition(&self.quest, &self.state, &event, self.arrival_radius);

        if previous.is_some() && self.current_position_of(&next) != previous {
            self.advance_count += 1;
        }

        // Finish notification fires at most once per session.
        if effects.contains(&ProgressEffect::Finished) {
            if self.finish_notified {
                effects.retain(|e| *e != ProgressEffect::Finished);
            } else {
                self.finish_notified = true;
                log::info!("[QUEST] '{}' finished", self.quest.title);
            }
        }

        self.state = next;
        effects
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn quest(&self) -> &Quest {
        &self.quest
    }

    pub fn current_position(&self) -> Option<TaskPosition> {
        self.current_position_of(&self.state)
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.current_position().and_then(|p| self.quest.task(p))
    }

    /// Location goal of the current task, if it has one.
    pub fn current_location_goal(&self) -> Option<(TaskPosition, GeoCoordinate)> {
        let position = self.current_position()?;
        let coordinate = self.quest.task(position)?.location_goal()?;
        Some((position, coordinate))
    }

    pub fn is_finished(&self) -> bool {
        self.state == ProgressState::Finished
    }

    pub fn advance_count(&self) -> usize {
        self.advance_count
    }

    fn current_position_of(&self, state: &ProgressState) -> Option<TaskPosition> {
        match state {
            ProgressState::InProgress { position, .. } => Some(*position),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccessLevel, QuestStatus, User};

    fn quest(tasks: Vec<Task>) -> Arc<Quest> {
        Arc::new(Quest {
            id: 1,
            title: "Old town".to_string(),
            status: QuestStatus::Active,
            access_level: AccessLevel::Public,
            owner: User { id: 1, name: "Owner".to_string(), email: String::new() },
            tasks,
        })
    }

    fn a() -> GeoCoordinate {
        GeoCoordinate::new(50.45, 30.52)
    }

    fn b() -> GeoCoordinate {
        GeoCoordinate::new(50.46, 30.53)
    }

    fn finish_count(effects: &[ProgressEffect]) -> usize {
        effects.iter().filter(|e| **e == ProgressEffect::Finished).count()
    }

    fn measure(engine: &mut QuestProgressionEngine, distance: f64) -> Vec<ProgressEffect> {
        let task = engine.current_position().unwrap_or(TaskPosition(usize::MAX));
        engine.apply(ProgressEvent::DistanceMeasured { task, distance })
    }

    #[test]
    fn test_start_yields_first_task() {
        let mut engine = QuestProgressionEngine::new(
            quest(vec![Task::location("A", a()), Task::hint("H", "go left")]),
            ARRIVAL_RADIUS_METERS,
        );
        let effects = engine.apply(ProgressEvent::Start);

        assert_eq!(engine.current_position(), Some(TaskPosition(0)));
        assert!(effects.contains(&ProgressEffect::PlaceMarker { task: TaskPosition(0), coordinate: a() }));
    }

    #[test]
    fn test_empty_quest_finishes_immediately() {
        let mut engine = QuestProgressionEngine::new(quest(Vec::new()), ARRIVAL_RADIUS_METERS);
        let effects = engine.apply(ProgressEvent::Start);

        assert!(engine.is_finished());
        assert_eq!(finish_count(&effects), 1);
        assert!(engine.apply(ProgressEvent::Start).is_empty());
    }

    #[test]
    fn test_n_advances_reach_finished_once() {
        let tasks: Vec<Task> = (0..4).map(|i| Task::location(&format!("T{}", i), a())).collect();
        let mut engine = QuestProgressionEngine::new(quest(tasks), ARRIVAL_RADIUS_METERS);
        engine.apply(ProgressEvent::Start);

        let mut finished = 0;
        for _ in 0..4 {
            assert!(!engine.is_finished());
            finished += finish_count(&measure(&mut engine, 1.0));
        }
        assert!(engine.is_finished());
        assert_eq!(engine.advance_count(), 4);

        for i in 0..10 {
            finished += finish_count(&engine.apply(ProgressEvent::DistanceMeasured {
                task: TaskPosition(i % 4),
                distance: 0.0,
            }));
            finished += finish_count(&engine.apply(ProgressEvent::HintAcknowledged { task: TaskPosition(i % 4) }));
        }
        assert_eq!(finished, 1);
    }

    #[test]
    fn test_arrival_boundary_is_strict() {
        let mut engine = QuestProgressionEngine::new(
            quest(vec![Task::location("A", a()), Task::location("B", b())]),
            ARRIVAL_RADIUS_METERS,
        );
        engine.apply(ProgressEvent::Start);

        let effects = measure(&mut engine, 5.0);
        assert_eq!(effects, vec![ProgressEffect::ShowDistance(5.0)]);
        assert_eq!(engine.current_position(), Some(TaskPosition(0)));

        measure(&mut engine, 4.999);
        assert_eq!(engine.current_position(), Some(TaskPosition(1)));
    }

    #[test]
    fn test_repeated_acknowledgements_never_double_advance() {
        let mut engine = QuestProgressionEngine::new(
            quest(vec![
                Task::hint("H1", "look up"),
                Task::hint("H2", "look down"),
                Task::location("A", a()),
            ]),
            ARRIVAL_RADIUS_METERS,
        );
        let effects = engine.apply(ProgressEvent::Start);
        assert!(effects.contains(&ProgressEffect::ShowHint { task: TaskPosition(0), text: "look up".to_string() }));
        assert!(effects.contains(&ProgressEffect::EnableNext));

        engine.apply(ProgressEvent::HintAcknowledged { task: TaskPosition(0) });
        assert_eq!(engine.current_position(), Some(TaskPosition(1)));

        // duplicate acknowledgement for the first hint is stale
        let effects = engine.apply(ProgressEvent::HintAcknowledged { task: TaskPosition(0) });
        assert!(effects.is_empty());
        assert_eq!(engine.current_position(), Some(TaskPosition(1)));
    }

    #[test]
    fn test_hint_shown_once_per_arrival() {
        let mut engine = QuestProgressionEngine::new(quest(vec![Task::hint("H", "go left")]), ARRIVAL_RADIUS_METERS);
        let effects = engine.apply(ProgressEvent::Start);
        let shown = effects.iter().filter(|e| matches!(e, ProgressEffect::ShowHint { .. })).count();
        assert_eq!(shown, 1);
        assert_eq!(
            engine.state(),
            &ProgressState::InProgress { position: TaskPosition(0), hint_presented: true }
        );

        // distance readings do nothing on a hint task
        assert!(engine
            .apply(ProgressEvent::DistanceMeasured { task: TaskPosition(0), distance: 0.0 })
            .is_empty());
    }

    #[test]
    fn test_identical_tasks_are_distinct_steps() {
        let mut engine = QuestProgressionEngine::new(
            quest(vec![Task::location("Same", a()), Task::location("Same", a())]),
            ARRIVAL_RADIUS_METERS,
        );
        engine.apply(ProgressEvent::Start);
        measure(&mut engine, 1.0);
        assert_eq!(engine.current_position(), Some(TaskPosition(1)));
        assert!(!engine.is_finished());
        measure(&mut engine, 1.0);
        assert!(engine.is_finished());
    }

    #[test]
    fn test_example_scenario() {
        let mut engine = QuestProgressionEngine::new(
            quest(vec![
                Task::location("A", a()),
                Task::hint("Hint", "go left"),
                Task::location("B", b()),
            ]),
            ARRIVAL_RADIUS_METERS,
        );
        engine.apply(ProgressEvent::Start);

        measure(&mut engine, 20.0);
        assert_eq!(engine.current_position(), Some(TaskPosition(0)));
        measure(&mut engine, 8.0);
        assert_eq!(engine.current_position(), Some(TaskPosition(0)));
        let effects = measure(&mut engine, 4.9);
        assert_eq!(engine.current_position(), Some(TaskPosition(1)));
        assert!(effects.contains(&ProgressEffect::RemoveMarker));

        engine.apply(ProgressEvent::HintAcknowledged { task: TaskPosition(1) });
        assert_eq!(engine.current_position(), Some(TaskPosition(2)));

        let mut finished = finish_count(&measure(&mut engine, 3.0));
        assert!(engine.is_finished());
        for d in [0.0, 0.0, 2.0] {
            finished += finish_count(&engine.apply(ProgressEvent::DistanceMeasured {
                task: TaskPosition(2),
                distance: d,
            }));
        }
        assert_eq!(finished, 1);
    }
}
