//! Async plumbing around [`SessionCore`].
//!
//! Sensor streams and user input arrive on separate channels and are merged
//! into one serial task that owns the session. UI effects leave through an
//! unbounded channel in the order they were produced.

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{QuestError, QuestResult};
use crate::live_status::LiveStatus;
use crate::model::EntityId;
use crate::session::{LocationInput, SessionCore, SessionInput, TrackingInput, UserInput};
use crate::ui::{apply_effect, Presenter, RenderSurface, UiEffect};

const LOCATION_CHANNEL_CAPACITY: usize = 100;
const TRACKING_CHANNEL_CAPACITY: usize = 500;
const USER_CHANNEL_CAPACITY: usize = 16;

#[derive(Serialize, Clone, Debug)]
pub struct SessionSummary {
    pub quest_id: EntityId,
    pub finished: bool,
    pub inputs_handled: u64,
    pub effects_dispatched: u64,
    pub status: LiveStatus,
}

enum Inputs {
    Live {
        location_rx: mpsc::Receiver<LocationInput>,
        tracking_rx: mpsc::Receiver<TrackingInput>,
        user_rx: mpsc::Receiver<UserInput>,
    },
    Ordered(mpsc::Receiver<SessionInput>),
}

impl Inputs {
    /// Next input from any source; `None` once every source has closed.
    async fn next(&mut self) -> Option<SessionInput> {
        match self {
            Inputs::Live {
                location_rx,
                tracking_rx,
                user_rx,
            } => tokio::select! {
                Some(input) = location_rx.recv() => Some(SessionInput::Location(input)),
                Some(input) = tracking_rx.recv() => Some(SessionInput::Tracking(input)),
                Some(input) = user_rx.recv() => Some(SessionInput::User(input)),
                else => None,
            },
            Inputs::Ordered(rx) => rx.recv().await,
        }
    }
}

/// Senders for a live session with independent sources.
pub struct SessionHandle {
    pub location_tx: mpsc::Sender<LocationInput>,
    pub tracking_tx: mpsc::Sender<TrackingInput>,
    pub user_tx: mpsc::Sender<UserInput>,
    task: JoinHandle<SessionSummary>,
}

impl SessionHandle {
    /// Close every input and wait for the session task to drain.
    pub async fn finish(self) -> QuestResult<SessionSummary> {
        let SessionHandle {
            location_tx,
            tracking_tx,
            user_tx,
            task,
        } = self;
        drop(location_tx);
        drop(tracking_tx);
        drop(user_tx);
        task.await
            .map_err(|e| QuestError::SessionAborted(e.to_string()))
    }
}

/// Sender for a session fed from one totally ordered timeline.
pub struct OrderedSessionHandle {
    pub input_tx: mpsc::Sender<SessionInput>,
    task: JoinHandle<SessionSummary>,
}

impl OrderedSessionHandle {
    pub async fn finish(self) -> QuestResult<SessionSummary> {
        let OrderedSessionHandle { input_tx, task } = self;
        drop(input_tx);
        task.await
            .map_err(|e| QuestError::SessionAborted(e.to_string()))
    }
}

pub fn spawn_session(core: SessionCore, ui_tx: mpsc::UnboundedSender<UiEffect>) -> SessionHandle {
    let (location_tx, location_rx) = mpsc::channel(LOCATION_CHANNEL_CAPACITY);
    let (tracking_tx, tracking_rx) = mpsc::channel(TRACKING_CHANNEL_CAPACITY);
    let (user_tx, user_rx) = mpsc::channel(USER_CHANNEL_CAPACITY);

    let inputs = Inputs::Live {
        location_rx,
        tracking_rx,
        user_rx,
    };
    let task = tokio::spawn(drive(core, inputs, ui_tx));

    SessionHandle {
        location_tx,
        tracking_tx,
        user_tx,
        task,
    }
}

pub fn spawn_ordered_session(
    core: SessionCore,
    ui_tx: mpsc::UnboundedSender<UiEffect>,
) -> OrderedSessionHandle {
    let (input_tx, input_rx) = mpsc::channel(TRACKING_CHANNEL_CAPACITY);
    let task = tokio::spawn(drive(core, Inputs::Ordered(input_rx), ui_tx));
    OrderedSessionHandle { input_tx, task }
}

async fn drive(
    mut core: SessionCore,
    mut inputs: Inputs,
    ui_tx: mpsc::UnboundedSender<UiEffect>,
) -> SessionSummary {
    let mut inputs_handled = 0u64;
    let mut effects_dispatched = 0u64;
    let mut ui_closed = false;

    let mut dispatch = |effects: Vec<UiEffect>| {
        for effect in effects {
            effects_dispatched += 1;
            if ui_closed {
                continue;
            }
            if ui_tx.send(effect).is_err() {
                log::warn!("[RUNTIME] UI channel closed, effects are dropped from now on");
                ui_closed = true;
            }
        }
    };

    dispatch(core.start());

    while let Some(input) = inputs.next().await {
        inputs_handled += 1;
        dispatch(core.handle(input));
    }

    log::info!(
        "[RUNTIME] inputs closed after {} events, finished={}",
        inputs_handled,
        core.is_finished()
    );

    SessionSummary {
        quest_id: core.quest().id,
        finished: core.is_finished(),
        inputs_handled,
        effects_dispatched,
        status: core.status(),
    }
}

/// Apply effects on the UI context until the session side hangs up.
/// Returns the number of effects applied.
pub async fn run_ui<R, P>(
    mut rx: mpsc::UnboundedReceiver<UiEffect>,
    surface: &mut R,
    presenter: &mut P,
) -> u64
where
    R: RenderSurface + ?Sized,
    P: Presenter + ?Sized,
{
    let mut applied = 0u64;
    while let Some(effect) = rx.recv().await {
        log::debug!("[UI] {}", effect.kind());
        apply_effect(&effect, surface, presenter);
        applied += 1;
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::model::{AccessLevel, Quest, QuestStatus, Task, TaskPosition, User};
    use crate::session::SessionConfig;
    use crate::types::{GeoCoordinate, LocationFix};
    use crate::ui::RecordingUi;

    fn goal() -> GeoCoordinate {
        GeoCoordinate::new(48.8566, 2.3522)
    }

    fn quest(tasks: Vec<Task>) -> Arc<Quest> {
        Arc::new(Quest {
            id: 7,
            title: "Paris".to_string(),
            status: QuestStatus::Active,
            access_level: AccessLevel::Private,
            owner: User { id: 3, name: "Owner".to_string(), email: String::new() },
            tasks,
        })
    }

    fn fix(timestamp: f64, coordinate: GeoCoordinate) -> LocationFix {
        LocationFix {
            timestamp,
            coordinate,
            heading: None,
            horizontal_accuracy: Some(4.0),
        }
    }

    #[tokio::test]
    async fn test_live_session_reaches_goal() {
        let core = SessionCore::new(quest(vec![Task::location("Tower", goal())]), SessionConfig::default(), false);
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let handle = spawn_session(core, ui_tx);

        let ui = tokio::spawn(async move {
            let mut surface = RecordingUi::default();
            let mut presenter = RecordingUi::default();
            let applied = run_ui(ui_rx, &mut surface, &mut presenter).await;
            (applied, presenter)
        });

        let far = GeoCoordinate::new(goal().latitude + 0.001, goal().longitude);
        handle.location_tx.send(LocationInput::Fix(fix(1.0, far))).await.unwrap();
        handle.location_tx.send(LocationInput::Fix(fix(2.0, goal()))).await.unwrap();
        handle.location_tx.send(LocationInput::Fix(fix(3.0, goal()))).await.unwrap();

        let summary = handle.finish().await.unwrap();
        assert!(summary.finished);
        assert_eq!(summary.inputs_handled, 3);

        let (applied, presenter) = ui.await.unwrap();
        assert_eq!(applied, summary.effects_dispatched);
        assert_eq!(presenter.finished, vec![7]);
    }

    #[tokio::test]
    async fn test_ordered_session_with_hint() {
        let core = SessionCore::new(
            quest(vec![Task::hint("Riddle", "cross the river"), Task::location("Tower", goal())]),
            SessionConfig::default(),
            false,
        );
        let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
        let handle = spawn_ordered_session(core, ui_tx);

        let timeline = vec![
            SessionInput::Location(LocationInput::Fix(fix(1.0, goal()))),
            SessionInput::User(UserInput::HintAcknowledged { task: TaskPosition(0) }),
            SessionInput::User(UserInput::HintAcknowledged { task: TaskPosition(0) }),
            SessionInput::Location(LocationInput::Fix(fix(2.0, goal()))),
        ];
        for input in timeline {
            handle.input_tx.send(input).await.unwrap();
        }
        let summary = handle.finish().await.unwrap();
        assert!(summary.finished);
        assert_eq!(summary.status.tasks_completed, 2);

        let mut effects = Vec::new();
        while let Ok(effect) = ui_rx.try_recv() {
            effects.push(effect);
        }
        let finishes = effects.iter().filter(|e| matches!(e, UiEffect::ShowFinish { .. })).count();
        assert_eq!(finishes, 1);
        assert!(effects.contains(&UiEffect::ShowHint {
            task: TaskPosition(0),
            text: "cross the river".to_string()
        }));
    }
}
