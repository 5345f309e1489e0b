use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use quest_ar_rs::directory::{JsonQuestDirectory, QuestDirectory};
use quest_ar_rs::marker::DestinationMarker;
use quest_ar_rs::model::{EntityId, TaskPosition};
use quest_ar_rs::runtime::{run_ui, spawn_ordered_session, SessionSummary};
use quest_ar_rs::session::{SessionConfig, SessionCore, SessionInput};
use quest_ar_rs::ui::{Presenter, RecordingUi, RenderSurface};

#[derive(Parser, Debug)]
#[command(name = "quest_replay")]
#[command(about = "Replay a recorded AR quest session through the quest core", long_about = None)]
struct Args {
    /// Quest catalog JSON
    #[arg(long)]
    catalog: PathBuf,

    /// Quest to play, by id
    #[arg(long, conflicts_with = "join_code", required_unless_present = "join_code")]
    quest_id: Option<EntityId>,

    /// Quest to play, by join code
    #[arg(long)]
    join_code: Option<String>,

    /// Recorded session log (.json or .json.gz)
    #[arg(long)]
    session: PathBuf,

    /// Session configuration JSON
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the final live status snapshot here
    #[arg(long)]
    status_out: Option<String>,

    /// Override the arrival radius (metres)
    #[arg(long)]
    arrival_radius: Option<f64>,

    /// Replay as a device without AR support
    #[arg(long, default_value_t = false)]
    no_ar: bool,
}

#[derive(Deserialize)]
struct SessionLog {
    #[serde(default)]
    ar_supported: Option<bool>,
    events: Vec<SessionInput>,
}

#[derive(Serialize)]
struct ReplayOutput<'a> {
    summary: &'a SessionSummary,
    surface: &'a RecordingUi,
    presenter: &'a RecordingUi,
}

/// Console render surface: prints marker lifecycle and keeps a record.
#[derive(Default)]
struct ConsoleSurface {
    record: RecordingUi,
}

/// Console presenter: prints user-facing text and keeps a record.
#[derive(Default)]
struct ConsolePresenter {
    record: RecordingUi,
}

impl RenderSurface for ConsoleSurface {
    fn add_marker(&mut self, marker: &DestinationMarker) {
        println!("[{}] marker + {} (task {})", ts_now(), marker.identifier, marker.task);
        self.record.add_marker(marker);
    }

    fn update_marker(&mut self, marker: &DestinationMarker) {
        let p = marker.render_position();
        log::debug!(
            "marker {} at ({:.2}, {:.2}, {:.2}) scale {:.2}",
            marker.identifier,
            p.x,
            p.y,
            p.z,
            marker.scale
        );
        self.record.update_marker(marker);
    }

    fn remove_marker(&mut self, identifier: &str) {
        println!("[{}] marker - {}", ts_now(), identifier);
        self.record.remove_marker(identifier);
    }

    fn relaunch_tracking(&mut self, reset: bool) {
        println!("[{}] relaunch tracking (reset={})", ts_now(), reset);
        self.record.relaunch_tracking(reset);
    }
}

impl Presenter for ConsolePresenter {
    fn show_message(&mut self, text: &str) {
        println!("[{}] message: {}", ts_now(), text);
        self.record.show_message(text);
    }

    fn show_distance(&mut self, metres: f64) {
        log::debug!("distance {:.1} m", metres);
        self.record.show_distance(metres);
    }

    fn show_accuracy(&mut self, metres: f64) {
        log::debug!("accuracy {:.3} m", metres);
        self.record.show_accuracy(metres);
    }

    fn show_hint(&mut self, task: TaskPosition, text: &str) {
        println!("[{}] hint {}: {}", ts_now(), task, text);
        self.record.show_hint(task, text);
    }

    fn set_next_enabled(&mut self, enabled: bool) {
        self.record.set_next_enabled(enabled);
    }

    fn show_finish(&mut self, quest_id: EntityId) {
        println!("[{}] quest {} finished", ts_now(), quest_id);
        self.record.show_finish(quest_id);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let directory = JsonQuestDirectory::from_path(&args.catalog)?;
    let mut quest = match (&args.quest_id, &args.join_code) {
        (Some(id), _) => directory.quest(*id)?,
        (None, Some(code)) => directory.join_by_code(code)?,
        (None, None) => anyhow::bail!("either --quest-id or --join-code is required"),
    };
    if quest.tasks.is_empty() {
        quest.tasks = directory.load_tasks(quest.id)?;
    }

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => SessionConfig::default(),
    };
    if let Some(radius) = args.arrival_radius {
        config.arrival_radius_m = radius;
    }

    let log_file = load_log(&args.session)
        .with_context(|| format!("reading session log {}", args.session.display()))?;
    let ar_supported = !args.no_ar && log_file.ar_supported.unwrap_or(true);

    println!("[{}] Quest Replay Starting", ts_now());
    println!("  Quest: #{} '{}' ({} tasks)", quest.id, quest.title, quest.tasks.len());
    println!("  Events: {}", log_file.events.len());
    println!("  AR: {}", ar_supported);
    println!("  Arrival radius: {:.1} m", config.arrival_radius_m);

    let core = SessionCore::new(Arc::new(quest), config, ar_supported);
    let (ui_tx, ui_rx) = mpsc::unbounded_channel();
    let handle = spawn_ordered_session(core, ui_tx);

    let ui_task = tokio::spawn(async move {
        let mut surface = ConsoleSurface::default();
        let mut presenter = ConsolePresenter::default();
        let applied = run_ui(ui_rx, &mut surface, &mut presenter).await;
        log::info!("applied {} UI effects", applied);
        (surface.record, presenter.record)
    });

    for event in log_file.events {
        handle.input_tx.send(event).await.context("session task stopped early")?;
    }
    let summary = handle.finish().await?;
    let (surface, presenter) = ui_task.await?;

    if let Some(path) = &args.status_out {
        summary
            .status
            .save(path)
            .with_context(|| format!("writing status to {}", path))?;
    }

    let output = ReplayOutput {
        summary: &summary,
        surface: &surface,
        presenter: &presenter,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

fn load_log(path: &Path) -> Result<SessionLog> {
    let file = File::open(path)?;
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        let gz = GzDecoder::new(file);
        let reader = BufReader::new(gz);
        Ok(serde_json::from_reader(reader)?)
    } else {
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

fn load_config(path: &Path) -> Result<SessionConfig> {
    let file = File::open(path).with_context(|| format!("opening config {}", path.display()))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
