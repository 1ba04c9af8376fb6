//! Session lifecycle commands.
//!
//! The CLI is stateless between invocations: every command rebuilds the
//! controller from the saved snapshot, applies one operation, prints the
//! events it produced (one JSON object per line), and saves the result.
//! Restored timers are held, so wall-clock time between invocations never
//! counts against a countdown; `session run` is the foreground loop that
//! actually ticks.

use chrono::{Duration, Utc};
use clap::{Subcommand, ValueEnum};
use serde::Serialize;
use tracing::debug;

use settle_core::timer::PhaseDescriptor;
use settle_core::{
    Activity, Adjustment, CheckInResponse, Config, CoreError, Database, Event, Feeling, Library,
    SessionController, SessionMode, SessionStatus, SnapshotStore,
};

const CURRENT_KEY: &str = "session:current";

#[derive(Subcommand)]
pub enum SessionAction {
    /// Start a single-activity session
    Start {
        /// Activity kind
        #[arg(value_enum)]
        kind: StartKind,
        /// Library id; journal may omit it to freewrite
        id: Option<String>,
    },
    /// Start a ritual session
    Ritual {
        /// Ritual id
        id: String,
    },
    /// Start the SOS sequence
    Sos,
    /// Start one day of a program
    ProgramDay {
        /// Program id
        id: String,
        /// 1-based day number
        day: u32,
    },
    /// Print the saved session state as JSON
    Status,
    /// Advance a step-based activity to its next step
    Step,
    /// Move past a completed activity
    Advance,
    /// Pause the session
    Pause,
    /// Resume a paused or restored session
    Resume,
    /// Resume and tick in the foreground until the session ends
    Run,
    /// Answer a check-in
    Respond {
        #[arg(value_enum)]
        feeling: FeelingArg,
        /// Session-level adjustment to request
        #[arg(long, value_enum)]
        adjust: Option<AdjustArg>,
    },
    /// Abandon the session
    Abandon,
    /// Drop any saved session without emitting events
    Discard,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StartKind {
    Breathing,
    Grounding,
    Reset,
    Focus,
    Journal,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum FeelingArg {
    Better,
    Same,
    Struggling,
}

impl From<FeelingArg> for Feeling {
    fn from(arg: FeelingArg) -> Self {
        match arg {
            FeelingArg::Better => Feeling::Better,
            FeelingArg::Same => Feeling::Same,
            FeelingArg::Struggling => Feeling::Struggling,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum AdjustArg {
    Extend,
    EndEarly,
    TakeBreak,
}

impl From<AdjustArg> for Adjustment {
    fn from(arg: AdjustArg) -> Self {
        match arg {
            AdjustArg::Extend => Adjustment::Extend,
            AdjustArg::EndEarly => Adjustment::EndEarly,
            AdjustArg::TakeBreak => Adjustment::TakeBreak,
        }
    }
}

/// What `session status` prints.
#[derive(Serialize)]
struct StatusView<'a> {
    session_id: &'a str,
    mode: &'a str,
    status: SessionStatus,
    activity_id: Option<&'a str>,
    activity_name: Option<&'a str>,
    activity_index: usize,
    activities: usize,
    phase: Option<PhaseDescriptor<'a>>,
    progress: f64,
    pacing: f32,
    activity_complete: bool,
    check_ins_shown: u32,
}

fn status_view(controller: &SessionController) -> Option<StatusView<'_>> {
    let session = controller.session()?;
    Some(StatusView {
        session_id: &session.id,
        mode: session.mode.label(),
        status: session.status,
        activity_id: controller.current_activity().map(|a| a.id.as_str()),
        activity_name: controller.current_activity().map(|a| a.name.as_str()),
        activity_index: session.current_index,
        activities: session.queue.len(),
        phase: controller.descriptor(),
        progress: controller.progress_fraction(),
        pacing: controller.pacing(),
        activity_complete: controller.activity_complete(),
        check_ins_shown: controller.check_in_state().check_ins_shown,
    })
}

fn required(id: &Option<String>) -> Result<&str, Box<dyn std::error::Error>> {
    id.as_deref()
        .ok_or_else(|| "this kind needs a library id (see `settle library list`)".into())
}

/// Rebuild the controller from the saved snapshot, if any. A snapshot that
/// no longer restores is cleaned up rather than treated as fatal.
fn hydrate(
    db: &Database,
    config: &Config,
) -> Result<Option<SessionController>, Box<dyn std::error::Error>> {
    let Some(key) = db.kv_get(CURRENT_KEY)? else {
        return Ok(None);
    };
    let store = SnapshotStore::new(db);
    let Some(snapshot) = store.load(&key)? else {
        db.kv_delete(CURRENT_KEY)?;
        return Ok(None);
    };
    let library = Library::builtin();
    match SessionController::restore(snapshot, &library, config.check_in_config()) {
        Ok(controller) => Ok(Some(controller)),
        Err(err) => {
            eprintln!("discarding saved session: {err}");
            store.clear(&key)?;
            db.kv_delete(CURRENT_KEY)?;
            Ok(None)
        }
    }
}

/// Save the in-flight session, or clear the slot when it has ended.
fn persist(db: &Database, controller: &SessionController) -> Result<(), Box<dyn std::error::Error>> {
    let store = SnapshotStore::new(db);
    match controller.snapshot(Utc::now()) {
        Some(snapshot) => {
            let key = store.save(&snapshot)?;
            db.kv_set(CURRENT_KEY, &key)?;
        }
        None => {
            if let Some(key) = db.kv_get(CURRENT_KEY)? {
                store.clear(&key)?;
                db.kv_delete(CURRENT_KEY)?;
            }
        }
    }
    Ok(())
}

fn print_events(events: &[Event]) -> Result<(), Box<dyn std::error::Error>> {
    for event in events {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}

/// History rows approximate the start time from the estimated duration;
/// user-paced steps can run longer than the estimate.
fn record_completions(db: &Database, controller: &SessionController, events: &[Event]) {
    let Some(session) = controller.session() else {
        return;
    };
    for event in events {
        if let Event::ActivityCompleted { index, at, .. } = event {
            if let Some(activity) = session.queue.get(*index) {
                let started = *at - Duration::seconds(i64::from(activity.duration_secs));
                if let Err(err) = db.record_activity(activity, started, *at) {
                    eprintln!("failed to record history: {err}");
                }
            }
        }
    }
}

fn start_session(
    db: &Database,
    config: &Config,
    mode: SessionMode,
    queue: Vec<Activity>,
) -> Result<(), Box<dyn std::error::Error>> {
    // a saved snapshot is an in-flight session even though no process runs
    if hydrate(db, config)?.is_some() {
        return Err(CoreError::SessionAlreadyActive.into());
    }
    let mut controller = SessionController::new(config.check_in_config());
    let events = controller.start(mode, queue, Utc::now())?;
    print_events(&events)?;
    persist(db, &controller)?;
    Ok(())
}

fn with_session<F>(db: &Database, config: &Config, op: F) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(&mut SessionController) -> settle_core::Result<Vec<Event>>,
{
    let Some(mut controller) = hydrate(db, config)? else {
        return Err(CoreError::NoActiveSession.into());
    };
    let events = op(&mut controller)?;
    record_completions(db, &controller, &events);
    print_events(&events)?;
    persist(db, &controller)
}

/// Foreground playback: resume, then tick on a short interval until the
/// session leaves the active state.
fn run_loop(db: &Database, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let Some(mut controller) = hydrate(db, config)? else {
        return Err(CoreError::NoActiveSession.into());
    };
    let events = controller.resume(Utc::now())?;
    record_completions(db, &controller, &events);
    print_events(&events)?;
    persist(db, &controller)?;

    let tick = std::time::Duration::from_millis(config.run.tick_interval_ms.max(50));
    let autosave = Duration::seconds(i64::from(config.persistence.autosave_interval_secs.max(1)));
    let mut last_saved = Utc::now();

    loop {
        std::thread::sleep(tick);
        let now = Utc::now();
        let mut events = controller.tick(now);

        if config.run.auto_advance {
            if controller.advisory_elapsed() {
                events.extend(controller.advance_step(now)?);
            }
            if controller.activity_complete() {
                events.extend(controller.advance(now)?);
            }
        } else if controller.activity_complete() || controller.advisory_elapsed() {
            // hand control back for an explicit `step` or `advance`
            record_completions(db, &controller, &events);
            print_events(&events)?;
            persist(db, &controller)?;
            println!("{{\"type\": \"waiting_for_user\"}}");
            return Ok(());
        }

        record_completions(db, &controller, &events);
        print_events(&events)?;

        if controller.status() != Some(SessionStatus::Active) {
            persist(db, &controller)?;
            return Ok(());
        }
        if !events.is_empty() || now - last_saved >= autosave {
            persist(db, &controller)?;
            debug!("session autosaved");
            last_saved = now;
        }
    }
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let config = Config::load_or_default();

    match action {
        SessionAction::Start { kind, id } => {
            let library = Library::builtin();
            let activity = match kind {
                StartKind::Breathing => Activity::from_breathing(&library, required(&id)?)?,
                StartKind::Grounding => Activity::from_grounding(&library, required(&id)?)?,
                StartKind::Reset => Activity::from_reset(&library, required(&id)?)?,
                StartKind::Focus => Activity::from_focus(&library, required(&id)?)?,
                StartKind::Journal => Activity::journal(
                    &library,
                    id.as_deref(),
                    Some(config.journal.reflection_secs),
                )?,
            };
            start_session(&db, &config, SessionMode::Single, vec![activity])
        }
        SessionAction::Ritual { id } => {
            let queue = Library::builtin().ritual_queue(&id)?;
            start_session(&db, &config, SessionMode::Ritual { ritual_id: id }, queue)
        }
        SessionAction::Sos => {
            let queue = Library::builtin().sos_queue()?;
            start_session(&db, &config, SessionMode::Sos, queue)
        }
        SessionAction::ProgramDay { id, day } => {
            let queue = Library::builtin().program_day_queue(&id, day)?;
            start_session(
                &db,
                &config,
                SessionMode::ProgramDay {
                    program_id: id,
                    day,
                },
                queue,
            )
        }
        SessionAction::Status => {
            let controller = hydrate(&db, &config)?;
            match controller.as_ref().and_then(status_view) {
                Some(view) => println!("{}", serde_json::to_string_pretty(&view)?),
                None => println!("{{\"status\": \"none\"}}"),
            }
            Ok(())
        }
        SessionAction::Step => with_session(&db, &config, |c| c.advance_step(Utc::now())),
        SessionAction::Advance => with_session(&db, &config, |c| c.advance(Utc::now())),
        SessionAction::Pause => with_session(&db, &config, |c| c.pause(Utc::now())),
        SessionAction::Resume => with_session(&db, &config, |c| c.resume(Utc::now())),
        SessionAction::Run => run_loop(&db, &config),
        SessionAction::Respond { feeling, adjust } => {
            let response = CheckInResponse {
                feeling: feeling.into(),
                wants_to_adjust: adjust.is_some(),
                adjustment: adjust.map(Into::into),
            };
            with_session(&db, &config, |c| c.respond_to_check_in(response, Utc::now()))
        }
        SessionAction::Abandon => with_session(&db, &config, |c| Ok(c.abandon(Utc::now()))),
        SessionAction::Discard => {
            if let Some(key) = db.kv_get(CURRENT_KEY)? {
                SnapshotStore::new(&db).clear(&key)?;
                db.kv_delete(CURRENT_KEY)?;
            }
            println!("{{\"type\": \"session_discarded\"}}");
            Ok(())
        }
    }
}
