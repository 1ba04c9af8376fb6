//! Session queue controller.
//!
//! The single owner of the live session. Every mutation of session state
//! goes through one of the operations here, each of which takes the current
//! time from the caller and returns the events it produced. Hosts drive the
//! controller from their own loop (UI frame ticks, a CLI sleep loop) and
//! persist a snapshot whenever a call returns events.
//!
//! The controller is also the sole trigger point for adaptive check-ins: it
//! reports progress to [`CheckInController`] as part of its transitions and
//! never from anywhere else.

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::activity::Activity;
use crate::checkin::{
    CheckInConfig, CheckInController, CheckInDirective, CheckInResponse, CheckInState,
    ProgressObservation, SessionPhase,
};
use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::library::Library;
use crate::storage::PersistedSnapshot;
use crate::timer::{Phase, PhaseDescriptor, PhaseEvent, PhaseMachine};

use super::model::{Session, SessionMode, SessionStatus};

fn map_phase_event(activity: &Activity, index: usize, raw: PhaseEvent, at: DateTime<Utc>) -> Event {
    match raw {
        PhaseEvent::Entered {
            phase,
            cycle_or_step,
            countdown_secs,
        } => Event::PhaseChanged {
            activity_id: activity.id.clone(),
            phase,
            cycle_or_step,
            countdown_secs,
            at,
        },
        PhaseEvent::Completed => Event::ActivityCompleted {
            activity_id: activity.id.clone(),
            kind: activity.kind(),
            index,
            at,
        },
    }
}

fn activity_started(activity: &Activity, index: usize, at: DateTime<Utc>) -> Event {
    Event::ActivityStarted {
        activity_id: activity.id.clone(),
        kind: activity.kind(),
        index,
        at,
    }
}

/// Orchestrates one session at a time.
#[derive(Debug)]
pub struct SessionController {
    session: Option<Session>,
    machine: Option<PhaseMachine>,
    check_in: CheckInController,
}

impl SessionController {
    pub fn new(check_in_config: CheckInConfig) -> Self {
        Self {
            session: None,
            machine: None,
            check_in: CheckInController::new(check_in_config),
        }
    }

    // ── Read-only projections ────────────────────────────────────────────

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn status(&self) -> Option<SessionStatus> {
        self.session.as_ref().map(|s| s.status)
    }

    pub fn current_activity(&self) -> Option<&Activity> {
        self.machine.as_ref().map(|m| m.activity())
    }

    pub fn descriptor(&self) -> Option<PhaseDescriptor<'_>> {
        self.machine.as_ref().map(|m| m.descriptor())
    }

    pub fn check_in_state(&self) -> &CheckInState {
        self.check_in.state()
    }

    pub fn pacing(&self) -> f32 {
        self.check_in.pacing()
    }

    /// True while the current activity's phase machine has finished and the
    /// queue is waiting on an explicit `advance`.
    pub fn activity_complete(&self) -> bool {
        self.machine.as_ref().is_some_and(|m| m.is_complete())
    }

    /// True while a step countdown has expired without being advanced.
    pub fn advisory_elapsed(&self) -> bool {
        self.machine.as_ref().is_some_and(|m| m.advisory_elapsed())
    }

    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        self.session
            .as_ref()
            .map_or(0, |s| (now - s.started_at).num_seconds().max(0) as u64)
    }

    pub fn estimated_total_secs(&self) -> u64 {
        self.session.as_ref().map_or(0, Session::estimated_total_secs)
    }

    /// Overall progress across the queue, 0.0 to 1.0. Coarse, display only.
    pub fn progress_fraction(&self) -> f64 {
        let Some(session) = &self.session else {
            return 0.0;
        };
        if session.status == SessionStatus::Completed {
            return 1.0;
        }
        let len = session.queue.len().max(1) as f64;
        let intra = self.machine.as_ref().map_or(0.0, PhaseMachine::progress_fraction);
        ((session.current_index as f64) + intra) / len
    }

    fn in_flight(&self) -> bool {
        matches!(
            self.status(),
            Some(SessionStatus::Active | SessionStatus::Paused)
        )
    }

    // ── Operations ───────────────────────────────────────────────────────

    /// Begin a session over a non-empty queue. Fails while another session
    /// is active or paused; a finished session may be replaced freely.
    pub fn start(
        &mut self,
        mode: SessionMode,
        queue: Vec<Activity>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        if self.in_flight() {
            return Err(CoreError::SessionAlreadyActive);
        }
        let first = queue.first().cloned().ok_or(CoreError::EmptyQueue)?;
        self.check_in.reset();

        let session = Session {
            id: Uuid::new_v4().to_string(),
            mode,
            queue,
            current_index: 0,
            started_at: now,
            status: SessionStatus::Active,
        };
        debug!(
            session = %session.id,
            mode = session.mode.label(),
            activities = session.queue.len(),
            "session started"
        );

        let mut events = vec![Event::SessionStarted {
            session_id: session.id.clone(),
            mode: session.mode.clone(),
            activities: session.queue.len(),
            at: now,
        }];
        let mut machine = PhaseMachine::new(first);
        events.push(activity_started(machine.activity(), 0, now));
        let raw = machine.start(self.check_in.pacing(), now);
        for r in raw {
            events.push(map_phase_event(machine.activity(), 0, r, now));
        }

        self.machine = Some(machine);
        self.session = Some(session);
        self.observe_check_in(now, &mut events);
        Ok(events)
    }

    /// Flush elapsed time through the live countdown. Quiet while paused or
    /// when nothing changed; per-second progress is visible through the
    /// descriptor, not the event stream.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        if self.status() != Some(SessionStatus::Active) {
            return Vec::new();
        }
        let pacing = self.check_in.pacing();
        let (raw, ticked) = match self.machine.as_mut() {
            Some(machine) => {
                let before = machine.countdown_remaining();
                let raw = machine.tick(pacing, now);
                let ticked = !raw.is_empty() || machine.countdown_remaining() != before;
                (raw, ticked)
            }
            None => return Vec::new(),
        };
        if !ticked {
            return Vec::new();
        }
        let mut events = self.map_raw(raw, now);
        self.observe_check_in(now, &mut events);
        events
    }

    /// User-driven advancement within a step-based activity.
    pub fn advance_step(&mut self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        if self.status() != Some(SessionStatus::Active) {
            return Err(CoreError::NoActiveSession);
        }
        let pacing = self.check_in.pacing();
        let raw = match self.machine.as_mut() {
            Some(machine) => machine.advance_step(pacing, now),
            None => Vec::new(),
        };
        let mut events = self.map_raw(raw, now);
        self.observe_check_in(now, &mut events);
        Ok(events)
    }

    /// Move the queue past a completed activity, or complete the session
    /// from its last activity. Rejected until the phase machine finishes.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        if self.status() != Some(SessionStatus::Active) {
            return Err(CoreError::NoActiveSession);
        }
        if !self.activity_complete() {
            return Err(CoreError::PhaseNotComplete);
        }
        let pacing = self.check_in.pacing();
        let Some(session) = self.session.as_mut() else {
            return Err(CoreError::NoActiveSession);
        };

        if session.is_last_activity() {
            session.status = SessionStatus::Completed;
            let session_id = session.id.clone();
            self.machine = None;
            debug!(session = %session_id, "session completed");
            return Ok(vec![Event::SessionCompleted {
                session_id,
                at: now,
            }]);
        }

        session.current_index += 1;
        let index = session.current_index;
        let next = session.queue[index].clone();
        let mut machine = PhaseMachine::new(next);
        let mut events = vec![activity_started(machine.activity(), index, now)];
        let raw = machine.start(pacing, now);
        for r in raw {
            events.push(map_phase_event(machine.activity(), index, r, now));
        }
        self.machine = Some(machine);
        self.observe_check_in(now, &mut events);
        Ok(events)
    }

    /// Hold all countdowns. Idempotent while paused.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let Some(session) = self.session.as_mut() else {
            return Err(CoreError::NoActiveSession);
        };
        match session.status {
            SessionStatus::Active => {
                session.status = SessionStatus::Paused;
                let id = session.id.clone();
                if let Some(machine) = self.machine.as_mut() {
                    machine.pause();
                }
                debug!(session = %id, "session paused");
                Ok(vec![Event::SessionPaused { at: now }])
            }
            SessionStatus::Paused => Ok(Vec::new()),
            _ => Err(CoreError::NoActiveSession),
        }
    }

    /// Restart held countdowns from their remainders. Also confirms a
    /// freshly restored session, whose machine is held until this call.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let pacing = self.check_in.pacing();
        let Some(session) = self.session.as_mut() else {
            return Err(CoreError::NoActiveSession);
        };
        let resumable = match session.status {
            SessionStatus::Paused => true,
            SessionStatus::Active => self.machine.as_ref().is_some_and(PhaseMachine::is_paused),
            _ => return Err(CoreError::NoActiveSession),
        };
        if !resumable {
            return Ok(Vec::new());
        }
        session.status = SessionStatus::Active;
        let raw = match self.machine.as_mut() {
            Some(machine) => {
                machine.resume(now);
                if machine.phase() == Phase::Idle {
                    machine.start(pacing, now)
                } else {
                    Vec::new()
                }
            }
            None => Vec::new(),
        };
        let mut events = vec![Event::SessionResumed { at: now }];
        events.extend(self.map_raw(raw, now));
        Ok(events)
    }

    /// End the session without finishing the queue. Idempotent; safe in any
    /// state, including when no session exists.
    pub fn abandon(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        if session.status.is_terminal() {
            return Vec::new();
        }
        session.status = SessionStatus::Abandoned;
        let session_id = session.id.clone();
        if let Some(machine) = self.machine.as_mut() {
            machine.cancel();
        }
        self.machine = None;
        debug!(session = %session_id, "session abandoned");
        vec![Event::SessionAbandoned { session_id, at: now }]
    }

    /// Fold a check-in answer into pacing and carry out any session-level
    /// adjustment it requested.
    pub fn respond_to_check_in(
        &mut self,
        response: CheckInResponse,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        if !self.in_flight() {
            return Err(CoreError::NoActiveSession);
        }
        let directive = self.check_in.respond(response);
        let mut events = vec![Event::CheckInApplied {
            pacing: self.check_in.pacing(),
            at: now,
        }];
        match directive {
            Some(CheckInDirective::EndEarly) => events.extend(self.abandon(now)),
            Some(CheckInDirective::TakeBreak) => events.extend(self.pause(now)?),
            None => {}
        }
        Ok(events)
    }

    // ── Persistence ──────────────────────────────────────────────────────

    /// Capture the in-flight session for persistence. `None` when there is
    /// nothing worth saving (no session, or a terminal one).
    pub fn snapshot(&self, now: DateTime<Utc>) -> Option<PersistedSnapshot> {
        let session = self.session.as_ref()?;
        if session.status.is_terminal() {
            return None;
        }
        let machine = self.machine.as_ref()?;
        Some(PersistedSnapshot {
            session: session.clone(),
            phase: machine.state(),
            check_in: self.check_in.state().clone(),
            persisted_at: now,
        })
    }

    /// Rebuild a controller from a snapshot. Every queued activity must
    /// still resolve against the library and the saved position must be
    /// coherent; otherwise the snapshot is stale and the caller discards it.
    ///
    /// The restored session is active with its machine held: countdowns do
    /// not run until the user confirms with [`SessionController::resume`].
    pub fn restore(
        snapshot: PersistedSnapshot,
        library: &Library,
        check_in_config: CheckInConfig,
    ) -> Result<Self> {
        let PersistedSnapshot {
            mut session,
            phase,
            check_in,
            ..
        } = snapshot;

        if session.status.is_terminal() {
            return Err(CoreError::StaleSnapshot {
                reason: "session already finished".into(),
            });
        }
        for activity in &session.queue {
            if !library.resolves(activity) {
                return Err(CoreError::StaleSnapshot {
                    reason: format!("activity '{}' no longer resolves", activity.id),
                });
            }
        }
        let current = session
            .current_activity()
            .filter(|a| a.id == phase.activity_id)
            .cloned()
            .ok_or_else(|| CoreError::StaleSnapshot {
                reason: "saved position does not match the queue".into(),
            })?;

        session.status = SessionStatus::Active;
        let machine = PhaseMachine::from_state(current, &phase);
        debug!(
            session = %session.id,
            index = session.current_index,
            "session restored, timers held until resume"
        );
        Ok(Self {
            session: Some(session),
            machine: Some(machine),
            check_in: CheckInController::with_state(check_in_config, check_in),
        })
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn map_raw(&self, raw: Vec<PhaseEvent>, at: DateTime<Utc>) -> Vec<Event> {
        let (Some(machine), Some(session)) = (self.machine.as_ref(), self.session.as_ref()) else {
            return Vec::new();
        };
        raw.into_iter()
            .map(|r| map_phase_event(machine.activity(), session.current_index, r, at))
            .collect()
    }

    fn observe_check_in(&mut self, now: DateTime<Utc>, events: &mut Vec<Event>) {
        if self.status() != Some(SessionStatus::Active) {
            return;
        }
        let elapsed = self.elapsed_secs(now);
        let estimated = self.estimated_total_secs();
        let progress = self.progress_fraction();
        let observation = ProgressObservation {
            elapsed_secs: elapsed,
            estimated_total_secs: estimated,
            session_phase: SessionPhase::classify(progress),
        };
        if self.check_in.observe(observation, now) {
            events.push(Event::CheckInTriggered {
                elapsed_secs: elapsed,
                progress,
                at: now,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkin::{Adjustment, Feeling};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
    }

    fn controller() -> SessionController {
        SessionController::new(CheckInConfig::default())
    }

    fn single_breathing() -> (SessionController, Vec<Event>) {
        let library = Library::builtin();
        let activity = Activity::from_breathing(&library, "box").unwrap();
        let mut c = controller();
        let events = c.start(SessionMode::Single, vec![activity], t0()).unwrap();
        (c, events)
    }

    #[test]
    fn start_emits_session_activity_and_phase_events() {
        let (_, events) = single_breathing();
        assert!(matches!(events[0], Event::SessionStarted { .. }));
        assert!(matches!(events[1], Event::ActivityStarted { index: 0, .. }));
        assert!(matches!(
            events[2],
            Event::PhaseChanged {
                phase: Phase::Inhale,
                ..
            }
        ));
    }

    #[test]
    fn a_second_start_is_rejected_while_in_flight() {
        let (mut c, _) = single_breathing();
        let library = Library::builtin();
        let again = Activity::from_breathing(&library, "box").unwrap();
        let err = c
            .start(SessionMode::Single, vec![again.clone()], t0())
            .unwrap_err();
        assert!(matches!(err, CoreError::SessionAlreadyActive));

        // still rejected while paused
        c.pause(t0() + Duration::seconds(1)).unwrap();
        let err = c
            .start(SessionMode::Single, vec![again], t0())
            .unwrap_err();
        assert!(matches!(err, CoreError::SessionAlreadyActive));
    }

    #[test]
    fn start_requires_a_nonempty_queue() {
        let mut c = controller();
        let err = c.start(SessionMode::Sos, Vec::new(), t0()).unwrap_err();
        assert!(matches!(err, CoreError::EmptyQueue));
    }

    #[test]
    fn advance_is_rejected_until_phases_finish() {
        let (mut c, _) = single_breathing();
        let err = c.advance(t0() + Duration::seconds(1)).unwrap_err();
        assert!(matches!(err, CoreError::PhaseNotComplete));
    }

    #[test]
    fn completing_the_last_activity_completes_the_session() {
        let (mut c, _) = single_breathing();
        let mut now = t0();
        // box: 4 phases x 4s x 4 cycles
        for _ in 0..16 {
            now += Duration::seconds(4);
            c.tick(now);
        }
        assert!(c.activity_complete());
        let events = c.advance(now).unwrap();
        assert!(matches!(events[0], Event::SessionCompleted { .. }));
        assert_eq!(c.status(), Some(SessionStatus::Completed));
        assert!((c.progress_fraction() - 1.0).abs() < f64::EPSILON);

        // terminal sessions never advance further
        assert!(matches!(
            c.advance(now).unwrap_err(),
            CoreError::NoActiveSession
        ));

        // but a new session may start
        let library = Library::builtin();
        let next = Activity::from_focus(&library, "gentle-start").unwrap();
        assert!(c.start(SessionMode::Single, vec![next], now).is_ok());
    }

    #[test]
    fn advance_moves_through_a_multi_activity_queue() {
        let library = Library::builtin();
        let queue = vec![
            Activity::from_breathing(&library, "coherent").unwrap(),
            Activity::from_grounding(&library, "name-it").unwrap(),
        ];
        let mut c = controller();
        c.start(
            SessionMode::Ritual {
                ritual_id: "test".into(),
            },
            queue,
            t0(),
        )
        .unwrap();

        // coherent: 6 cycles of 5s + 5s
        let mut now = t0();
        for _ in 0..12 {
            now += Duration::seconds(5);
            c.tick(now);
        }
        assert!(c.activity_complete());
        let events = c.advance(now).unwrap();
        assert!(matches!(
            events[0],
            Event::ActivityStarted { index: 1, .. }
        ));
        assert_eq!(c.session().unwrap().current_index, 1);
        assert_eq!(c.status(), Some(SessionStatus::Active));
    }

    #[test]
    fn pause_freezes_the_clock_and_resume_restarts_it() {
        let library = Library::builtin();
        let activity = Activity::from_focus(&library, "gentle-start").unwrap();
        let mut c = controller();
        c.start(SessionMode::Single, vec![activity], t0()).unwrap();
        c.tick(t0() + Duration::seconds(100));

        let paused = c.pause(t0() + Duration::seconds(100)).unwrap();
        assert!(matches!(paused[0], Event::SessionPaused { .. }));
        assert_eq!(c.status(), Some(SessionStatus::Paused));
        assert!(c.tick(t0() + Duration::seconds(400)).is_empty());

        // idempotent pause
        assert!(c.pause(t0() + Duration::seconds(401)).unwrap().is_empty());

        let resumed = c.resume(t0() + Duration::seconds(500)).unwrap();
        assert!(matches!(resumed[0], Event::SessionResumed { .. }));
        c.tick(t0() + Duration::seconds(600));
        let descriptor = c.descriptor().unwrap();
        // 100s before the pause, 100s after
        assert_eq!(descriptor.countdown_remaining, 400);
    }

    #[test]
    fn abandon_is_idempotent_and_safe_without_a_session() {
        let mut c = controller();
        assert!(c.abandon(t0()).is_empty());

        let (mut c, _) = single_breathing();
        let first = c.abandon(t0() + Duration::seconds(2));
        assert!(matches!(first[0], Event::SessionAbandoned { .. }));
        assert_eq!(c.status(), Some(SessionStatus::Abandoned));
        assert!(c.abandon(t0() + Duration::seconds(3)).is_empty());
    }

    #[test]
    fn respond_end_early_abandons_the_session() {
        let (mut c, _) = single_breathing();
        let events = c
            .respond_to_check_in(
                CheckInResponse {
                    feeling: Feeling::Struggling,
                    wants_to_adjust: true,
                    adjustment: Some(Adjustment::EndEarly),
                },
                t0() + Duration::seconds(5),
            )
            .unwrap();
        assert!(matches!(events[0], Event::CheckInApplied { .. }));
        assert!(matches!(events[1], Event::SessionAbandoned { .. }));
        assert_eq!(c.status(), Some(SessionStatus::Abandoned));
    }

    #[test]
    fn respond_take_break_pauses() {
        let (mut c, _) = single_breathing();
        let events = c
            .respond_to_check_in(
                CheckInResponse {
                    feeling: Feeling::Same,
                    wants_to_adjust: true,
                    adjustment: Some(Adjustment::TakeBreak),
                },
                t0() + Duration::seconds(5),
            )
            .unwrap();
        assert!(matches!(events[1], Event::SessionPaused { .. }));
        assert_eq!(c.status(), Some(SessionStatus::Paused));
    }

    #[test]
    fn snapshots_only_exist_for_in_flight_sessions() {
        let mut c = controller();
        assert!(c.snapshot(t0()).is_none());

        let library = Library::builtin();
        let activity = Activity::from_breathing(&library, "box").unwrap();
        c.start(SessionMode::Single, vec![activity], t0()).unwrap();
        assert!(c.snapshot(t0() + Duration::seconds(1)).is_some());

        c.abandon(t0() + Duration::seconds(2));
        assert!(c.snapshot(t0() + Duration::seconds(3)).is_none());
    }

    #[test]
    fn pacing_resets_between_sessions() {
        let (mut c, _) = single_breathing();
        c.respond_to_check_in(
            CheckInResponse {
                feeling: Feeling::Struggling,
                wants_to_adjust: false,
                adjustment: None,
            },
            t0() + Duration::seconds(5),
        )
        .unwrap();
        assert!((c.pacing() - 0.8).abs() < 1e-6);
        c.abandon(t0() + Duration::seconds(6));

        let library = Library::builtin();
        let next = Activity::from_breathing(&library, "box").unwrap();
        c.start(SessionMode::Single, vec![next], t0() + Duration::seconds(10))
            .unwrap();
        assert!((c.pacing() - 1.0).abs() < f32::EPSILON);
    }
}
