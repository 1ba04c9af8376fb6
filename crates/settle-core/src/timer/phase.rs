//! Per-activity phase state machine.
//!
//! Each activation of an activity gets a fresh machine; restarting means
//! discarding the old machine and building a new one, so no countdown ever
//! survives into a second activation. Phase transitions are driven entirely
//! by [`PhaseMachine::tick`] and the explicit step operations, both of which
//! take the current time from the caller. That keeps every transition
//! deterministic under test.
//!
//! Timed kinds (breathing, focus) transition when their countdown finishes.
//! Step kinds (grounding, journal, reset) hold a countdown purely as a
//! pacing suggestion: when it runs out nothing moves until the user advances.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::countdown::{Countdown, CountdownSignal};
use crate::activity::{
    Activity, ActivityConfig, DEFAULT_REFLECTION_SECS, FREEFORM_JOURNAL_SECS,
};

/// Position within an activity. One closed set across all kinds; breathing
/// distinguishes its two holds internally, both display as "hold".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Inhale,
    HoldIn,
    Exhale,
    HoldOut,
    Step,
    Focus,
    Complete,
}

impl Phase {
    /// Display label. Both holds read "hold".
    pub fn label(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Inhale => "inhale",
            Phase::HoldIn | Phase::HoldOut => "hold",
            Phase::Exhale => "exhale",
            Phase::Step => "step",
            Phase::Focus => "focus",
            Phase::Complete => "complete",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete)
    }
}

/// Serializable position of a machine. Travels inside session snapshots;
/// the live countdown handle itself is transient and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseState {
    pub activity_id: String,
    pub phase: Phase,
    /// Breathing: 0-based cycle. Step kinds: 0-based step index. Focus: 0.
    pub cycle_or_step: u32,
    /// Seconds left on the phase countdown at capture time.
    pub countdown_remaining: u32,
}

/// Raw transition signals. The session controller maps these onto the
/// public event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    Entered {
        phase: Phase,
        cycle_or_step: u32,
        countdown_secs: u32,
    },
    Completed,
}

/// Everything a screen needs to draw the current phase. Raw positions only;
/// copy and formatting live above the core.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseDescriptor<'a> {
    pub phase: Phase,
    pub cycle_or_step: u32,
    /// Cycle count (breathing), step count (step kinds), or 1 (focus).
    pub total: u32,
    pub countdown_remaining: u32,
    /// Current instruction or prompt, for kinds that carry one.
    pub instruction: Option<&'a str>,
}

/// Drives one activity through its phases.
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    activity: Activity,
    phase: Phase,
    cycle_or_step: u32,
    countdown: Option<Countdown>,
    /// Remaining seconds held while paused; the countdown itself is gone.
    held_remaining: Option<u32>,
    paused: bool,
    completion_emitted: bool,
}

/// Scale a base duration by the adaptive pacing factor, keeping at least
/// one second so a phase can never vanish.
fn scale_secs(base: u32, pacing: f32) -> u32 {
    ((base as f32 * pacing).round() as u32).max(1)
}

impl PhaseMachine {
    pub fn new(activity: Activity) -> Self {
        Self {
            activity,
            phase: Phase::Idle,
            cycle_or_step: 0,
            countdown: None,
            held_remaining: None,
            paused: false,
            completion_emitted: false,
        }
    }

    /// Rebuild from a persisted position. The machine comes back paused with
    /// its remaining seconds held, so nothing runs until the user resumes.
    pub fn from_state(activity: Activity, state: &PhaseState) -> Self {
        let held = (state.phase != Phase::Idle && state.phase != Phase::Complete)
            .then_some(state.countdown_remaining);
        Self {
            activity,
            phase: state.phase,
            cycle_or_step: state.cycle_or_step,
            countdown: None,
            held_remaining: held,
            paused: true,
            completion_emitted: state.phase == Phase::Complete,
        }
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Seconds left on the current phase, live or held.
    pub fn countdown_remaining(&self) -> u32 {
        if let Some(countdown) = &self.countdown {
            return countdown.remaining_secs();
        }
        self.held_remaining.unwrap_or(0)
    }

    /// True when a step countdown ran out but the step was not advanced.
    /// Step countdowns are suggestions; expiry never moves the machine.
    ///
    /// A countdown that expired before a snapshot comes back as no countdown
    /// at all once resumed, which still counts as elapsed here.
    pub fn advisory_elapsed(&self) -> bool {
        if self.phase != Phase::Step {
            return false;
        }
        match &self.countdown {
            Some(countdown) => countdown.is_finished(),
            None => !self.paused && self.held_remaining.is_none(),
        }
    }

    /// Enter the first phase. No-op unless the machine is idle.
    pub fn start(&mut self, pacing: f32, now: DateTime<Utc>) -> Vec<PhaseEvent> {
        if self.phase != Phase::Idle {
            return Vec::new();
        }
        match self.activity.config {
            ActivityConfig::Breathing { inhale, .. } => {
                vec![self.enter(Phase::Inhale, 0, inhale, pacing, now)]
            }
            ActivityConfig::Focus { .. } => {
                let secs = self.activity.duration_secs;
                vec![self.enter(Phase::Focus, 0, secs, pacing, now)]
            }
            _ => {
                if self.step_count() == 0 {
                    self.complete()
                } else {
                    let secs = self.step_secs(0);
                    vec![self.enter(Phase::Step, 0, secs, pacing, now)]
                }
            }
        }
    }

    /// Flush elapsed time and run any transitions it causes.
    pub fn tick(&mut self, pacing: f32, now: DateTime<Utc>) -> Vec<PhaseEvent> {
        if self.paused || self.phase == Phase::Idle || self.phase == Phase::Complete {
            return Vec::new();
        }
        let Some(signal) = self.countdown.as_mut().and_then(|c| c.tick(now)) else {
            return Vec::new();
        };
        match signal {
            CountdownSignal::Elapsed { .. } => Vec::new(),
            CountdownSignal::Finished => match self.phase {
                Phase::Focus => self.complete(),
                // advisory expiry: hold position until the user advances
                Phase::Step => Vec::new(),
                _ => self.advance_breathing(pacing, now),
            },
        }
    }

    /// Move a step-based activity to its next step, or complete it from the
    /// last step. No-op for timed kinds.
    pub fn advance_step(&mut self, pacing: f32, now: DateTime<Utc>) -> Vec<PhaseEvent> {
        if self.phase != Phase::Step {
            return Vec::new();
        }
        let next = self.cycle_or_step + 1;
        if next < self.step_count() {
            let secs = self.step_secs(next);
            vec![self.enter(Phase::Step, next, secs, pacing, now)]
        } else {
            self.complete()
        }
    }

    /// Hold the current countdown's remaining seconds and stop the clock.
    pub fn pause(&mut self) {
        if self.paused || self.phase == Phase::Complete {
            return;
        }
        if let Some(countdown) = self.countdown.as_mut() {
            let remaining = countdown.remaining_secs();
            countdown.cancel();
            self.held_remaining = Some(remaining);
        }
        self.countdown = None;
        self.paused = true;
    }

    /// Restart the clock from the held remainder. An expired advisory
    /// countdown (zero held) stays expired rather than being re-armed.
    pub fn resume(&mut self, now: DateTime<Utc>) {
        if !self.paused {
            return;
        }
        self.paused = false;
        if let Some(held) = self.held_remaining.take() {
            if held > 0 {
                self.countdown = Some(Countdown::start(held, now));
            }
        }
    }

    /// Drop any live countdown without completing. Used on abandon.
    pub fn cancel(&mut self) {
        if let Some(countdown) = self.countdown.as_mut() {
            countdown.cancel();
        }
        self.countdown = None;
        self.held_remaining = None;
    }

    pub fn descriptor(&self) -> PhaseDescriptor<'_> {
        let total = match self.activity.config {
            ActivityConfig::Breathing { cycles, .. } => cycles,
            ActivityConfig::Focus { .. } => 1,
            _ => self.step_count(),
        };
        PhaseDescriptor {
            phase: self.phase,
            cycle_or_step: self.cycle_or_step,
            total,
            countdown_remaining: self.countdown_remaining(),
            instruction: if self.phase == Phase::Step {
                self.step_instruction(self.cycle_or_step)
            } else {
                None
            },
        }
    }

    /// Capture the serializable position.
    pub fn state(&self) -> PhaseState {
        PhaseState {
            activity_id: self.activity.id.clone(),
            phase: self.phase,
            cycle_or_step: self.cycle_or_step,
            countdown_remaining: self.countdown_remaining(),
        }
    }

    /// Coarse progress through the activity, 0.0 to 1.0. Display only.
    pub fn progress_fraction(&self) -> f64 {
        match self.phase {
            Phase::Idle => 0.0,
            Phase::Complete => 1.0,
            _ => match self.activity.config {
                ActivityConfig::Breathing { cycles, .. } => {
                    f64::from(self.cycle_or_step) / f64::from(cycles.max(1))
                }
                ActivityConfig::Focus { .. } => {
                    let total = f64::from(self.activity.duration_secs.max(1));
                    (1.0 - f64::from(self.countdown_remaining()) / total).clamp(0.0, 1.0)
                }
                _ => f64::from(self.cycle_or_step) / f64::from(self.step_count().max(1)),
            },
        }
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn step_count(&self) -> u32 {
        match &self.activity.config {
            ActivityConfig::Grounding { steps } => steps.len() as u32,
            // freeform journal is one open-ended step
            ActivityConfig::Journal { prompts, .. } => prompts.len().max(1) as u32,
            ActivityConfig::Reset { steps, .. } => steps.len() as u32,
            _ => 0,
        }
    }

    fn step_secs(&self, index: u32) -> u32 {
        match &self.activity.config {
            ActivityConfig::Grounding { steps } => {
                let len = steps.len().max(1) as u32;
                self.activity.duration_secs.div_ceil(len)
            }
            ActivityConfig::Journal {
                prompts,
                reflection_secs,
                ..
            } => {
                if prompts.is_empty() {
                    FREEFORM_JOURNAL_SECS
                } else {
                    reflection_secs.unwrap_or(DEFAULT_REFLECTION_SECS)
                }
            }
            ActivityConfig::Reset { steps, .. } => steps
                .get(index as usize)
                .map_or(0, |step| step.duration_secs),
            _ => 0,
        }
    }

    fn step_instruction(&self, index: u32) -> Option<&str> {
        match &self.activity.config {
            ActivityConfig::Grounding { steps } => steps.get(index as usize).map(String::as_str),
            ActivityConfig::Journal { prompts, .. } => {
                prompts.get(index as usize).map(String::as_str)
            }
            ActivityConfig::Reset { steps, .. } => {
                steps.get(index as usize).map(|s| s.instruction.as_str())
            }
            _ => None,
        }
    }

    fn enter(
        &mut self,
        phase: Phase,
        position: u32,
        base_secs: u32,
        pacing: f32,
        now: DateTime<Utc>,
    ) -> PhaseEvent {
        self.phase = phase;
        self.cycle_or_step = position;
        if let Some(countdown) = self.countdown.as_mut() {
            countdown.cancel();
        }
        self.countdown = None;
        let secs = scale_secs(base_secs, pacing);
        if self.paused {
            self.held_remaining = Some(secs);
        } else {
            self.held_remaining = None;
            self.countdown = Some(Countdown::start(secs, now));
        }
        debug!(
            activity = %self.activity.id,
            phase = ?phase,
            position,
            secs,
            "phase entered"
        );
        PhaseEvent::Entered {
            phase,
            cycle_or_step: position,
            countdown_secs: secs,
        }
    }

    fn complete(&mut self) -> Vec<PhaseEvent> {
        if let Some(countdown) = self.countdown.as_mut() {
            countdown.cancel();
        }
        self.countdown = None;
        self.held_remaining = None;
        self.phase = Phase::Complete;
        if self.completion_emitted {
            return Vec::new();
        }
        self.completion_emitted = true;
        debug!(activity = %self.activity.id, "activity complete");
        vec![PhaseEvent::Completed]
    }

    fn advance_breathing(&mut self, pacing: f32, now: DateTime<Utc>) -> Vec<PhaseEvent> {
        let (inhale, hold_in, exhale, hold_out, cycles) = match self.activity.config {
            ActivityConfig::Breathing {
                inhale,
                hold_in,
                exhale,
                hold_out,
                cycles,
            } => (inhale, hold_in, exhale, hold_out, cycles),
            _ => return Vec::new(),
        };
        let next = match self.phase {
            Phase::Inhale if hold_in > 0 => Some((Phase::HoldIn, self.cycle_or_step, hold_in)),
            Phase::Inhale => Some((Phase::Exhale, self.cycle_or_step, exhale)),
            Phase::HoldIn => Some((Phase::Exhale, self.cycle_or_step, exhale)),
            Phase::Exhale if hold_out > 0 => Some((Phase::HoldOut, self.cycle_or_step, hold_out)),
            Phase::Exhale | Phase::HoldOut => {
                let next_cycle = self.cycle_or_step + 1;
                (next_cycle < cycles).then_some((Phase::Inhale, next_cycle, inhale))
            }
            _ => None,
        };
        match next {
            Some((phase, cycle, secs)) => vec![self.enter(phase, cycle, secs, pacing, now)],
            None => self.complete(),
        }
    }
}
