//! Session events emitted by the core.
//!
//! Every observable transition produces exactly one `Event`. Hosts poll the
//! returned batches and fan them out to screens, haptics, or logs; the core
//! never waits on a consumer and keeps no subscriber list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::ActivityKind;
use crate::session::SessionMode;
use crate::timer::Phase;

/// A single observable transition.
///
/// Serialized with a `type` tag so hosts can switch on it without inspecting
/// the payload shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A new session began with a fixed queue of activities.
    SessionStarted {
        session_id: String,
        mode: SessionMode,
        activities: usize,
        at: DateTime<Utc>,
    },
    /// The queue moved onto an activity (including the first).
    ActivityStarted {
        activity_id: String,
        kind: ActivityKind,
        index: usize,
        at: DateTime<Utc>,
    },
    /// The activity's phase machine entered a new phase.
    PhaseChanged {
        activity_id: String,
        phase: Phase,
        cycle_or_step: u32,
        countdown_secs: u32,
        at: DateTime<Utc>,
    },
    /// The activity's phase machine reached completion. Fires exactly once
    /// per activation.
    ActivityCompleted {
        activity_id: String,
        kind: ActivityKind,
        index: usize,
        at: DateTime<Utc>,
    },
    /// The queue advanced past its last activity.
    SessionCompleted {
        session_id: String,
        at: DateTime<Utc>,
    },
    /// The session was paused; countdowns are held.
    SessionPaused { at: DateTime<Utc> },
    /// The session resumed; countdowns restart from their held remainders.
    SessionResumed { at: DateTime<Utc> },
    /// The session ended without finishing its queue.
    SessionAbandoned {
        session_id: String,
        at: DateTime<Utc>,
    },
    /// The adaptive check-in wants to ask the user how practice feels.
    CheckInTriggered {
        elapsed_secs: u64,
        progress: f64,
        at: DateTime<Utc>,
    },
    /// A check-in response was folded into the pacing factor.
    CheckInApplied { pacing: f32, at: DateTime<Utc> },
}

impl Event {
    /// Timestamp of the transition, regardless of variant.
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::SessionStarted { at, .. }
            | Event::ActivityStarted { at, .. }
            | Event::PhaseChanged { at, .. }
            | Event::ActivityCompleted { at, .. }
            | Event::SessionCompleted { at, .. }
            | Event::SessionPaused { at }
            | Event::SessionResumed { at }
            | Event::SessionAbandoned { at, .. }
            | Event::CheckInTriggered { at, .. }
            | Event::CheckInApplied { at, .. } => *at,
        }
    }
}
