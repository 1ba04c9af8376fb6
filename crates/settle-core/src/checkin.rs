//! Adaptive mid-session check-in.
//!
//! Decides when to ask the user how practice feels and folds the answer
//! back into a pacing factor that scales later phase countdowns. The
//! controller here never watches a clock of its own: the session controller
//! reports progress on its transitions, and the trigger decision is made
//! from those observations alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Bounds for the adaptive pacing factor.
pub const PACING_MIN: f32 = 0.5;
pub const PACING_MAX: f32 = 1.5;

const STRUGGLING_FACTOR: f32 = 0.8;
const EXTEND_FACTOR: f32 = 1.1;

fn clamp_pacing(pacing: f32) -> f32 {
    pacing.clamp(PACING_MIN, PACING_MAX)
}

/// How the user says practice feels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feeling {
    Better,
    Same,
    Struggling,
}

/// Session-level adjustment requested alongside a feeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    Extend,
    EndEarly,
    TakeBreak,
}

/// A check-in answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckInResponse {
    pub feeling: Feeling,
    #[serde(default)]
    pub wants_to_adjust: bool,
    #[serde(default)]
    pub adjustment: Option<Adjustment>,
}

/// Session-level action the caller must carry out after a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInDirective {
    EndEarly,
    TakeBreak,
}

/// Coarse position within the session, from overall progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Opening,
    Middle,
    Closing,
}

impl SessionPhase {
    /// Middle is strictly between 20% and 80%.
    pub fn classify(progress: f64) -> Self {
        if progress <= 0.2 {
            SessionPhase::Opening
        } else if progress < 0.8 {
            SessionPhase::Middle
        } else {
            SessionPhase::Closing
        }
    }
}

/// Trigger policy knobs.
#[derive(Debug, Clone, Copy)]
pub struct CheckInConfig {
    pub enabled: bool,
    /// Seconds that must pass since session start (or since the previous
    /// check-in) before an automatic check-in may fire.
    pub min_secs_before: u32,
    /// Automatic check-ins allowed per session.
    pub max_auto_per_session: u32,
}

impl Default for CheckInConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_secs_before: 180,
            max_auto_per_session: 1,
        }
    }
}

fn default_pacing() -> f32 {
    1.0
}

/// Serializable check-in state. Travels inside session snapshots so a
/// restored session keeps its pacing and does not re-prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckInState {
    #[serde(default)]
    pub check_ins_shown: u32,
    #[serde(default)]
    pub last_check_in_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_response: Option<CheckInResponse>,
    #[serde(default = "default_pacing")]
    pub adaptive_pacing: f32,
}

impl Default for CheckInState {
    fn default() -> Self {
        Self {
            check_ins_shown: 0,
            last_check_in_at: None,
            last_response: None,
            adaptive_pacing: default_pacing(),
        }
    }
}

/// A progress report from the session controller.
#[derive(Debug, Clone, Copy)]
pub struct ProgressObservation {
    pub elapsed_secs: u64,
    pub estimated_total_secs: u64,
    pub session_phase: SessionPhase,
}

/// Owns the trigger policy and the adaptive pacing factor.
#[derive(Debug, Clone)]
pub struct CheckInController {
    config: CheckInConfig,
    state: CheckInState,
}

impl CheckInController {
    pub fn new(config: CheckInConfig) -> Self {
        Self {
            config,
            state: CheckInState::default(),
        }
    }

    /// Rebuild from persisted state, e.g. when restoring a session.
    pub fn with_state(config: CheckInConfig, state: CheckInState) -> Self {
        Self { config, state }
    }

    /// Forget everything from the previous session.
    pub fn reset(&mut self) {
        self.state = CheckInState::default();
    }

    pub fn pacing(&self) -> f32 {
        self.state.adaptive_pacing
    }

    pub fn state(&self) -> &CheckInState {
        &self.state
    }

    /// Evaluate one observation. Returns true when a check-in should be
    /// shown now, in which case it is immediately counted as shown.
    ///
    /// Every gate must pass: the session is in its middle, elapsed time sits
    /// inside the 40-70% window of the estimate, the minimum quiet period
    /// has passed, and the per-session budget is not spent.
    pub fn observe(&mut self, obs: ProgressObservation, now: DateTime<Utc>) -> bool {
        if !self.config.enabled {
            return false;
        }
        if self.state.check_ins_shown >= self.config.max_auto_per_session {
            return false;
        }
        if obs.session_phase != SessionPhase::Middle {
            return false;
        }
        if obs.estimated_total_secs == 0 {
            return false;
        }
        let fraction = obs.elapsed_secs as f64 / obs.estimated_total_secs as f64;
        if !(0.4..=0.7).contains(&fraction) {
            return false;
        }
        let quiet_secs = match self.state.last_check_in_at {
            Some(last) => (now - last).num_seconds().max(0) as u64,
            None => obs.elapsed_secs,
        };
        if quiet_secs < u64::from(self.config.min_secs_before) {
            return false;
        }
        self.state.check_ins_shown += 1;
        self.state.last_check_in_at = Some(now);
        debug!(elapsed = obs.elapsed_secs, fraction, "check-in triggered");
        true
    }

    /// Fold a response into pacing. Responses are accepted whether or not a
    /// check-in was shown; the pacing bounds hold regardless.
    pub fn respond(&mut self, response: CheckInResponse) -> Option<CheckInDirective> {
        if response.feeling == Feeling::Struggling {
            self.state.adaptive_pacing = clamp_pacing(self.state.adaptive_pacing * STRUGGLING_FACTOR);
        }
        if response.wants_to_adjust && response.adjustment == Some(Adjustment::Extend) {
            self.state.adaptive_pacing = clamp_pacing(self.state.adaptive_pacing * EXTEND_FACTOR);
        }
        let directive = if response.wants_to_adjust {
            match response.adjustment {
                Some(Adjustment::EndEarly) => Some(CheckInDirective::EndEarly),
                Some(Adjustment::TakeBreak) => Some(CheckInDirective::TakeBreak),
                _ => None,
            }
        } else {
            None
        };
        debug!(pacing = self.state.adaptive_pacing, "check-in response applied");
        self.state.last_response = Some(response);
        directive
    }
}
