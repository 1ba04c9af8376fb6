//! Session data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::Activity;

/// Lifecycle status of a session. Completed and abandoned are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Abandoned)
    }
}

/// How the queue was assembled. Carries the identifiers the snapshot key is
/// derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SessionMode {
    /// One activity picked directly.
    Single,
    /// A curated ritual queue.
    Ritual { ritual_id: String },
    /// The emergency sequence.
    Sos,
    /// One day of a multi-day program.
    ProgramDay { program_id: String, day: u32 },
}

impl SessionMode {
    pub fn label(&self) -> &'static str {
        match self {
            SessionMode::Single => "single",
            SessionMode::Ritual { .. } => "ritual",
            SessionMode::Sos => "sos",
            SessionMode::ProgramDay { .. } => "program-day",
        }
    }
}

/// An ordered run of activities with a tracked position. The queue is fixed
/// at start; only `current_index` and `status` change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub mode: SessionMode,
    pub queue: Vec<Activity>,
    pub current_index: usize,
    pub started_at: DateTime<Utc>,
    pub status: SessionStatus,
}

impl Session {
    pub fn current_activity(&self) -> Option<&Activity> {
        self.queue.get(self.current_index)
    }

    pub fn is_last_activity(&self) -> bool {
        self.current_index + 1 >= self.queue.len()
    }

    /// Sum of the queue's duration estimates.
    pub fn estimated_total_secs(&self) -> u64 {
        self.queue
            .iter()
            .map(|a| u64::from(a.duration_secs))
            .sum()
    }

    /// Deterministic snapshot key: one slot per mode anchor, so a newer
    /// snapshot of the same session context overwrites the older one.
    pub fn storage_key(&self) -> String {
        match &self.mode {
            SessionMode::Single => {
                let anchor = self.queue.first().map_or("none", |a| a.id.as_str());
                format!("snapshot:single:{anchor}")
            }
            SessionMode::Ritual { ritual_id } => format!("snapshot:ritual:{ritual_id}"),
            SessionMode::Sos => "snapshot:sos".to_string(),
            SessionMode::ProgramDay { program_id, day } => {
                format!("snapshot:program-day:{program_id}:{day}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Library;

    fn session_with(mode: SessionMode, queue: Vec<Activity>) -> Session {
        Session {
            id: "test".into(),
            mode,
            queue,
            current_index: 0,
            started_at: Utc::now(),
            status: SessionStatus::Active,
        }
    }

    #[test]
    fn storage_keys_are_anchored_per_mode() {
        let library = Library::builtin();
        let activity = Activity::from_breathing(&library, "box").unwrap();

        let single = session_with(SessionMode::Single, vec![activity.clone()]);
        assert_eq!(single.storage_key(), "snapshot:single:breathing-box");

        let ritual = session_with(
            SessionMode::Ritual {
                ritual_id: "morning-reset".into(),
            },
            vec![activity.clone()],
        );
        assert_eq!(ritual.storage_key(), "snapshot:ritual:morning-reset");

        let sos = session_with(SessionMode::Sos, vec![activity.clone()]);
        assert_eq!(sos.storage_key(), "snapshot:sos");

        let program = session_with(
            SessionMode::ProgramDay {
                program_id: "calm-foundations".into(),
                day: 2,
            },
            vec![activity],
        );
        assert_eq!(
            program.storage_key(),
            "snapshot:program-day:calm-foundations:2"
        );
    }

    #[test]
    fn estimates_sum_the_queue() {
        let library = Library::builtin();
        let queue = library.ritual_queue("morning-reset").unwrap();
        let expected: u64 = queue.iter().map(|a| u64::from(a.duration_secs)).sum();
        let session = session_with(
            SessionMode::Ritual {
                ritual_id: "morning-reset".into(),
            },
            queue,
        );
        assert_eq!(session.estimated_total_secs(), expected);
        assert!(session.estimated_total_secs() > 0);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!SessionStatus::Active.is_terminal());
        assert!(!SessionStatus::Paused.is_terminal());
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Abandoned.is_terminal());
    }

    #[test]
    fn mode_serializes_with_kind_tag() {
        let mode = SessionMode::ProgramDay {
            program_id: "calm-foundations".into(),
            day: 1,
        };
        let json = serde_json::to_value(&mode).unwrap();
        assert_eq!(json["kind"], "program-day");
        assert_eq!(json["day"], 1);
    }
}
