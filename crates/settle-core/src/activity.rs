//! Activity model and duration estimation.
//!
//! An [`Activity`] is one queue entry in a session: a breathing pattern, a
//! grounding technique, a journal entry, a physical reset, or a focus block.
//! The type-specific payload lives in [`ActivityConfig`], a closed sum, so
//! adding a kind means the compiler points at every match that must learn
//! about it.
//!
//! Duration estimation is pure and runs once at construction. Estimates feed
//! progress display and the check-in window; they never gate transitions.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::library::Library;

/// Flat duration for a grounding technique whose label carries no digits,
/// and the fallback for hand-built grounding configs.
pub const GROUNDING_FALLBACK_SECS: u32 = 180;
/// Flat duration for a freeform journal entry (no prompts).
pub const FREEFORM_JOURNAL_SECS: u32 = 300;
/// Reflection time per journal prompt when none is configured.
pub const DEFAULT_REFLECTION_SECS: u32 = 60;

/// The five activity kinds. Derived from the config payload, never stored
/// separately, so the two can not disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Breathing,
    Grounding,
    Journal,
    Reset,
    Focus,
}

impl ActivityKind {
    pub fn label(self) -> &'static str {
        match self {
            ActivityKind::Breathing => "breathing",
            ActivityKind::Grounding => "grounding",
            ActivityKind::Journal => "journal",
            ActivityKind::Reset => "reset",
            ActivityKind::Focus => "focus",
        }
    }
}

/// Display hint for theming and haptics. Never consulted by orchestration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Calm,
    Energize,
    Focus,
    #[default]
    Neutral,
}

/// One step of a physical reset exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetStep {
    pub instruction: String,
    pub duration_secs: u32,
}

/// Type-specific activity payload, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ActivityConfig {
    /// Timed breath cycle. Hold lengths of zero mean the phase is skipped.
    Breathing {
        inhale: u32,
        #[serde(default)]
        hold_in: u32,
        exhale: u32,
        #[serde(default)]
        hold_out: u32,
        cycles: u32,
    },
    /// Sequential instructions the user walks through at their own pace.
    Grounding { steps: Vec<String> },
    /// Prompted or freeform writing. Empty `prompts` means freeform.
    Journal {
        #[serde(default)]
        prompts: Vec<String>,
        #[serde(default)]
        show_text_input: bool,
        #[serde(default)]
        reflection_secs: Option<u32>,
    },
    /// Short physical exercise with per-step timings. `exercise_id` is a
    /// slug of the display name, kept for history and presentation.
    Reset {
        exercise_id: String,
        steps: Vec<ResetStep>,
    },
    /// A single continuous focus block.
    Focus { target_minutes: u32 },
}

impl ActivityConfig {
    pub fn kind(&self) -> ActivityKind {
        match self {
            ActivityConfig::Breathing { .. } => ActivityKind::Breathing,
            ActivityConfig::Grounding { .. } => ActivityKind::Grounding,
            ActivityConfig::Journal { .. } => ActivityKind::Journal,
            ActivityConfig::Reset { .. } => ActivityKind::Reset,
            ActivityConfig::Focus { .. } => ActivityKind::Focus,
        }
    }

    /// Estimated seconds derived from the payload alone.
    ///
    /// Grounding is the one kind whose duration comes from outside the
    /// payload (the technique's duration label, see [`parse_duration_label`]);
    /// here it falls back to [`GROUNDING_FALLBACK_SECS`].
    pub fn estimate_duration_secs(&self) -> u32 {
        match self {
            ActivityConfig::Breathing {
                inhale,
                hold_in,
                exhale,
                hold_out,
                cycles,
            } => inhale
                .saturating_add(*hold_in)
                .saturating_add(*exhale)
                .saturating_add(*hold_out)
                .saturating_mul(*cycles),
            ActivityConfig::Grounding { .. } => GROUNDING_FALLBACK_SECS,
            ActivityConfig::Journal {
                prompts,
                reflection_secs,
                ..
            } => {
                if prompts.is_empty() {
                    FREEFORM_JOURNAL_SECS
                } else {
                    (prompts.len() as u32)
                        .saturating_mul(reflection_secs.unwrap_or(DEFAULT_REFLECTION_SECS))
                }
            }
            ActivityConfig::Reset { steps, .. } => steps
                .iter()
                .fold(0u32, |acc, s| acc.saturating_add(s.duration_secs)),
            ActivityConfig::Focus { target_minutes } => target_minutes.saturating_mul(60),
        }
    }
}

/// One queue entry in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// `{kind}-{source_id}`, e.g. `breathing-box`.
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tone: Tone,
    /// Estimated seconds, fixed at construction. Display and progress only.
    pub duration_secs: u32,
    pub config: ActivityConfig,
}

impl Activity {
    pub fn kind(&self) -> ActivityKind {
        self.config.kind()
    }

    /// The library id this activity was built from (`box` for
    /// `breathing-box`). Falls back to the full id for hand-built entries.
    pub fn source_id(&self) -> &str {
        self.id
            .strip_prefix(self.kind().label())
            .and_then(|rest| rest.strip_prefix('-'))
            .unwrap_or(&self.id)
    }

    /// Build from a library breathing pattern.
    pub fn from_breathing(library: &Library, id: &str) -> Result<Self> {
        let pattern = library.breathing(id).ok_or_else(|| CoreError::NotFound {
            what: "breathing pattern",
            id: id.to_string(),
        })?;
        let config = ActivityConfig::Breathing {
            inhale: pattern.inhale,
            hold_in: pattern.hold_in,
            exhale: pattern.exhale,
            hold_out: pattern.hold_out,
            cycles: pattern.cycles,
        };
        Ok(Self {
            id: format!("breathing-{}", pattern.id),
            name: pattern.name.clone(),
            description: pattern.description.clone(),
            tone: pattern.tone,
            duration_secs: config.estimate_duration_secs(),
            config,
        })
    }

    /// Build from a library grounding technique. Duration comes from the
    /// technique's human-readable label, not from the step count.
    pub fn from_grounding(library: &Library, id: &str) -> Result<Self> {
        let technique = library.grounding(id).ok_or_else(|| CoreError::NotFound {
            what: "grounding technique",
            id: id.to_string(),
        })?;
        Ok(Self {
            id: format!("grounding-{}", technique.id),
            name: technique.name.clone(),
            description: String::new(),
            tone: Tone::Calm,
            duration_secs: parse_duration_label(&technique.duration_label),
            config: ActivityConfig::Grounding {
                steps: technique.steps.clone(),
            },
        })
    }

    /// Build from a library reset exercise.
    pub fn from_reset(library: &Library, id: &str) -> Result<Self> {
        let exercise = library.reset(id).ok_or_else(|| CoreError::NotFound {
            what: "reset exercise",
            id: id.to_string(),
        })?;
        let config = ActivityConfig::Reset {
            exercise_id: slugify(&exercise.name),
            steps: exercise.steps.clone(),
        };
        Ok(Self {
            id: format!("reset-{}", exercise.id),
            name: exercise.name.clone(),
            description: String::new(),
            tone: Tone::Energize,
            duration_secs: config.estimate_duration_secs(),
            config,
        })
    }

    /// Build from a library focus preset.
    pub fn from_focus(library: &Library, id: &str) -> Result<Self> {
        let preset = library.focus(id).ok_or_else(|| CoreError::NotFound {
            what: "focus preset",
            id: id.to_string(),
        })?;
        let config = ActivityConfig::Focus {
            target_minutes: preset.target_minutes,
        };
        Ok(Self {
            id: format!("focus-{}", preset.id),
            name: preset.name.clone(),
            description: String::new(),
            tone: Tone::Focus,
            duration_secs: config.estimate_duration_secs(),
            config,
        })
    }

    /// Build a journal activity. `prompt_id: None` gives a freeform entry,
    /// which always resolves; a missing prompt id is a hard error.
    pub fn journal(
        library: &Library,
        prompt_id: Option<&str>,
        reflection_secs: Option<u32>,
    ) -> Result<Self> {
        let (id, name, prompts) = match prompt_id {
            Some(pid) => {
                let prompt = library.journal_prompt(pid).ok_or_else(|| CoreError::NotFound {
                    what: "journal prompt",
                    id: pid.to_string(),
                })?;
                (
                    format!("journal-{}", prompt.id),
                    prompt.title.clone(),
                    vec![prompt.text.clone()],
                )
            }
            None => (
                "journal-freeform".to_string(),
                "Freeform Journal".to_string(),
                Vec::new(),
            ),
        };
        let config = ActivityConfig::Journal {
            prompts,
            show_text_input: true,
            reflection_secs,
        };
        Ok(Self {
            id,
            name,
            description: String::new(),
            tone: Tone::Calm,
            duration_secs: config.estimate_duration_secs(),
            config,
        })
    }
}

/// First integer in the label read as minutes, or the grounding fallback
/// when the label has no digits. `"3 min"` gives 180, `"10-15 min"` 600,
/// `"quick"` 180.
pub fn parse_duration_label(label: &str) -> u32 {
    let mut digits = String::new();
    for ch in label.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
        } else if !digits.is_empty() {
            break;
        }
    }
    digits
        .parse::<u32>()
        .map_or(GROUNDING_FALLBACK_SECS, |minutes| minutes.saturating_mul(60))
}

/// Lowercased ASCII alphanumerics with single hyphens between runs.
/// `"Shoulder Drop"` and `"shoulder   drop"` both give `shoulder-drop`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_gap = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_gap && !slug.is_empty() {
                slug.push('-');
            }
            pending_gap = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_gap = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breathing_duration_is_cycle_sum_times_cycles() {
        let config = ActivityConfig::Breathing {
            inhale: 4,
            hold_in: 7,
            exhale: 8,
            hold_out: 0,
            cycles: 4,
        };
        assert_eq!(config.estimate_duration_secs(), 76);
    }

    #[test]
    fn freeform_journal_is_five_minutes() {
        let config = ActivityConfig::Journal {
            prompts: Vec::new(),
            show_text_input: true,
            reflection_secs: None,
        };
        assert_eq!(config.estimate_duration_secs(), 300);
    }

    #[test]
    fn prompted_journal_scales_with_prompt_count() {
        let config = ActivityConfig::Journal {
            prompts: vec!["a".into(), "b".into(), "c".into()],
            show_text_input: true,
            reflection_secs: Some(90),
        };
        assert_eq!(config.estimate_duration_secs(), 270);

        let defaulted = ActivityConfig::Journal {
            prompts: vec!["a".into(), "b".into()],
            show_text_input: false,
            reflection_secs: None,
        };
        assert_eq!(defaulted.estimate_duration_secs(), 120);
    }

    #[test]
    fn reset_duration_sums_step_timings() {
        let config = ActivityConfig::Reset {
            exercise_id: "shoulder-drop".into(),
            steps: vec![
                ResetStep {
                    instruction: "Lift".into(),
                    duration_secs: 15,
                },
                ResetStep {
                    instruction: "Drop".into(),
                    duration_secs: 20,
                },
            ],
        };
        assert_eq!(config.estimate_duration_secs(), 35);
    }

    #[test]
    fn focus_duration_converts_minutes() {
        let config = ActivityConfig::Focus { target_minutes: 25 };
        assert_eq!(config.estimate_duration_secs(), 1500);
    }

    #[test]
    fn duration_label_parses_first_integer_as_minutes() {
        assert_eq!(parse_duration_label("3 min"), 180);
        assert_eq!(parse_duration_label("10-15 min"), 600);
        assert_eq!(parse_duration_label("about 5 minutes"), 300);
    }

    #[test]
    fn duration_label_without_digits_defaults_to_three_minutes() {
        assert_eq!(parse_duration_label("quick"), 180);
        assert_eq!(parse_duration_label(""), 180);
    }

    #[test]
    fn slugs_are_case_insensitive_and_collapse_separators() {
        assert_eq!(slugify("Shoulder Drop"), "shoulder-drop");
        assert_eq!(slugify("SHOULDER   DROP"), "shoulder-drop");
        assert_eq!(slugify("Two  Spaces"), "two-spaces");
        assert_eq!(slugify("  trim me  "), "trim-me");
    }

    #[test]
    fn config_serializes_with_kind_tag() {
        let config = ActivityConfig::Focus { target_minutes: 10 };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["kind"], "focus");
        assert_eq!(json["target_minutes"], 10);
    }

    #[test]
    fn kind_is_derived_from_the_payload() {
        let config = ActivityConfig::Grounding { steps: Vec::new() };
        assert_eq!(config.kind(), ActivityKind::Grounding);
        assert_eq!(config.kind().label(), "grounding");
    }

    #[test]
    fn library_built_activities_strip_source_ids() {
        let library = Library::builtin();
        let activity = Activity::from_breathing(&library, "box").unwrap();
        assert_eq!(activity.id, "breathing-box");
        assert_eq!(activity.source_id(), "box");
        assert_eq!(activity.kind(), ActivityKind::Breathing);
    }

    #[test]
    fn unknown_library_id_is_a_hard_error() {
        let library = Library::builtin();
        let err = Activity::from_breathing(&library, "no-such-pattern").unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
        assert!(err.to_string().contains("no-such-pattern"));
    }

    #[test]
    fn grounding_duration_comes_from_the_label() {
        let library = Library::builtin();
        let activity = Activity::from_grounding(&library, "five-senses").unwrap();
        assert_eq!(activity.duration_secs, 180);
    }
}
