//! Built-in content library.
//!
//! The curated catalog of breathing patterns, grounding techniques, reset
//! exercises, focus presets, journal prompts, rituals, and programs. All
//! lookups are pure reads over in-memory data; a miss is reported to the
//! caller as [`CoreError::NotFound`] and nothing is ever substituted.

use serde::Serialize;

use crate::activity::{Activity, ResetStep, Tone};
use crate::error::{CoreError, Result};

/// A timed breath cycle definition. All lengths in seconds.
#[derive(Debug, Clone, Serialize)]
pub struct BreathingPattern {
    pub id: String,
    pub name: String,
    pub description: String,
    pub inhale: u32,
    pub hold_in: u32,
    pub exhale: u32,
    pub hold_out: u32,
    pub cycles: u32,
    pub tone: Tone,
}

/// A grounding technique: free-paced instructions plus a human-readable
/// duration label ("3 min", "quick") that drives the duration estimate.
#[derive(Debug, Clone, Serialize)]
pub struct GroundingTechnique {
    pub id: String,
    pub name: String,
    pub duration_label: String,
    pub steps: Vec<String>,
}

/// A short physical exercise with per-step timings.
#[derive(Debug, Clone, Serialize)]
pub struct ResetExercise {
    pub id: String,
    pub name: String,
    pub steps: Vec<ResetStep>,
}

/// A named focus block length.
#[derive(Debug, Clone, Serialize)]
pub struct FocusPreset {
    pub id: String,
    pub name: String,
    pub target_minutes: u32,
}

/// A journal prompt.
#[derive(Debug, Clone, Serialize)]
pub struct JournalPrompt {
    pub id: String,
    pub title: String,
    pub text: String,
}

/// Reference to a library entry, used by rituals, programs, and the SOS
/// sequence to describe a queue without materializing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ActivityRef {
    Breathing { id: String },
    Grounding { id: String },
    Reset { id: String },
    Focus { id: String },
    Journal { prompt_id: Option<String> },
}

impl ActivityRef {
    /// Materialize the referenced activity, or fail with the lookup miss.
    pub fn resolve(&self, library: &Library) -> Result<Activity> {
        match self {
            ActivityRef::Breathing { id } => Activity::from_breathing(library, id),
            ActivityRef::Grounding { id } => Activity::from_grounding(library, id),
            ActivityRef::Reset { id } => Activity::from_reset(library, id),
            ActivityRef::Focus { id } => Activity::from_focus(library, id),
            ActivityRef::Journal { prompt_id } => {
                Activity::journal(library, prompt_id.as_deref(), None)
            }
        }
    }
}

/// A named, ordered queue of activities.
#[derive(Debug, Clone, Serialize)]
pub struct Ritual {
    pub id: String,
    pub name: String,
    pub activities: Vec<ActivityRef>,
}

/// A multi-day guided sequence. Day numbers are 1-based at the API surface.
#[derive(Debug, Clone, Serialize)]
pub struct Program {
    pub id: String,
    pub name: String,
    pub days: Vec<Vec<ActivityRef>>,
}

/// The built-in catalog.
#[derive(Debug, Clone)]
pub struct Library {
    breathing: Vec<BreathingPattern>,
    grounding: Vec<GroundingTechnique>,
    resets: Vec<ResetExercise>,
    focus: Vec<FocusPreset>,
    prompts: Vec<JournalPrompt>,
    rituals: Vec<Ritual>,
    programs: Vec<Program>,
    sos: Vec<ActivityRef>,
}

impl Default for Library {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Library {
    // ── Lookups ──────────────────────────────────────────────────────────

    pub fn breathing(&self, id: &str) -> Option<&BreathingPattern> {
        self.breathing.iter().find(|p| p.id == id)
    }

    pub fn grounding(&self, id: &str) -> Option<&GroundingTechnique> {
        self.grounding.iter().find(|t| t.id == id)
    }

    pub fn reset(&self, id: &str) -> Option<&ResetExercise> {
        self.resets.iter().find(|e| e.id == id)
    }

    pub fn focus(&self, id: &str) -> Option<&FocusPreset> {
        self.focus.iter().find(|p| p.id == id)
    }

    pub fn journal_prompt(&self, id: &str) -> Option<&JournalPrompt> {
        self.prompts.iter().find(|p| p.id == id)
    }

    pub fn ritual(&self, id: &str) -> Option<&Ritual> {
        self.rituals.iter().find(|r| r.id == id)
    }

    pub fn program(&self, id: &str) -> Option<&Program> {
        self.programs.iter().find(|p| p.id == id)
    }

    // ── Listings ─────────────────────────────────────────────────────────

    pub fn breathing_patterns(&self) -> &[BreathingPattern] {
        &self.breathing
    }

    pub fn grounding_techniques(&self) -> &[GroundingTechnique] {
        &self.grounding
    }

    pub fn reset_exercises(&self) -> &[ResetExercise] {
        &self.resets
    }

    pub fn focus_presets(&self) -> &[FocusPreset] {
        &self.focus
    }

    pub fn prompts(&self) -> &[JournalPrompt] {
        &self.prompts
    }

    pub fn rituals(&self) -> &[Ritual] {
        &self.rituals
    }

    pub fn programs(&self) -> &[Program] {
        &self.programs
    }

    // ── Queue builders ───────────────────────────────────────────────────

    /// Resolve a list of references in order, failing on the first miss.
    pub fn build_queue(&self, refs: &[ActivityRef]) -> Result<Vec<Activity>> {
        refs.iter().map(|r| r.resolve(self)).collect()
    }

    /// The curated emergency sequence.
    pub fn sos_queue(&self) -> Result<Vec<Activity>> {
        self.build_queue(&self.sos)
    }

    /// All activities of a ritual, in order.
    pub fn ritual_queue(&self, ritual_id: &str) -> Result<Vec<Activity>> {
        let ritual = self.ritual(ritual_id).ok_or_else(|| CoreError::NotFound {
            what: "ritual",
            id: ritual_id.to_string(),
        })?;
        self.build_queue(&ritual.activities)
    }

    /// One day of a program (1-based).
    pub fn program_day_queue(&self, program_id: &str, day: u32) -> Result<Vec<Activity>> {
        let program = self.program(program_id).ok_or_else(|| CoreError::NotFound {
            what: "program",
            id: program_id.to_string(),
        })?;
        let refs = day
            .checked_sub(1)
            .and_then(|d| program.days.get(d as usize))
            .ok_or_else(|| CoreError::NotFound {
                what: "program day",
                id: format!("{program_id} day {day}"),
            })?;
        self.build_queue(refs)
    }

    /// Whether an activity still resolves against the catalog. Used when
    /// restoring persisted sessions; freeform journal entries always do.
    pub fn resolves(&self, activity: &Activity) -> bool {
        use crate::activity::ActivityKind;

        let source = activity.source_id();
        match activity.kind() {
            ActivityKind::Breathing => self.breathing(source).is_some(),
            ActivityKind::Grounding => self.grounding(source).is_some(),
            ActivityKind::Reset => self.reset(source).is_some(),
            ActivityKind::Focus => self.focus(source).is_some(),
            ActivityKind::Journal => source == "freeform" || self.journal_prompt(source).is_some(),
        }
    }

    // ── Content ──────────────────────────────────────────────────────────

    pub fn builtin() -> Self {
        Self {
            breathing: vec![
                BreathingPattern {
                    id: "box".into(),
                    name: "Box Breathing".into(),
                    description: "Four equal sides: in, hold, out, hold.".into(),
                    inhale: 4,
                    hold_in: 4,
                    exhale: 4,
                    hold_out: 4,
                    cycles: 4,
                    tone: Tone::Calm,
                },
                BreathingPattern {
                    id: "four-seven-eight".into(),
                    name: "4-7-8 Relax".into(),
                    description: "A long exhale pattern for winding down.".into(),
                    inhale: 4,
                    hold_in: 7,
                    exhale: 8,
                    hold_out: 0,
                    cycles: 4,
                    tone: Tone::Calm,
                },
                BreathingPattern {
                    id: "coherent".into(),
                    name: "Coherent Breathing".into(),
                    description: "Even five-second waves, no holds.".into(),
                    inhale: 5,
                    hold_in: 0,
                    exhale: 5,
                    hold_out: 0,
                    cycles: 6,
                    tone: Tone::Neutral,
                },
                BreathingPattern {
                    id: "extended-exhale".into(),
                    name: "Extended Exhale".into(),
                    description: "Exhale longer than you inhale to settle fast.".into(),
                    inhale: 4,
                    hold_in: 0,
                    exhale: 6,
                    hold_out: 0,
                    cycles: 6,
                    tone: Tone::Calm,
                },
            ],
            grounding: vec![
                GroundingTechnique {
                    id: "five-senses".into(),
                    name: "5-4-3-2-1 Senses".into(),
                    duration_label: "3 min".into(),
                    steps: vec![
                        "Name five things you can see".into(),
                        "Name four things you can feel".into(),
                        "Name three things you can hear".into(),
                        "Name two things you can smell".into(),
                        "Name one thing you can taste".into(),
                    ],
                },
                GroundingTechnique {
                    id: "body-scan".into(),
                    name: "Body Scan".into(),
                    duration_label: "5 min".into(),
                    steps: vec![
                        "Notice the weight of your feet on the floor".into(),
                        "Move your attention up through your legs and back".into(),
                        "Relax your shoulders, jaw, and forehead".into(),
                        "Rest your attention on your breath".into(),
                    ],
                },
                GroundingTechnique {
                    id: "name-it".into(),
                    name: "Name It to Tame It".into(),
                    duration_label: "quick".into(),
                    steps: vec![
                        "Name the feeling that is loudest right now".into(),
                        "Locate where you sense it in your body".into(),
                        "Say to yourself: this is a feeling, and it will pass".into(),
                    ],
                },
            ],
            resets: vec![
                ResetExercise {
                    id: "shoulder-drop".into(),
                    name: "Shoulder Drop".into(),
                    steps: vec![
                        ResetStep {
                            instruction: "Raise your shoulders up to your ears and hold".into(),
                            duration_secs: 10,
                        },
                        ResetStep {
                            instruction: "Let them fall and feel the release".into(),
                            duration_secs: 15,
                        },
                        ResetStep {
                            instruction: "Roll them back slowly, three times".into(),
                            duration_secs: 20,
                        },
                    ],
                },
                ResetExercise {
                    id: "shake-it-out".into(),
                    name: "Shake It Out".into(),
                    steps: vec![
                        ResetStep {
                            instruction: "Shake out your hands and arms".into(),
                            duration_secs: 20,
                        },
                        ResetStep {
                            instruction: "Shake out each leg in turn".into(),
                            duration_secs: 20,
                        },
                        ResetStep {
                            instruction: "Take one slow breath and be still".into(),
                            duration_secs: 15,
                        },
                    ],
                },
            ],
            focus: vec![
                FocusPreset {
                    id: "gentle-start".into(),
                    name: "Gentle Start".into(),
                    target_minutes: 10,
                },
                FocusPreset {
                    id: "pomodoro".into(),
                    name: "Classic Pomodoro".into(),
                    target_minutes: 25,
                },
                FocusPreset {
                    id: "deep-block".into(),
                    name: "Deep Block".into(),
                    target_minutes: 50,
                },
            ],
            prompts: vec![
                JournalPrompt {
                    id: "tiny-win".into(),
                    title: "Tiny Win".into(),
                    text: "What is one small thing that went right today?".into(),
                },
                JournalPrompt {
                    id: "worry-dump".into(),
                    title: "Worry Dump".into(),
                    text: "Write down what is circling in your head, then close the page on it."
                        .into(),
                },
                JournalPrompt {
                    id: "evening-unload".into(),
                    title: "Evening Unload".into(),
                    text: "What are you still carrying from today that you can set down?".into(),
                },
            ],
            rituals: vec![
                Ritual {
                    id: "morning-reset".into(),
                    name: "Morning Reset".into(),
                    activities: vec![
                        ActivityRef::Breathing { id: "box".into() },
                        ActivityRef::Reset {
                            id: "shoulder-drop".into(),
                        },
                        ActivityRef::Journal {
                            prompt_id: Some("tiny-win".into()),
                        },
                    ],
                },
                Ritual {
                    id: "wind-down".into(),
                    name: "Wind Down".into(),
                    activities: vec![
                        ActivityRef::Breathing {
                            id: "four-seven-eight".into(),
                        },
                        ActivityRef::Grounding {
                            id: "body-scan".into(),
                        },
                        ActivityRef::Journal {
                            prompt_id: Some("evening-unload".into()),
                        },
                    ],
                },
            ],
            programs: vec![Program {
                id: "calm-foundations".into(),
                name: "Calm Foundations".into(),
                days: vec![
                    vec![
                        ActivityRef::Breathing { id: "box".into() },
                        ActivityRef::Grounding {
                            id: "name-it".into(),
                        },
                    ],
                    vec![
                        ActivityRef::Breathing {
                            id: "coherent".into(),
                        },
                        ActivityRef::Reset {
                            id: "shake-it-out".into(),
                        },
                    ],
                    vec![
                        ActivityRef::Breathing {
                            id: "four-seven-eight".into(),
                        },
                        ActivityRef::Grounding {
                            id: "five-senses".into(),
                        },
                        ActivityRef::Journal {
                            prompt_id: Some("tiny-win".into()),
                        },
                    ],
                ],
            }],
            sos: vec![
                ActivityRef::Breathing {
                    id: "extended-exhale".into(),
                },
                ActivityRef::Grounding {
                    id: "five-senses".into(),
                },
            ],
        }
    }
}
