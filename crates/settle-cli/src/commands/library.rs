use clap::{Subcommand, ValueEnum};
use settle_core::Library;

#[derive(Subcommand)]
pub enum LibraryAction {
    /// List library content as JSON
    List {
        /// Restrict to one kind
        #[arg(long, value_enum)]
        kind: Option<LibraryKind>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LibraryKind {
    Breathing,
    Grounding,
    Resets,
    Focus,
    Prompts,
    Rituals,
    Programs,
    Sos,
}

pub fn run(action: LibraryAction) -> Result<(), Box<dyn std::error::Error>> {
    let library = Library::builtin();
    match action {
        LibraryAction::List { kind } => {
            let json = match kind {
                Some(LibraryKind::Breathing) => serde_json::to_value(library.breathing_patterns())?,
                Some(LibraryKind::Grounding) => {
                    serde_json::to_value(library.grounding_techniques())?
                }
                Some(LibraryKind::Resets) => serde_json::to_value(library.reset_exercises())?,
                Some(LibraryKind::Focus) => serde_json::to_value(library.focus_presets())?,
                Some(LibraryKind::Prompts) => serde_json::to_value(library.prompts())?,
                Some(LibraryKind::Rituals) => serde_json::to_value(library.rituals())?,
                Some(LibraryKind::Programs) => serde_json::to_value(library.programs())?,
                Some(LibraryKind::Sos) => serde_json::to_value(library.sos_queue()?)?,
                None => serde_json::json!({
                    "breathing": library.breathing_patterns(),
                    "grounding": library.grounding_techniques(),
                    "resets": library.reset_exercises(),
                    "focus": library.focus_presets(),
                    "prompts": library.prompts(),
                    "rituals": library.rituals(),
                    "programs": library.programs(),
                    "sos": library.sos_queue()?,
                }),
            };
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }
    Ok(())
}
