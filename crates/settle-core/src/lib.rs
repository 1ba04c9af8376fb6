//! # Settle Core Library
//!
//! This library provides the session orchestration core for the Settle
//! self-regulation app. It implements a CLI-first philosophy where all
//! operations are available via a standalone CLI binary, with any GUI
//! shell expected to be a thin layer over the same core library.
//!
//! ## Architecture
//!
//! - **Timer Engine**: Wall-clock countdowns and a per-activity phase
//!   machine, both driven by the caller periodically invoking `tick()`
//! - **Session Controller**: Single owner of the active session queue;
//!   every mutation returns the events it produced
//! - **Check-Ins**: Adaptive mid-session prompts that tune pacing
//! - **Storage**: SQLite-based history and snapshot persistence plus
//!   TOML-based configuration
//!
//! ## Key Components
//!
//! - [`SessionController`]: Core session state machine
//! - [`PhaseMachine`]: Per-activity phase progression
//! - [`CheckInController`]: Check-in eligibility and pacing
//! - [`Database`]: History, stats, and snapshot persistence
//! - [`Config`]: Application configuration management

pub mod activity;
pub mod checkin;
pub mod error;
pub mod events;
pub mod library;
pub mod session;
pub mod storage;
pub mod timer;

pub use activity::{Activity, ActivityConfig, ActivityKind, Tone};
pub use checkin::{
    Adjustment, CheckInConfig, CheckInController, CheckInDirective, CheckInResponse, CheckInState,
    Feeling,
};
pub use error::{CoreError, Result};
pub use events::Event;
pub use library::Library;
pub use session::{Session, SessionController, SessionMode, SessionStatus};
pub use storage::{Config, Database, PersistedSnapshot, SnapshotBackend, SnapshotStore};
pub use timer::{Countdown, CountdownSignal, Phase, PhaseMachine, PhaseState};
