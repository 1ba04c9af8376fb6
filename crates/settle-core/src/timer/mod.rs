//! Countdown machinery.
//!
//! [`Countdown`] is the single timing primitive in the crate; everything
//! that measures time goes through it. [`PhaseMachine`] drives one activity
//! through its phases on top of it.

mod countdown;
mod phase;

pub use countdown::{Countdown, CountdownSignal, CountdownState};
pub use phase::{Phase, PhaseDescriptor, PhaseEvent, PhaseMachine, PhaseState};
