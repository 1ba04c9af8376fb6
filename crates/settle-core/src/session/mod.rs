//! Session model and queue controller.

mod controller;
mod model;

pub use controller::SessionController;
pub use model::{Session, SessionMode, SessionStatus};
