//! The session layer: intents coming in, notices going out, and the controller serializing
//! everything in between.

mod intent;
mod session_config;
mod session_controller;
mod session_timers;
mod signal;

#[cfg(test)]
mod tests;

pub use intent::{ControlAxes, Intent, IntentSource};
pub use session_config::SessionConfig;
pub use session_controller::{SessionController, SessionHandle};
pub use session_timers::{SessionTimers, Tick};
pub use signal::{Notice, NoticeLevel, SessionEvent};
