//! Authorization and state transition rules for flight commands.
//!
//! Both functions are pure. The session asks [`is_possible`] right before every dispatch,
//! regardless of which source produced the intent, and folds the dispatched command into its
//! state with [`apply`].

use super::{command::Command, flight_state::FlightState};

/// Decides whether `command` may be sent to an aircraft in `state`.
pub fn is_possible(command: &Command, state: &FlightState) -> bool {
    if !state.connected() {
        return false;
    }
    match command {
        Command::TakeOff | Command::FlatTrim => !state.flying(),
        Command::Land => state.flying(),
        Command::EnterHover => state.flying() && !state.hovering(),
        Command::LeaveHover => state.flying() && state.hovering(),
        Command::ChangeCamera => !state.recording(),
        Command::Emergency | Command::Move { .. } => true,
    }
}

/// Returns the state after `command` has been dispatched.
///
/// Commands the gate would reject leave the state untouched.
pub fn apply(command: &Command, state: FlightState) -> FlightState {
    if !is_possible(command, &state) {
        return state;
    }
    match command {
        Command::TakeOff => state.with_flight(true, false),
        Command::Land => state.with_flight(false, false),
        Command::EnterHover => state.with_flight(true, true),
        Command::LeaveHover => state.with_flight(true, false),
        Command::Emergency => {
            if state.emergency() {
                state.with_emergency(false)
            } else {
                state.with_emergency(true).with_flight(false, false)
            }
        }
        Command::FlatTrim | Command::ChangeCamera | Command::Move { .. } => state,
    }
}
