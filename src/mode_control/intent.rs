use crate::flight_control::{Command, FlightState};
use strum_macros::Display;

/// Where an intent came from. The gate treats all sources alike; the source only shows up
/// in the event trace.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Display)]
pub enum IntentSource {
    Operator,
    InputDevice,
    ControlLoop,
}

/// Normalized stick deflections, each clamped to `[-1.0, 1.0]`.
#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub struct ControlAxes {
    roll: f32,
    pitch: f32,
    yaw: f32,
    gaz: f32,
}

impl ControlAxes {
    pub const CENTERED: ControlAxes = ControlAxes { roll: 0.0, pitch: 0.0, yaw: 0.0, gaz: 0.0 };

    pub fn new(roll: f32, pitch: f32, yaw: f32, gaz: f32) -> Self {
        Self {
            roll: Self::clamp(roll),
            pitch: Self::clamp(pitch),
            yaw: Self::clamp(yaw),
            gaz: Self::clamp(gaz),
        }
    }

    fn clamp(axis: f32) -> f32 { if axis.is_finite() { axis.clamp(-1.0, 1.0) } else { 0.0 } }

    pub fn roll(&self) -> f32 { self.roll }
    pub fn pitch(&self) -> f32 { self.pitch }
    pub fn yaw(&self) -> f32 { self.yaw }
    pub fn gaz(&self) -> f32 { self.gaz }

    pub fn to_command(self) -> Command {
        Command::Move { roll: self.roll, pitch: self.pitch, yaw: self.yaw, gaz: self.gaz }
    }
}

/// Something the operator or an input device wants the session to do.
#[derive(Debug, PartialEq, Clone, Copy, Display)]
pub enum Intent {
    Connect,
    Disconnect,
    /// Takes off when grounded, lands when flying.
    TakeOffOrLand,
    Emergency,
    FlatTrim,
    /// Enters hover when free flying, leaves it when hovering.
    ToggleHover,
    ChangeCamera,
    /// Replaces the axes sent with every control tick.
    Steer(ControlAxes),
    ToggleRecording,
    TakeSnapshot,
}

impl Intent {
    /// Resolves the flight command this intent stands for in `state`.
    ///
    /// Toggles are resolved against the session's view of the state, the resulting command
    /// still has to pass the gate. Intents handled by the session itself yield `None`.
    pub fn flight_command(&self, state: &FlightState) -> Option<Command> {
        match self {
            Intent::TakeOffOrLand => {
                Some(if state.flying() { Command::Land } else { Command::TakeOff })
            }
            Intent::ToggleHover => {
                Some(if state.hovering() { Command::LeaveHover } else { Command::EnterHover })
            }
            Intent::Emergency => Some(Command::Emergency),
            Intent::FlatTrim => Some(Command::FlatTrim),
            Intent::ChangeCamera => Some(Command::ChangeCamera),
            Intent::Connect
            | Intent::Disconnect
            | Intent::Steer(_)
            | Intent::ToggleRecording
            | Intent::TakeSnapshot => None,
        }
    }
}
