use std::fmt;

/// Session-side view of the aircraft's status flags.
///
/// The flags obey `flying => connected` and `hovering => flying` as long as they are only
/// changed through [`FlightState::with_connection`], [`FlightState::with_recording`] and
/// [`super::command_gate::apply`]. `emergency` is independent of the other flags.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Hash)]
pub struct FlightState {
    connected: bool,
    flying: bool,
    hovering: bool,
    emergency: bool,
    recording: bool,
}

impl FlightState {
    /// Disconnected, grounded, not recording.
    pub const IDLE: FlightState = FlightState {
        connected: false,
        flying: false,
        hovering: false,
        emergency: false,
        recording: false,
    };

    /// Builds a state from raw flags without enforcing the invariants.
    pub const fn from_flags(
        connected: bool,
        flying: bool,
        hovering: bool,
        emergency: bool,
        recording: bool,
    ) -> Self {
        Self { connected, flying, hovering, emergency, recording }
    }

    pub fn connected(&self) -> bool { self.connected }
    pub fn flying(&self) -> bool { self.flying }
    pub fn hovering(&self) -> bool { self.hovering }
    pub fn emergency(&self) -> bool { self.emergency }
    pub fn recording(&self) -> bool { self.recording }

    /// Flips the link flag. Dropping the link also grounds the state, since nothing
    /// downstream can know the flight status without a connection.
    pub fn with_connection(self, connected: bool) -> Self {
        if connected {
            Self { connected, ..self }
        } else {
            Self { connected, flying: false, hovering: false, ..self }
        }
    }

    pub fn with_recording(self, recording: bool) -> Self { Self { recording, ..self } }

    pub(super) fn with_flight(self, flying: bool, hovering: bool) -> Self {
        Self { flying, hovering: flying && hovering, ..self }
    }

    pub(super) fn with_emergency(self, emergency: bool) -> Self { Self { emergency, ..self } }
}

impl fmt::Display for FlightState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (self.connected, "connected"),
            (self.flying, "flying"),
            (self.hovering, "hovering"),
            (self.emergency, "emergency"),
            (self.recording, "recording"),
        ];
        let mut active = flags.iter().filter(|(set, _)| *set).map(|(_, name)| *name).peekable();
        if active.peek().is_none() {
            return write!(f, "idle");
        }
        write!(f, "{}", active.collect::<Vec<_>>().join("|"))
    }
}
