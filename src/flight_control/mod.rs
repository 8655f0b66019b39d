//! Flight-side model of the session: the aircraft's status flags, the commands that can be
//! sent to it, the gate deciding which of them are legal, and the link they travel over.

mod aircraft_link;
mod command;
pub(crate) mod command_gate;
mod flight_state;
mod sim_link;
mod telemetry;


pub use aircraft_link::{AircraftLink, LinkError};
pub use command::{Command, CommandKind};
pub use flight_state::FlightState;
pub use sim_link::SimulatedLink;
pub use telemetry::{NavigationData, TelemetrySnapshot};
