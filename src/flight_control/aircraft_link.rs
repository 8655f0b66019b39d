use super::{command::Command, telemetry::NavigationData};
use async_trait::async_trait;
use strum_macros::Display;

/// Connection to the aircraft.
///
/// The session treats the link as a black box: commands are fire-and-forget and navigation
/// data is read as whatever the link last received.
#[async_trait]
pub trait AircraftLink: Send + Sync {
    /// Opens the link. Calling it on an open link is a no-op.
    async fn connect(&self) -> Result<(), LinkError>;
    /// Closes the link. Calling it on a closed link is a no-op.
    async fn disconnect(&self);
    fn send_command(&self, command: Command);
    fn navigation_data(&self) -> NavigationData;
}

#[derive(Debug, Display)]
pub enum LinkError {
    Unreachable,
    Rejected(String),
}

impl std::error::Error for LinkError {}
