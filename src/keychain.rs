use crate::flight_control::AircraftLink;
use crate::imaging::VideoSource;
use std::sync::Arc;

/// The shared collaborators of a session: the aircraft link and its video stream.
#[derive(Clone)]
pub struct Keychain {
    /// The link commands are sent over and navigation data is read from.
    link: Arc<dyn AircraftLink>,
    /// The decoded video stream of the aircraft.
    video: Arc<dyn VideoSource>,
}

impl Keychain {
    pub fn new(link: Arc<dyn AircraftLink>, video: Arc<dyn VideoSource>) -> Self {
        Self { link, video }
    }

    /// Provides a cloned reference to the aircraft link.
    pub fn link(&self) -> Arc<dyn AircraftLink> { Arc::clone(&self.link) }

    /// Provides a cloned reference to the video source.
    pub fn video(&self) -> Arc<dyn VideoSource> { Arc::clone(&self.video) }
}
