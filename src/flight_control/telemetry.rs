use serde::{Deserialize, Serialize};

/// Raw navigation readout as published by the aircraft link.
///
/// Angles are in millidegrees, altitude in millimeters and velocities in mm/s, matching what
/// the navigation board reports.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NavigationData {
    pub phi: f32,
    pub theta: f32,
    pub psi: f32,
    pub altitude: i32,
    pub battery_level: u32,
    pub velocity: [f32; 3],
}

/// Immutable copy of the aircraft state in display units (degrees, meters, percent).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    phi: f32,
    theta: f32,
    psi: f32,
    altitude: f32,
    battery_percent: u8,
    velocity: [f32; 3],
}

impl TelemetrySnapshot {
    pub fn new(
        (phi, theta, psi): (f32, f32, f32),
        altitude: f32,
        battery_percent: u8,
        velocity: [f32; 3],
    ) -> Self {
        Self { phi, theta, psi, altitude, battery_percent: battery_percent.min(100), velocity }
    }

    /// Roll in degrees.
    pub fn phi(&self) -> f32 { self.phi }
    /// Pitch in degrees.
    pub fn theta(&self) -> f32 { self.theta }
    /// Yaw (heading) in degrees, not normalized.
    pub fn psi(&self) -> f32 { self.psi }
    /// Altitude above ground in meters.
    pub fn altitude(&self) -> f32 { self.altitude }
    pub fn battery_percent(&self) -> u8 { self.battery_percent }
    /// Velocity in m/s.
    pub fn velocity(&self) -> [f32; 3] { self.velocity }

    /// Horizontal ground speed in m/s.
    pub fn ground_speed(&self) -> f32 { self.velocity[0].hypot(self.velocity[1]) }
}

impl From<NavigationData> for TelemetrySnapshot {
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn from(nav: NavigationData) -> Self {
        const MILLI: f32 = 1000.0;
        Self::new(
            (nav.phi / MILLI, nav.theta / MILLI, nav.psi / MILLI),
            nav.altitude as f32 / MILLI,
            nav.battery_level.min(100) as u8,
            nav.velocity.map(|v| v / MILLI),
        )
    }
}
