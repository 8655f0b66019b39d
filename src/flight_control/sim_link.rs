use super::{
    aircraft_link::{AircraftLink, LinkError},
    command::Command,
    telemetry::NavigationData,
};
use crate::{event, info};
use async_trait::async_trait;
use rand::Rng;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::sync::{mpsc, watch};

/// Point-mass stand-in for a real aircraft, integrated on its own task.
#[derive(Debug, Default)]
struct SimBody {
    flying: bool,
    hovering: bool,
    emergency: bool,
    phi: f32,
    theta: f32,
    psi: f32,
    altitude: f32,
    battery: f32,
    velocity: [f32; 3],
    sticks: [f32; 4],
}

impl SimBody {
    const MAX_TILT_DEG: f32 = 12.0;
    const YAW_RATE_DEG: f32 = 90.0;
    const CLIMB_RATE: f32 = 0.8;
    const TAKEOFF_ALT: f32 = 1.0;
    const MIN_FLIGHT_ALT: f32 = 0.3;
    const TILT_SPEED: f32 = 0.25;
    const DRAIN_FLYING: f32 = 0.2;
    const DRAIN_IDLE: f32 = 0.02;
    const NOISE_DEG: f32 = 0.3;

    fn new() -> Self { Self { battery: 100.0, ..Self::default() } }

    fn command(&mut self, command: Command) {
        match command {
            Command::TakeOff => self.flying = true,
            Command::Land => {
                self.flying = false;
                self.hovering = false;
            }
            Command::Emergency => {
                self.emergency = !self.emergency;
                if self.emergency {
                    self.flying = false;
                    self.hovering = false;
                    self.altitude = 0.0;
                }
            }
            Command::FlatTrim if !self.flying => {
                self.phi = 0.0;
                self.theta = 0.0;
            }
            Command::EnterHover if self.flying => self.hovering = true,
            Command::LeaveHover => self.hovering = false,
            Command::Move { roll, pitch, yaw, gaz } => self.sticks = [roll, pitch, yaw, gaz],
            _ => {}
        }
    }

    fn step(&mut self, dt: f32) {
        let [roll, pitch, yaw, gaz] = if self.hovering { [0.0; 4] } else { self.sticks };
        if self.flying {
            let mut rng = rand::rng();
            let noise = rng.random_range(-Self::NOISE_DEG..Self::NOISE_DEG);
            self.phi = roll * Self::MAX_TILT_DEG + noise;
            self.theta =
                pitch * Self::MAX_TILT_DEG + rng.random_range(-Self::NOISE_DEG..Self::NOISE_DEG);
            self.psi = wrap_degrees(self.psi + yaw * Self::YAW_RATE_DEG * dt);
            let climb = if self.altitude < Self::TAKEOFF_ALT && gaz <= 0.0 {
                Self::CLIMB_RATE
            } else {
                gaz * Self::CLIMB_RATE
            };
            self.altitude = (self.altitude + climb * dt).max(Self::MIN_FLIGHT_ALT);
            let heading = self.psi.to_radians();
            let forward = -self.theta * Self::TILT_SPEED;
            let right = self.phi * Self::TILT_SPEED;
            self.velocity = [
                forward * heading.cos() - right * heading.sin(),
                forward * heading.sin() + right * heading.cos(),
                climb,
            ];
            self.battery -= Self::DRAIN_FLYING * dt;
        } else {
            self.phi = 0.0;
            self.theta = 0.0;
            self.altitude = (self.altitude - Self::CLIMB_RATE * dt).max(0.0);
            self.velocity = [0.0; 3];
            self.battery -= Self::DRAIN_IDLE * dt;
        }
        self.battery = self.battery.max(0.0);
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn navigation_data(&self) -> NavigationData {
        NavigationData {
            phi: self.phi * 1000.0,
            theta: self.theta * 1000.0,
            psi: self.psi * 1000.0,
            altitude: (self.altitude * 1000.0) as i32,
            battery_level: self.battery.round() as u32,
            velocity: self.velocity.map(|v| v * 1000.0),
        }
    }
}

/// Wraps an angle into `(-180, 180]`.
fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 { wrapped + 360.0 } else { wrapped }
}

/// An [`AircraftLink`] backed by a simulated body instead of a radio.
pub struct SimulatedLink {
    connected: AtomicBool,
    nav_rx: watch::Receiver<NavigationData>,
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl SimulatedLink {
    const STEP: Duration = Duration::from_millis(20);
    const HANDSHAKE: Duration = Duration::from_millis(150);

    /// Spawns the simulation task. The task ends once the link is dropped.
    pub fn start() -> Arc<Self> {
        let body = SimBody::new();
        let (nav_tx, nav_rx) = watch::channel(body.navigation_data());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(Self::run_body(body, nav_tx, cmd_rx));
        Arc::new(Self { connected: AtomicBool::new(false), nav_rx, cmd_tx })
    }

    async fn run_body(
        mut body: SimBody,
        nav_tx: watch::Sender<NavigationData>,
        mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    ) {
        let mut interval = tokio::time::interval(Self::STEP);
        loop {
            interval.tick().await;
            loop {
                match cmd_rx.try_recv() {
                    Ok(command) => body.command(command),
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => return,
                }
            }
            body.step(Self::STEP.as_secs_f32());
            nav_tx.send_replace(body.navigation_data());
        }
    }
}

#[async_trait]
impl AircraftLink for SimulatedLink {
    async fn connect(&self) -> Result<(), LinkError> {
        if self.connected.load(Ordering::Acquire) {
            return Ok(());
        }
        tokio::time::sleep(Self::HANDSHAKE).await;
        self.connected.store(true, Ordering::Release);
        info!("Simulated aircraft link up.");
        Ok(())
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            // a link that goes silent makes the aircraft land on its own
            let _ = self.cmd_tx.send(Command::Land);
            info!("Simulated aircraft link down.");
        }
    }

    fn send_command(&self, command: Command) {
        if !self.connected.load(Ordering::Acquire) {
            event!("Simulated link offline, discarding {command}.");
            return;
        }
        let _ = self.cmd_tx.send(command);
    }

    fn navigation_data(&self) -> NavigationData { *self.nav_rx.borrow() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_headings_into_half_open_range() {
        assert!((wrap_degrees(190.0) - -170.0).abs() < 1e-4);
        assert!((wrap_degrees(-190.0) - 170.0).abs() < 1e-4);
        assert!((wrap_degrees(-180.0) - 180.0).abs() < 1e-4);
        assert!((wrap_degrees(45.0) - 45.0).abs() < 1e-4);
    }

    #[test]
    fn body_climbs_after_takeoff_and_settles_after_landing() {
        let mut body = SimBody::new();
        body.command(Command::TakeOff);
        for _ in 0..100 {
            body.step(0.02);
        }
        assert!(body.altitude > 0.5);
        body.command(Command::Land);
        for _ in 0..200 {
            body.step(0.02);
        }
        assert!(body.altitude.abs() < f32::EPSILON);
        assert!(body.battery < 100.0);
    }

    #[test]
    fn emergency_grounds_and_takeoff_lifts_off_again() {
        let mut body = SimBody::new();
        body.command(Command::TakeOff);
        body.step(0.02);
        body.command(Command::Emergency);
        assert!(!body.flying);
        assert!(body.altitude.abs() < f32::EPSILON);
        body.command(Command::TakeOff);
        assert!(body.emergency && body.flying);
        body.step(0.02);
        assert!(body.altitude >= SimBody::MIN_FLIGHT_ALT);
        body.command(Command::Emergency);
        assert!(!body.emergency && body.flying);
    }
}
