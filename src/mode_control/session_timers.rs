use std::time::Duration;
use strum_macros::Display;
use tokio::time::{Interval, MissedTickBehavior};

/// Which periodic activity is due.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Display)]
pub enum Tick {
    Status,
    Hud,
    Video,
}

/// The session's periodic activities.
///
/// The coarse status poll runs for the whole session, the fine HUD and video refreshes only
/// while connected.
pub struct SessionTimers {
    status: Interval,
    hud: Option<Interval>,
    video: Option<Interval>,
}

impl SessionTimers {
    pub const STATUS_PERIOD: Duration = Duration::from_secs(1);
    pub const HUD_PERIOD: Duration = Duration::from_millis(50);
    pub const VIDEO_PERIOD: Duration = Duration::from_millis(50);

    pub fn new() -> Self {
        Self { status: Self::interval(Self::STATUS_PERIOD), hud: None, video: None }
    }

    fn interval(period: Duration) -> Interval {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    }

    /// Starts the fine timers. Running timers are left alone.
    pub fn start(&mut self) {
        self.hud.get_or_insert_with(|| Self::interval(Self::HUD_PERIOD));
        self.video.get_or_insert_with(|| Self::interval(Self::VIDEO_PERIOD));
    }

    pub fn stop(&mut self) {
        self.hud = None;
        self.video = None;
    }

    /// Waits for the next due tick of any running timer.
    pub async fn next_tick(&mut self) -> Tick {
        tokio::select! {
            _ = self.status.tick() => Tick::Status,
            () = Self::tick_opt(self.hud.as_mut()) => Tick::Hud,
            () = Self::tick_opt(self.video.as_mut()) => Tick::Video,
        }
    }

    async fn tick_opt(interval: Option<&mut Interval>) {
        match interval {
            Some(i) => {
                i.tick().await;
            }
            None => std::future::pending().await,
        }
    }
}

impl Default for SessionTimers {
    fn default() -> Self { Self::new() }
}
