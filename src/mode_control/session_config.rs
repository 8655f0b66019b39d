use crate::imaging::Vec2D;
use crate::warn;
use std::{env, path::PathBuf, str::FromStr};

/// Runtime settings of a session, read from the environment at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Directory recordings and snapshots are written to.
    pub media_dir: PathBuf,
    /// Surface size the HUD is drawn on before the first frame arrives.
    pub hud_size: Vec2D<u32>,
    /// Whether ended recordings are compressed in the background.
    pub compress: bool,
    /// JPEG quality of the compression pass.
    pub quality: u8,
    /// Battery level in percent below which a warning notice is published.
    pub low_battery_percent: u8,
    /// Length of the scripted demo flight in seconds.
    pub demo_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            media_dir: PathBuf::from("./media"),
            hud_size: Vec2D::new(640, 360),
            compress: true,
            quality: 85,
            low_battery_percent: 20,
            demo_secs: 20,
        }
    }
}

impl SessionConfig {
    /// Reads `HUD_*` variables, falling back to the defaults for unset or malformed values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let media_dir = env::var("HUD_MEDIA_DIR").map_or(defaults.media_dir, PathBuf::from);
        let width = Self::parse_var("HUD_WIDTH", defaults.hud_size.x()).max(1);
        let height = Self::parse_var("HUD_HEIGHT", defaults.hud_size.y()).max(1);
        Self {
            media_dir,
            hud_size: Vec2D::new(width, height),
            compress: Self::parse_var("HUD_COMPRESS", defaults.compress),
            quality: Self::parse_var("HUD_QUALITY", defaults.quality).clamp(1, 100),
            low_battery_percent: Self::parse_var("HUD_LOW_BATTERY", defaults.low_battery_percent)
                .min(100),
            demo_secs: Self::parse_var("HUD_DEMO_SECS", defaults.demo_secs),
        }
    }

    fn parse_var<T: FromStr + Copy>(key: &str, default: T) -> T {
        match env::var(key) {
            Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!("Ignoring malformed {key}={raw}.");
                default
            }),
            Err(_) => default,
        }
    }
}
