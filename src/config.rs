// src/config.rs

//! Configuration for the panel process.
//!
//! Settings come from an optional JSON file named by `QR_PANEL_CONFIG`,
//! then `IMAGE_DISPLAY_SEC` overrides the hold duration. Both variables may
//! live in a `.env` file, see [`load_dotenv`]. Every field has a
//! default matching the reference deployment (ST7789V on a Raspberry Pi,
//! SPI0 CE0).

use anyhow::{Context, Result};
use log::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the JSON config file.
pub const CONFIG_PATH_ENV: &str = "QR_PANEL_CONFIG";

/// Environment variable overriding `display.hold_secs`.
pub const HOLD_SECS_ENV: &str = "IMAGE_DISPLAY_SEC";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub display: DisplayConfig,
    pub hardware: HardwareConfig,
}

/// How frames are presented.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    /// Seconds a frame stays visible after its second draw.
    pub hold_secs: u64,
    /// Rotate the panel by 180 degrees.
    pub inverted: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            hold_secs: 10,
            inverted: false,
        }
    }
}

impl DisplayConfig {
    pub fn hold_duration(&self) -> Duration {
        Duration::from_secs(self.hold_secs)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// ST7789V over spidev + GPIO character device.
    St7789,
    /// No hardware; requests are logged only.
    Headless,
}

/// Where the panel is wired.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HardwareConfig {
    pub driver: DriverKind,
    pub spi_device: PathBuf,
    pub spi_speed_hz: u32,
    pub gpio_chip: PathBuf,
    /// GPIO line offsets on `gpio_chip`.
    pub dc_line: u32,
    pub reset_line: u32,
    pub backlight_line: u32,
    /// Colour inversion (INVON); IPS modules need it.
    pub invert_colors: bool,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        HardwareConfig {
            driver: DriverKind::St7789,
            spi_device: PathBuf::from("/dev/spidev0.0"),
            spi_speed_hz: 32_000_000,
            gpio_chip: PathBuf::from("/dev/gpiochip0"),
            dc_line: 25,
            reset_line: 27,
            backlight_line: 24,
            invert_colors: true,
        }
    }
}

/// Merge a `.env` file (working directory or a parent) into the process
/// environment. Variables already set win. A missing file is fine.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => debug!("Config: loaded {}", path.display()),
        Err(e) if e.not_found() => debug!("Config: no .env file"),
        Err(e) => warn!("Config: ignoring .env: {}", e),
    }
}

impl Config {
    /// Load from the process environment. Read once at start-up.
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with an injectable environment.
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match env(CONFIG_PATH_ENV) {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file {}", path))?;
                let config = Self::from_json(&text)
                    .with_context(|| format!("Failed to parse config file {}", path))?;
                info!("Config: loaded {}", path);
                config
            }
            None => {
                info!("Config: {} not set, using defaults", CONFIG_PATH_ENV);
                Config::default()
            }
        };
        config.apply_env_overrides(env);
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Invalid configuration JSON")
    }

    /// Apply `IMAGE_DISPLAY_SEC`. Values that are not whole seconds are ignored.
    pub fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = env(HOLD_SECS_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) => {
                    debug!("Config: {}={} overrides hold_secs", HOLD_SECS_ENV, secs);
                    self.display.hold_secs = secs;
                }
                Err(e) => warn!(
                    "Config: ignoring {}='{}' ({}), keeping {}s",
                    HOLD_SECS_ENV, raw, e, self.display.hold_secs
                ),
            }
        }
    }
}
