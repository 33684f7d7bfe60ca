// src/panel/mod.rs
//! Panel access layered like the rest of the display stack.
//!
//! - PanelDriver: controller primitives (ST7789V, headless)
//! - DisplaySession: exclusive ownership, state tracking, guaranteed power-down
//! - Messages: request protocol and value types between the two

pub mod driver;
pub mod drivers;
pub mod messages;
pub mod session;

pub use driver::PanelDriver;
pub use messages::{ColorMode, PanelGeometry, PanelRequest};
pub use session::DisplaySession;

/// Deployed panel: 240x320 portrait.
pub const PANEL_GEOMETRY: PanelGeometry = PanelGeometry::new(240, 320);

/// Deployed pixel format (18 bits per pixel).
pub const PANEL_COLOR_MODE: ColorMode = ColorMode::Rgb666;
