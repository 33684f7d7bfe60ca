// src/panel/messages.rs
//! Request types and value types shared by the session and panel drivers.

use crate::frame::Rgb;

/// Controller pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// 16 bits per pixel, two bytes on the wire.
    Rgb565,
    /// 18 bits per pixel, three bytes on the wire (upper six bits of each).
    Rgb666,
}

impl ColorMode {
    /// COLMOD register value.
    pub fn colmod(self) -> u8 {
        match self {
            ColorMode::Rgb565 => 0x55,
            ColorMode::Rgb666 => 0x66,
        }
    }

    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ColorMode::Rgb565 => 2,
            ColorMode::Rgb666 => 3,
        }
    }
}

/// Panel resolution in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelGeometry {
    pub width: u16,
    pub height: u16,
}

impl PanelGeometry {
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Requests sent from a `DisplaySession` to its `PanelDriver`.
///
/// Every request touches hardware; drivers answer with `Ok(())` once the
/// controller has accepted it.
#[derive(Debug, Clone, Copy)]
pub enum PanelRequest<'a> {
    /// Reset the controller and program pixel format and orientation.
    /// Leaves the display switched on with the backlight untouched.
    Init { color_mode: ColorMode, inverted: bool },

    /// Panel power: sleep-out + display-on, or display-off + sleep-in.
    Power(bool),

    /// Backlight GPIO level.
    Backlight(bool),

    /// Re-program the pixel format.
    SetColorMode(ColorMode),

    /// Stream a full frame of row-major pixels into display RAM.
    Draw(&'a [Rgb]),
}
