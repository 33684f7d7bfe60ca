// src/frame.rs
//! Frame - one fully composed, row-major RGB buffer for the panel.

use crate::error::PanelError;

/// One pixel: red, green, blue, 8 bits each.
pub type Rgb = [u8; 3];

pub const BLACK: Rgb = [0, 0, 0];
#[cfg(test)]
pub const WHITE: Rgb = [255, 255, 255];

/// Bytes per pixel in a packed RGB888 buffer.
pub const RGB_BYTES_PER_PIXEL: usize = 3;

/// An immutable, row-major pixel buffer.
///
/// A frame does not know the panel it is meant for; the display session
/// rejects frames whose length is not the panel's pixel count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pixels: Box<[Rgb]>,
}

impl Frame {
    pub fn new(pixels: Vec<Rgb>) -> Self {
        Self {
            pixels: pixels.into_boxed_slice(),
        }
    }

    /// A frame of `len` pixels all set to `color`.
    pub fn solid(color: Rgb, len: usize) -> Self {
        Self::new(vec![color; len])
    }

    /// Builds a frame from a packed RGB888 buffer (3 bytes per pixel).
    ///
    /// # Errors
    ///
    /// Returns [`PanelError::InvalidFrameSize`] if the buffer ends in a
    /// partial pixel.
    pub fn from_rgb_bytes(bytes: &[u8]) -> Result<Self, PanelError> {
        if bytes.len() % RGB_BYTES_PER_PIXEL != 0 {
            return Err(PanelError::InvalidFrameSize {
                expected: bytes.len().div_ceil(RGB_BYTES_PER_PIXEL),
                actual: bytes.len() / RGB_BYTES_PER_PIXEL,
            });
        }
        let pixels = bytes
            .chunks_exact(RGB_BYTES_PER_PIXEL)
            .map(|px| [px[0], px[1], px[2]])
            .collect();
        Ok(Self::new(pixels))
    }

    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }
}
