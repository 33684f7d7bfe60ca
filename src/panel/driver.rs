// src/panel/driver.rs
//! PanelDriver trait - minimal RISC interface for panel controller primitives.
//!
//! The driver only knows how to turn a [`PanelRequest`] into bus traffic.
//! Ordering, state tracking and the guaranteed power-down live in
//! `DisplaySession`.
//!
//! ## Lifecycle
//! 1. Opener closure claims the bus and GPIO lines (`HardwareUnavailable` on failure)
//! 2. `handle_request(Init)` - configure the controller
//! 3. Request loop - power, backlight, colour mode, draw
//! 4. `Drop` - lines and bus handles are released by their owners

use crate::error::PanelError;
use crate::panel::messages::{PanelGeometry, PanelRequest};

pub trait PanelDriver {
    /// Fixed resolution of the attached panel.
    fn geometry(&self) -> PanelGeometry;

    /// Execute one request against the hardware.
    ///
    /// Bus and pin failures are reported as [`PanelError::HardwareIo`].
    fn handle_request(&mut self, request: PanelRequest<'_>) -> Result<(), PanelError>;
}
