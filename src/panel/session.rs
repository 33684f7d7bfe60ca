// src/panel/session.rs
//! DisplaySession - exclusive, state-tracking owner of a panel driver.

use crate::error::PanelError;
use crate::frame::{Frame, BLACK};
use crate::panel::driver::PanelDriver;
use crate::panel::messages::{ColorMode, PanelGeometry, PanelRequest};
use log::*;

/// Owned handle to the physical panel.
///
/// Exactly one session exists per panel: the driver is moved in at
/// [`acquire`](Self::acquire) and never handed out again. Whether the session
/// ends through [`release`](Self::release) or is simply dropped, the backlight
/// and then the panel power are switched off.
pub struct DisplaySession<D: PanelDriver> {
    driver: D,
    geometry: PanelGeometry,
    initialized: bool,
    powered: bool,
    backlit: bool,
    color_mode: Option<ColorMode>,
    released: bool,
}

impl<D: PanelDriver> DisplaySession<D> {
    /// Claim the panel by running `open`.
    ///
    /// # Errors
    ///
    /// Any failure of `open` is reported as [`PanelError::HardwareUnavailable`].
    pub fn acquire<F>(open: F) -> Result<Self, PanelError>
    where
        F: FnOnce() -> Result<D, PanelError>,
    {
        let driver = open().map_err(|e| match e {
            PanelError::HardwareUnavailable(_) => e,
            other => PanelError::HardwareUnavailable(other.to_string()),
        })?;
        let geometry = driver.geometry();
        info!(
            "DisplaySession: acquired {}x{} panel",
            geometry.width, geometry.height
        );
        Ok(Self {
            driver,
            geometry,
            initialized: false,
            powered: false,
            backlit: false,
            color_mode: None,
            released: false,
        })
    }

    /// Configure pixel format and orientation. Must precede any draw.
    pub fn initialize(&mut self, color_mode: ColorMode, inverted: bool) -> Result<(), PanelError> {
        self.driver.handle_request(PanelRequest::Init {
            color_mode,
            inverted,
        })?;
        self.initialized = true;
        self.powered = true;
        self.color_mode = Some(color_mode);
        debug!(
            "DisplaySession: initialized ({:?}, inverted={})",
            color_mode, inverted
        );
        Ok(())
    }

    /// Overwrite whatever the controller RAM held at power-up with black.
    pub fn clear(&mut self) -> Result<(), PanelError> {
        let blank = Frame::solid(BLACK, self.geometry.pixel_count());
        self.draw(&blank)
    }

    pub fn turn_on(&mut self) -> Result<(), PanelError> {
        self.ensure_initialized()?;
        self.driver.handle_request(PanelRequest::Power(true))?;
        self.powered = true;
        Ok(())
    }

    /// Power the panel down. The backlight is always switched off first.
    pub fn turn_off(&mut self) -> Result<(), PanelError> {
        self.set_backlight(false)?;
        self.driver.handle_request(PanelRequest::Power(false))?;
        self.powered = false;
        Ok(())
    }

    pub fn set_backlight(&mut self, on: bool) -> Result<(), PanelError> {
        self.driver.handle_request(PanelRequest::Backlight(on))?;
        self.backlit = on;
        Ok(())
    }

    /// Re-program the pixel format. Always reaches the controller, even when
    /// the mode is unchanged: some controllers forget it after power-up.
    pub fn set_color_mode(&mut self, mode: ColorMode) -> Result<(), PanelError> {
        self.ensure_initialized()?;
        self.driver.handle_request(PanelRequest::SetColorMode(mode))?;
        self.color_mode = Some(mode);
        Ok(())
    }

    pub fn draw(&mut self, frame: &Frame) -> Result<(), PanelError> {
        self.check_frame(frame)?;
        self.ensure_initialized()?;
        trace!("DisplaySession: draw {} pixels", frame.len());
        self.driver.handle_request(PanelRequest::Draw(frame.pixels()))
    }

    /// Size check performed by [`draw`](Self::draw), without touching hardware.
    pub fn check_frame(&self, frame: &Frame) -> Result<(), PanelError> {
        let expected = self.geometry.pixel_count();
        if frame.len() != expected {
            return Err(PanelError::InvalidFrameSize {
                expected,
                actual: frame.len(),
            });
        }
        Ok(())
    }

    /// End the session: backlight off, power off.
    ///
    /// Both steps are attempted; the first error is returned.
    pub fn release(mut self) -> Result<(), PanelError> {
        self.released = true;
        let result = self.power_down();
        info!("DisplaySession: released");
        result
    }

    #[cfg(test)]
    pub fn geometry(&self) -> PanelGeometry {
        self.geometry
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    pub fn is_backlit(&self) -> bool {
        self.backlit
    }

    pub fn color_mode(&self) -> Option<ColorMode> {
        self.color_mode
    }

    fn ensure_initialized(&self) -> Result<(), PanelError> {
        if self.initialized {
            Ok(())
        } else {
            Err(PanelError::NotInitialized)
        }
    }

    fn power_down(&mut self) -> Result<(), PanelError> {
        let backlight = self.set_backlight(false);
        let power = self
            .driver
            .handle_request(PanelRequest::Power(false))
            .map(|()| self.powered = false);
        backlight.and(power)
    }
}

impl<D: PanelDriver> Drop for DisplaySession<D> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        warn!("DisplaySession: dropped without release, forcing panel off");
        if let Err(e) = self.power_down() {
            error!("DisplaySession: best-effort power down failed: {}", e);
        }
    }
}
