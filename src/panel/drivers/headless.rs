//! Headless panel driver: accepts every request and only logs it.
//!
//! Used on machines without the panel attached (`hardware.driver = "headless"`),
//! so the queue and worker can run end to end on a development host.

use crate::error::PanelError;
use crate::panel::driver::PanelDriver;
use crate::panel::messages::{PanelGeometry, PanelRequest};
use log::{info, trace};

pub struct HeadlessPanelDriver {
    geometry: PanelGeometry,
    frames_drawn: u64,
}

impl HeadlessPanelDriver {
    pub fn new(geometry: PanelGeometry) -> Self {
        info!(
            "HeadlessPanelDriver::new() {}x{}",
            geometry.width, geometry.height
        );
        Self {
            geometry,
            frames_drawn: 0,
        }
    }

    #[cfg(test)]
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }
}

impl PanelDriver for HeadlessPanelDriver {
    fn geometry(&self) -> PanelGeometry {
        self.geometry
    }

    fn handle_request(&mut self, request: PanelRequest<'_>) -> Result<(), PanelError> {
        match request {
            PanelRequest::Init {
                color_mode,
                inverted,
            } => {
                info!(
                    "HeadlessPanelDriver: Init {:?} inverted={}",
                    color_mode, inverted
                );
            }
            PanelRequest::Power(on) => info!("HeadlessPanelDriver: Power {}", on),
            PanelRequest::Backlight(on) => info!("HeadlessPanelDriver: Backlight {}", on),
            PanelRequest::SetColorMode(mode) => {
                trace!("HeadlessPanelDriver: SetColorMode {:?}", mode)
            }
            PanelRequest::Draw(pixels) => {
                self.frames_drawn += 1;
                trace!(
                    "HeadlessPanelDriver: Draw #{} ({} pixels)",
                    self.frames_drawn,
                    pixels.len()
                );
            }
        }
        Ok(())
    }
}
