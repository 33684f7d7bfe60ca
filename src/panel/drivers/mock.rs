// src/panel/drivers/mock.rs
//! Recording panel driver for tests.
//!
//! Every request is appended to a shared [`CallLog`] with the instant it
//! arrived, so a test can keep the log while the driver itself moves into the
//! worker thread.

use crate::error::PanelError;
use crate::frame::Rgb;
use crate::panel::driver::PanelDriver;
use crate::panel::messages::{ColorMode, PanelGeometry, PanelRequest};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelCall {
    Init { color_mode: ColorMode, inverted: bool },
    Power(bool),
    Backlight(bool),
    SetColorMode(ColorMode),
    /// First pixel stands in for the frame's identity.
    Draw { first: Rgb, len: usize },
}

#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<(Instant, PanelCall)>>>,
}

impl CallLog {
    pub fn calls(&self) -> Vec<PanelCall> {
        self.timed_calls().into_iter().map(|(_, c)| c).collect()
    }

    pub fn timed_calls(&self) -> Vec<(Instant, PanelCall)> {
        self.calls.lock().unwrap().clone()
    }

    /// Poll until `pred` holds for the recorded calls or `timeout` passes.
    pub fn wait_for(&self, timeout: Duration, pred: impl Fn(&[PanelCall]) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if pred(&self.calls()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    fn push(&self, call: PanelCall) {
        self.calls.lock().unwrap().push((Instant::now(), call));
    }
}

pub struct MockPanelDriver {
    geometry: PanelGeometry,
    log: CallLog,
    /// Fail the n-th draw request (0-based) with `HardwareIo`.
    fail_draw: Option<usize>,
    draws: usize,
}

impl MockPanelDriver {
    pub fn new(geometry: PanelGeometry, log: CallLog) -> Self {
        Self {
            geometry,
            log,
            fail_draw: None,
            draws: 0,
        }
    }

    pub fn failing_draw(mut self, nth: usize) -> Self {
        self.fail_draw = Some(nth);
        self
    }
}

impl PanelDriver for MockPanelDriver {
    fn geometry(&self) -> PanelGeometry {
        self.geometry
    }

    fn handle_request(&mut self, request: PanelRequest<'_>) -> Result<(), PanelError> {
        let call = match request {
            PanelRequest::Init {
                color_mode,
                inverted,
            } => PanelCall::Init {
                color_mode,
                inverted,
            },
            PanelRequest::Power(on) => PanelCall::Power(on),
            PanelRequest::Backlight(on) => PanelCall::Backlight(on),
            PanelRequest::SetColorMode(mode) => PanelCall::SetColorMode(mode),
            PanelRequest::Draw(pixels) => {
                let nth = self.draws;
                self.draws += 1;
                if self.fail_draw == Some(nth) {
                    return Err(PanelError::HardwareIo("mock bus fault".into()));
                }
                PanelCall::Draw {
                    first: pixels.first().copied().unwrap_or_default(),
                    len: pixels.len(),
                }
            }
        };
        self.log.push(call);
        Ok(())
    }
}
