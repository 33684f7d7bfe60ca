// src/worker/mod.rs
//! DisplayWorker - dedicated thread that owns the panel and shows queued frames.
//!
//! Threading model:
//! - Owns: DisplaySession (created on the worker thread, never shared)
//! - Reads: FrameReceiver, polled without blocking once per poll interval
//! - Observes: ShutdownSignal at every wait point
//!
//! Per frame: power on, settle, backlight on + draw, hold, re-assert colour
//! mode + draw again, keep visible for the display duration. The second draw
//! is there for controllers that drop their pixel format shortly after
//! power-up. With nothing queued the backlight goes off, then the panel.

use crate::error::PanelError;
use crate::frame::Frame;
use crate::panel::{ColorMode, DisplaySession, PanelDriver};
use crate::queue::FrameReceiver;
use crate::shutdown::ShutdownSignal;
use anyhow::{anyhow, Context, Result};
use log::*;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Queue check period while idle; also the worst-case shutdown latency.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Panel power-on to backlight-on.
pub const SETTLE_DELAY: Duration = Duration::from_millis(250);
/// First draw to colour-mode re-assert and second draw.
pub const HOLD_DELAY: Duration = Duration::from_secs(5);
/// Backlight-off to panel-off when the queue runs dry.
pub const POWER_DOWN_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_DISPLAY_DURATION: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerTimings {
    pub poll_interval: Duration,
    pub settle_delay: Duration,
    pub hold_delay: Duration,
    pub display_duration: Duration,
    pub power_down_delay: Duration,
}

impl Default for WorkerTimings {
    fn default() -> Self {
        WorkerTimings {
            poll_interval: POLL_INTERVAL,
            settle_delay: SETTLE_DELAY,
            hold_delay: HOLD_DELAY,
            display_duration: DEFAULT_DISPLAY_DURATION,
            power_down_delay: POWER_DOWN_DELAY,
        }
    }
}

impl WorkerTimings {
    pub fn with_display_duration(self, display_duration: Duration) -> Self {
        Self {
            display_duration,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    pub color_mode: ColorMode,
    pub inverted: bool,
    pub timings: WorkerTimings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PanelState {
    /// Panel off, backlight off (or on its way there).
    Idle,
    /// Panel on, backlight off, waiting for the controller to settle.
    Waking,
    /// Backlight on, frame drawn once.
    ShowingFirstDraw,
    /// Colour mode re-asserted, frame drawn again.
    ShowingSecondDraw,
}

/// Outcome of one step of the state machine.
enum Flow {
    Continue,
    Shutdown,
}

pub struct DisplayWorker {
    frames: FrameReceiver,
    shutdown: ShutdownSignal,
    settings: WorkerSettings,
    state: PanelState,
    /// Set once the "turning off" transition has been logged for this idle stretch.
    idle_logged: bool,
}

impl DisplayWorker {
    pub fn new(frames: FrameReceiver, shutdown: ShutdownSignal, settings: WorkerSettings) -> Self {
        Self {
            frames,
            shutdown,
            settings,
            state: PanelState::Idle,
            idle_logged: false,
        }
    }

    /// Spawn the worker on its own thread.
    ///
    /// `open` runs on the worker thread, so the driver it returns is never
    /// visible to any other thread.
    pub fn spawn<D, F>(self, open: F) -> Result<DisplayWorkerHandle>
    where
        D: PanelDriver + 'static,
        F: FnOnce() -> Result<D, PanelError> + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        let thread_handle = thread::Builder::new()
            .name("display".to_string())
            .spawn(move || self.run(open))
            .context("Failed to spawn display worker thread")?;

        info!("DisplayWorker spawned");
        Ok(DisplayWorkerHandle {
            shutdown,
            thread_handle: Some(thread_handle),
        })
    }

    /// Acquire the panel and run until shutdown or a fatal error.
    ///
    /// On shutdown the session is released (backlight off, panel off) before
    /// returning. On a fatal error the session's drop makes a best-effort
    /// attempt at the same.
    pub fn run<D, F>(mut self, open: F) -> Result<(), PanelError>
    where
        D: PanelDriver,
        F: FnOnce() -> Result<D, PanelError>,
    {
        info!("DisplayWorker: Start");
        let mut session = DisplaySession::acquire(open).inspect_err(|e| {
            error!("DisplayWorker: {}", e);
        })?;

        match self.drive(&mut session) {
            Ok(()) => {
                info!("DisplayWorker: Turning off display");
                session.release()?;
                info!("DisplayWorker: Stop");
                Ok(())
            }
            Err(e) => {
                error!("DisplayWorker: fatal error, stopping: {}", e);
                drop(session);
                Err(e)
            }
        }
    }

    fn drive<D: PanelDriver>(&mut self, session: &mut DisplaySession<D>) -> Result<(), PanelError> {
        session.initialize(self.settings.color_mode, self.settings.inverted)?;
        session.clear()?;
        self.enter(PanelState::Idle);
        info!("DisplayWorker: Display init");

        loop {
            if self.shutdown.wait_timeout(self.settings.timings.poll_interval) {
                return Ok(());
            }
            let flow = match self.frames.try_next() {
                Some(frame) => match self.show(session, frame) {
                    Err(e) if !e.is_fatal() => {
                        warn!("DisplayWorker: dropping frame: {}", e);
                        Flow::Continue
                    }
                    other => other?,
                },
                None => self.idle(session)?,
            };
            if let Flow::Shutdown = flow {
                return Ok(());
            }
        }
    }

    /// Idle -> Waking -> Showing(first) -> Showing(second), one frame.
    fn show<D: PanelDriver>(
        &mut self,
        session: &mut DisplaySession<D>,
        frame: Frame,
    ) -> Result<Flow, PanelError> {
        // Size first, so a bad frame never wakes the panel.
        session.check_frame(&frame)?;

        info!("DisplayWorker: Got frame. Displaying");
        self.idle_logged = false;
        let timings = self.settings.timings;

        session.turn_on()?;
        self.enter(PanelState::Waking);
        if self.pause(timings.settle_delay) {
            return Ok(Flow::Shutdown);
        }

        session.set_backlight(true)?;
        session.draw(&frame)?;
        self.enter(PanelState::ShowingFirstDraw);
        if self.pause(timings.hold_delay) {
            return Ok(Flow::Shutdown);
        }

        session.set_color_mode(self.settings.color_mode)?;
        session.draw(&frame)?;
        self.enter(PanelState::ShowingSecondDraw);
        if self.pause(timings.display_duration) {
            return Ok(Flow::Shutdown);
        }

        debug!("DisplayWorker: Display done");
        Ok(Flow::Continue)
    }

    /// Queue empty: backlight off, wait, panel off. Nothing to do if already dark.
    fn idle<D: PanelDriver>(&mut self, session: &mut DisplaySession<D>) -> Result<Flow, PanelError> {
        self.enter(PanelState::Idle);
        if !session.is_powered() && !session.is_backlit() {
            return Ok(Flow::Continue);
        }

        if !self.idle_logged {
            info!("DisplayWorker: No frames queued. Turning off");
            self.idle_logged = true;
        }
        session.set_backlight(false)?;
        if self.pause(self.settings.timings.power_down_delay) {
            return Ok(Flow::Shutdown);
        }
        session.turn_off()?;
        Ok(Flow::Continue)
    }

    /// Sleep that ends early on shutdown. Returns `true` if shutdown was raised.
    fn pause(&self, duration: Duration) -> bool {
        self.shutdown.wait_timeout(duration)
    }

    fn enter(&mut self, next: PanelState) {
        if self.state != next {
            trace!("DisplayWorker: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

/// Handle to the running worker thread.
///
/// Dropping the handle raises shutdown and waits for the worker, so the
/// panel is switched off even when the owner bails out early.
pub struct DisplayWorkerHandle {
    shutdown: ShutdownSignal,
    thread_handle: Option<JoinHandle<Result<(), PanelError>>>,
}

impl DisplayWorkerHandle {
    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map_or(true, |handle| handle.is_finished())
    }

    /// Wait for the worker to stop and return its outcome.
    ///
    /// Raise the shutdown signal first, or this blocks for as long as the
    /// worker keeps running.
    pub fn join(mut self) -> Result<()> {
        let handle = self
            .thread_handle
            .take()
            .ok_or_else(|| anyhow!("Display worker already joined"))?;
        match handle.join() {
            Ok(result) => result.context("Display worker failed"),
            Err(e) => Err(anyhow!("Display worker thread panicked: {:?}", e)),
        }
    }
}

impl Drop for DisplayWorkerHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            debug!("DisplayWorkerHandle dropped, stopping worker");
            self.shutdown.raise();
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("DisplayWorker stopped with error: {}", e),
                Err(e) => error!("DisplayWorker thread panicked: {:?}", e),
            }
        }
    }
}
