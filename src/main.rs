// src/main.rs

pub mod config;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod panel;
pub mod queue;
pub mod shutdown;
pub mod worker;

use crate::{
    config::{Config, DriverKind, HardwareConfig},
    panel::{drivers::HeadlessPanelDriver, PANEL_COLOR_MODE, PANEL_GEOMETRY},
    queue::frame_queue,
    shutdown::ShutdownSignal,
    worker::{DisplayWorker, DisplayWorkerHandle, WorkerSettings, WorkerTimings},
};

use anyhow::{Context, Result};
use log::*;
use nix::sys::signal::{SigSet, Signal};
use std::io::BufReader;
use std::thread;

/// Block SIGINT/SIGTERM on the calling thread (inherited by every thread
/// spawned afterwards) and raise `shutdown` from a dedicated thread when one
/// arrives.
fn spawn_signal_thread(shutdown: ShutdownSignal) -> Result<()> {
    let mut mask = SigSet::empty();
    mask.add(Signal::SIGINT);
    mask.add(Signal::SIGTERM);
    mask.thread_block()
        .context("Failed to block termination signals")?;

    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || match mask.wait() {
            Ok(signal) => {
                info!("Received {}, shutting down", signal);
                shutdown.raise();
            }
            Err(e) => {
                error!("Waiting for signals failed: {}", e);
                shutdown.raise();
            }
        })
        .context("Failed to spawn signal thread")?;
    Ok(())
}

fn spawn_worker(
    worker: DisplayWorker,
    hardware: &HardwareConfig,
) -> Result<DisplayWorkerHandle> {
    match hardware.driver {
        DriverKind::Headless => {
            info!("Using headless panel driver");
            worker.spawn(|| Ok(HeadlessPanelDriver::new(PANEL_GEOMETRY)))
        }
        DriverKind::St7789 => spawn_st7789(worker, hardware),
    }
}

#[cfg(target_os = "linux")]
fn spawn_st7789(worker: DisplayWorker, hardware: &HardwareConfig) -> Result<DisplayWorkerHandle> {
    info!(
        "Using ST7789 on {} ({} Hz), GPIO {}",
        hardware.spi_device.display(),
        hardware.spi_speed_hz,
        hardware.gpio_chip.display()
    );
    let hardware = hardware.clone();
    worker.spawn(move || panel::drivers::open_linux(&hardware, PANEL_GEOMETRY))
}

#[cfg(not(target_os = "linux"))]
fn spawn_st7789(_worker: DisplayWorker, _hardware: &HardwareConfig) -> Result<DisplayWorkerHandle> {
    Err(error::PanelError::HardwareUnavailable(
        "the st7789 driver needs Linux spidev and GPIO; set hardware.driver to \"headless\"".into(),
    )
    .into())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    info!("Starting qr-panel...");

    config::load_dotenv();
    let config = Config::load().context("Failed to load configuration")?;
    info!(
        "Hold duration {}s, inverted: {}, driver: {:?}",
        config.display.hold_secs, config.display.inverted, config.hardware.driver
    );

    let shutdown = ShutdownSignal::new();
    spawn_signal_thread(shutdown.clone())?;

    let (frames_tx, frames_rx) = frame_queue();
    let settings = WorkerSettings {
        color_mode: PANEL_COLOR_MODE,
        inverted: config.display.inverted,
        timings: WorkerTimings::default().with_display_duration(config.display.hold_duration()),
    };
    let worker = DisplayWorker::new(frames_rx, shutdown.clone(), settings);
    let worker_handle = spawn_worker(worker, &config.hardware)?;

    // Not joined: it may sit in a blocking stdin read after the worker stops.
    let stdin = BufReader::new(std::io::stdin());
    ingest::spawn(stdin, frames_tx, PANEL_GEOMETRY)?;

    let result = worker_handle.join();
    match &result {
        Ok(()) => info!("qr-panel exited successfully."),
        Err(e) => error!("qr-panel stopping: {:#}", e),
    }
    result
}
