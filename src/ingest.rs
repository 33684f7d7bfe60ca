// src/ingest.rs
//! FrameIngest - background thread turning raw frame files into queued frames.
//!
//! Reads one path per line (stdin in the binary). Each file must hold a
//! packed RGB888 image of exactly the panel's size. Bad lines are logged and
//! skipped; end of input ends the thread.

use crate::frame::{Frame, RGB_BYTES_PER_PIXEL};
use crate::panel::PanelGeometry;
use crate::queue::FrameSender;
use anyhow::{bail, Context, Result};
use log::*;
use std::io::BufRead;
use std::path::Path;
use std::thread::{self, JoinHandle};

/// Load one raw frame file and check it against the panel size.
pub fn load_frame(path: &Path, geometry: PanelGeometry) -> Result<Frame> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let expected = geometry.pixel_count() * RGB_BYTES_PER_PIXEL;
    if bytes.len() != expected {
        bail!(
            "{} is {} bytes, expected {} ({}x{} RGB888)",
            path.display(),
            bytes.len(),
            expected,
            geometry.width,
            geometry.height
        );
    }
    Ok(Frame::from_rgb_bytes(&bytes)?)
}

/// Drain `input` line by line, enqueueing every frame that loads.
///
/// Returns the number of frames enqueued. Stops early if the queue is closed.
pub fn pump<R: BufRead>(input: R, frames: &FrameSender, geometry: PanelGeometry) -> Result<usize> {
    let mut enqueued = 0;
    for line in input.lines() {
        let line = line.context("Failed to read frame path")?;
        let path = line.trim();
        if path.is_empty() {
            continue;
        }
        match load_frame(Path::new(path), geometry) {
            Ok(frame) => {
                frames.enqueue(frame)?;
                enqueued += 1;
                info!("FrameIngest: queued {}", path);
            }
            Err(e) => warn!("FrameIngest: skipping {}: {:#}", path, e),
        }
    }
    Ok(enqueued)
}

/// Spawn the ingest thread. It is not joined: a blocked read on stdin must
/// not hold up process exit.
pub fn spawn<R>(input: R, frames: FrameSender, geometry: PanelGeometry) -> Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    let handle = thread::Builder::new()
        .name("frame-ingest".to_string())
        .spawn(move || match pump(input, &frames, geometry) {
            Ok(n) => info!("FrameIngest: input closed after {} frames", n),
            Err(e) => error!("FrameIngest: stopped: {:#}", e),
        })
        .context("Failed to spawn frame ingest thread")?;
    info!("FrameIngest spawned");
    Ok(handle)
}
