// src/error.rs
//! Error taxonomy for the panel and its worker.

use thiserror::Error;

/// Errors raised by the panel session, its driver and the frame queue.
///
/// Only [`PanelError::InvalidFrameSize`] is recoverable: the offending frame is
/// dropped and the worker keeps going. Everything else ends the worker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PanelError {
    /// The display device could not be claimed (missing node, line busy, bus error).
    #[error("display hardware unavailable: {0}")]
    HardwareUnavailable(String),
    /// Transfer to the controller failed after the device was claimed.
    #[error("display hardware I/O error: {0}")]
    HardwareIo(String),
    #[error("invalid frame size: expected {expected} pixels, got {actual}")]
    InvalidFrameSize { expected: usize, actual: usize },
    /// A draw or power request reached the panel before `initialize()`.
    #[error("display session used before initialization")]
    NotInitialized,
    /// The display worker is gone; nobody will ever read the frame.
    #[error("frame queue closed")]
    QueueClosed,
}

impl PanelError {
    /// Whether the owning worker has to stop on this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PanelError::InvalidFrameSize { .. })
    }
}
