// src/queue.rs
//! Frame queue - unbounded FIFO between frame producers and the display worker.
//!
//! Producers hold cloneable [`FrameSender`]s; the worker holds the one and only
//! [`FrameReceiver`]. Pushing never blocks.

use crate::error::PanelError;
use crate::frame::Frame;
use log::*;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};

/// Create the queue. Call once at start-up.
pub fn frame_queue() -> (FrameSender, FrameReceiver) {
    let (tx, rx) = channel();
    (FrameSender { tx }, FrameReceiver { rx })
}

/// Producer side of the queue.
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: Sender<Frame>,
}

impl FrameSender {
    /// Append a frame behind everything already queued.
    ///
    /// # Errors
    ///
    /// [`PanelError::QueueClosed`] once the receiver has been dropped.
    pub fn enqueue(&self, frame: Frame) -> Result<(), PanelError> {
        trace!("FrameQueue: enqueue {} pixels", frame.len());
        self.tx.send(frame).map_err(|_| PanelError::QueueClosed)
    }
}

/// Consumer side of the queue. Not cloneable.
#[derive(Debug)]
pub struct FrameReceiver {
    rx: Receiver<Frame>,
}

impl FrameReceiver {
    /// Take the oldest pending frame without waiting.
    ///
    /// An empty queue and a queue with no producers left both read as `None`.
    pub fn try_next(&self) -> Option<Frame> {
        match self.rx.try_recv() {
            Ok(frame) => Some(frame),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                trace!("FrameQueue: all producers gone");
                None
            }
        }
    }
}
