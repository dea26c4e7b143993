//! Player adapter boundary.
//!
//! The controller never decodes or renders. It raises [`TransportRequest`]s
//! per stream through a [`PlayerAdapter`] and learns what actually happened
//! from [`Telemetry`] pushed back by the adapter.
//!
//! Requests are fire-and-forget: the controller updates its own state
//! optimistically and reconciles on the next telemetry report.

use crossbeam_channel::Sender;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Transport operation for one concrete stream
#[derive(Clone, Debug, PartialEq)]
pub enum TransportRequest {
    Play,
    Pause,
    /// Absolute position within the stream (already anchor-translated for
    /// global seeks)
    Seek(Duration),
    /// +1 forward, -1 backward. Frame size is the adapter's business.
    StepFrame(i32),
    SetSpeed(f64),
}

/// Adapter -> controller playback telemetry
#[derive(Clone, Debug, PartialEq)]
pub enum Telemetry {
    Position { stream: usize, position: Duration },
    Length { stream: usize, length: Duration },
    Ended { stream: usize },
}

impl Telemetry {
    pub fn stream(&self) -> usize {
        match self {
            Telemetry::Position { stream, .. }
            | Telemetry::Length { stream, .. }
            | Telemetry::Ended { stream } => *stream,
        }
    }
}

/// Receives transport requests from the controller.
///
/// Called on the controller's execution context; implementations must not
/// block. Hand work off to the real player and report back via telemetry.
pub trait PlayerAdapter: Send {
    fn request(&mut self, stream: usize, request: TransportRequest);
}

impl<F> PlayerAdapter for F
where
    F: FnMut(usize, TransportRequest) + Send,
{
    fn request(&mut self, stream: usize, request: TransportRequest) {
        self(stream, request)
    }
}

/// Adapter forwarding requests over a channel (silent when unconnected).
///
/// Lets the real players live on another thread and drain requests at their
/// own pace.
#[derive(Clone, Debug, Default)]
pub struct TransportSender {
    sender: Option<Sender<(usize, TransportRequest)>>,
}

impl TransportSender {
    pub fn new(sender: Sender<(usize, TransportRequest)>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Sender that drops every request (tests, headless sessions)
    pub fn dummy() -> Self {
        Self { sender: None }
    }
}

impl PlayerAdapter for TransportSender {
    fn request(&mut self, stream: usize, request: TransportRequest) {
        if let Some(ref tx) = self.sender {
            let _ = tx.send((stream, request)); // receiver might be gone
        }
    }
}

/// Adapter that records every request; clones share the same log.
#[derive(Clone, Debug, Default)]
pub struct RecordingAdapter {
    log: Arc<Mutex<Vec<(usize, TransportRequest)>>>,
}

impl RecordingAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests recorded so far
    pub fn requests(&self) -> Vec<(usize, TransportRequest)> {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Drain the log
    pub fn take(&self) -> Vec<(usize, TransportRequest)> {
        std::mem::take(&mut *self.log.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Requests addressed to `stream`
    pub fn for_stream(&self, stream: usize) -> Vec<TransportRequest> {
        self.requests()
            .into_iter()
            .filter(|(i, _)| *i == stream)
            .map(|(_, r)| r)
            .collect()
    }
}

impl PlayerAdapter for RecordingAdapter {
    fn request(&mut self, stream: usize, request: TransportRequest) {
        self.log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((stream, request));
    }
}
