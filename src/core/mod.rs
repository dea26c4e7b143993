//! Core playback engine - streams, sync, controller, events
//!
//! These modules know nothing about real players or the CLI.

pub mod adapter;
pub mod clock;
pub mod controller;
pub mod event_bus;
pub mod handle;
pub mod player_events;
pub mod stream;
pub mod sync;

// Re-exports for convenience
pub use adapter::{PlayerAdapter, RecordingAdapter, Telemetry, TransportRequest, TransportSender};
pub use clock::Timecode;
pub use controller::{
    CommandOutcome, ControllerConfig, ControllerSnapshot, IgnoreReason, PlaybackController,
    SpeedScope,
};
pub use event_bus::{EventBus, EventEmitter};
pub use handle::{ControllerHandle, TelemetrySink};
pub use player_events::{Command, CommandKind, Field, Notification, Scope};
pub use stream::{MediaId, StreamState};
pub use sync::{Mode, SyncCoordinator, SyncSession};
