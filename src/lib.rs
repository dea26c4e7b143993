//! SYNCVIEW - synchronized multi-stream playback controller
//!
//! Re-exports all modules for use by the binary target.

// Core engine (streams, sync, controller, events)
pub mod core;

// App modules
pub mod cli;
pub mod config;
pub mod runner;
pub mod script;
pub mod simulator;

// Re-export commonly used types from core
pub use core::controller::{CommandOutcome, ControllerConfig, IgnoreReason, PlaybackController};
pub use core::event_bus::{EventBus, EventEmitter};
pub use core::handle::ControllerHandle;
pub use core::player_events::{Command, CommandKind, Notification, Scope};
