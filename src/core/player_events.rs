//! Player commands and notifications.
//!
//! Commands carry a [`Scope`] and a [`CommandKind`] and are dispatched through
//! one handler, instead of a command per stream per verb.

use std::fmt;
use std::time::Duration;

use super::sync::Mode;

// === Commands ===

/// Which part of the controller a command or notification concerns
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Shared synchronized timeline
    Global,
    /// Single stream slot (0-based)
    Stream(usize),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Stream(i) => write!(f, "stream {}", i + 1),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CommandKind {
    TogglePlay,
    Play,
    Pause,
    /// Pause and rewind (to 0, or to the anchors for global scope)
    Stop,
    /// Relative seek in seconds
    SeekRelative(f64),
    /// Absolute seek as a fraction of the length
    SeekToRatio(f64),
    /// +1 / -1 frame; always pauses
    StepFrame(i32),
    /// Raw user input, parsed by the controller
    SetSpeed(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    pub scope: Scope,
    pub kind: CommandKind,
}

impl Command {
    pub fn global(kind: CommandKind) -> Self {
        Self {
            scope: Scope::Global,
            kind,
        }
    }

    pub fn stream(index: usize, kind: CommandKind) -> Self {
        Self {
            scope: Scope::Stream(index),
            kind,
        }
    }
}

// === Notifications ===

/// Observable field named by [`Notification::StateChanged`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Identity,
    IsPlaying,
    Position,
    Length,
    Progress,
    Speed,
    GlobalPosition,
    EffectiveDuration,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Identity => "identity",
            Field::IsPlaying => "is_playing",
            Field::Position => "position",
            Field::Length => "length",
            Field::Progress => "progress",
            Field::Speed => "speed",
            Field::GlobalPosition => "global_position",
            Field::EffectiveDuration => "effective_duration",
        }
    }
}

/// Published by the controller after each state mutation
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// Streams assigned; all prior state dropped
    Initialized { occupied: usize },
    StateChanged { scope: Scope, field: Field },
    ModeChanged(Mode),
    /// Anchors of the new session, so adapters may pre-seek
    SyncEstablished {
        anchors: Vec<(usize, Duration)>,
        effective_duration: Duration,
    },
    /// Sync refused: fewer than two occupied streams
    SyncRejected { occupied: usize },
    PlaybackEnded(Scope),
    /// Controller closed; always the last notification
    SessionEnded,
}

impl Notification {
    pub fn changed(scope: Scope, field: Field) -> Self {
        Notification::StateChanged { scope, field }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Initialized { occupied } => {
                write!(f, "initialized ({} occupied)", occupied)
            }
            Notification::StateChanged { scope, field } => {
                write!(f, "{} changed: {}", scope, field.as_str())
            }
            Notification::ModeChanged(mode) => write!(f, "mode -> {}", mode),
            Notification::SyncEstablished {
                anchors,
                effective_duration,
            } => {
                write!(f, "sync established ({:.2}s):", effective_duration.as_secs_f64())?;
                for (i, a) in anchors {
                    write!(f, " #{}@{:.2}s", i + 1, a.as_secs_f64())?;
                }
                Ok(())
            }
            Notification::SyncRejected { occupied } => {
                write!(f, "sync rejected ({} occupied)", occupied)
            }
            Notification::PlaybackEnded(scope) => write!(f, "{} ended", scope),
            Notification::SessionEnded => write!(f, "session ended"),
        }
    }
}
