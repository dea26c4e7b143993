//! Per-stream playback record.
//!
//! One `StreamState` per controller slot. A slot without an identity is
//! unoccupied and every command addressing it is a no-op.
//!
//! Progress is derived from position and length on every read, so it cannot
//! drift from its inputs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use super::clock::{Timecode, compute_progress};

/// Opaque reference to the backing media item of a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MediaId(pub Uuid);

impl MediaId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MediaId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Playback state of a single stream slot.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamState {
    identity: Option<MediaId>,
    is_playing: bool,
    position: Duration,
    length: Duration,
    speed: f64,
    timecode: Timecode,
}

impl StreamState {
    /// Unoccupied slot
    pub fn empty(speed: f64, timecode: Timecode) -> Self {
        Self {
            identity: None,
            is_playing: false,
            position: Duration::ZERO,
            length: Duration::ZERO,
            speed,
            timecode,
        }
    }

    /// Slot holding `identity`, at zero with unknown length
    pub fn occupied(identity: MediaId, speed: f64, timecode: Timecode) -> Self {
        Self {
            identity: Some(identity),
            ..Self::empty(speed, timecode)
        }
    }

    /// Drop identity and zero all transport state. Speed survives.
    pub fn clear(&mut self) {
        *self = Self::empty(self.speed, self.timecode);
    }

    pub fn identity(&self) -> Option<MediaId> {
        self.identity
    }

    pub fn is_occupied(&self) -> bool {
        self.identity.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn position(&self) -> Duration {
        self.position
    }

    pub fn length(&self) -> Duration {
        self.length
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// `position / length`, 0 for zero-length streams
    pub fn progress(&self) -> f64 {
        compute_progress(self.position, self.length)
    }

    pub fn position_text(&self) -> String {
        self.timecode.format(self.position)
    }

    pub fn length_text(&self) -> String {
        self.timecode.format(self.length)
    }

    /// Position left after `anchor` (saturating)
    pub fn remaining_after(&self, anchor: Duration) -> Duration {
        self.length.saturating_sub(anchor)
    }

    // Setters report whether anything observable changed so the controller
    // only notifies real changes.

    pub fn set_playing(&mut self, playing: bool) -> bool {
        let changed = self.is_playing != playing;
        self.is_playing = playing;
        changed
    }

    pub fn set_position(&mut self, position: Duration) -> bool {
        let changed = self.position != position;
        self.position = position;
        changed
    }

    pub fn set_length(&mut self, length: Duration) -> bool {
        let changed = self.length != length;
        self.length = length;
        changed
    }

    pub fn set_speed(&mut self, speed: f64) -> bool {
        let changed = self.speed != speed;
        self.speed = speed;
        changed
    }

    pub fn snapshot(&self, index: usize) -> StreamSnapshot {
        StreamSnapshot {
            index,
            identity: self.identity,
            is_playing: self.is_playing,
            position_secs: self.position.as_secs_f64(),
            length_secs: self.length.as_secs_f64(),
            progress: self.progress(),
            speed: self.speed,
            position_text: self.position_text(),
            length_text: self.length_text(),
        }
    }
}

/// Serializable copy of one stream for UI polling
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamSnapshot {
    pub index: usize,
    pub identity: Option<MediaId>,
    pub is_playing: bool,
    pub position_secs: f64,
    pub length_secs: f64,
    pub progress: f64,
    pub speed: f64,
    pub position_text: String,
    pub length_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_slot() {
        let s = StreamState::empty(1.0, Timecode::Standard);
        assert!(!s.is_occupied());
        assert!(!s.is_playing());
        assert_eq!(s.progress(), 0.0);
        assert_eq!(s.position_text(), "00:00");
    }

    #[test]
    fn test_progress_tracks_mutations() {
        let mut s = StreamState::occupied(MediaId::new(), 1.0, Timecode::Standard);
        s.set_position(Duration::from_secs(30));
        // Length unknown yet
        assert_eq!(s.progress(), 0.0);

        s.set_length(Duration::from_secs(60));
        assert_eq!(s.progress(), 0.5);

        s.set_position(Duration::from_secs(45));
        assert_eq!(s.progress(), 0.75);

        s.set_length(Duration::ZERO);
        assert_eq!(s.progress(), 0.0);
    }

    #[test]
    fn test_setters_report_change() {
        let mut s = StreamState::occupied(MediaId::new(), 1.0, Timecode::Standard);
        assert!(s.set_playing(true));
        assert!(!s.set_playing(true));
        assert!(s.set_speed(2.0));
        assert!(!s.set_speed(2.0));
    }

    #[test]
    fn test_clear_keeps_speed() {
        let mut s = StreamState::occupied(MediaId::new(), 1.5, Timecode::Precise);
        s.set_length(Duration::from_secs(10));
        s.set_playing(true);
        s.clear();
        assert!(!s.is_occupied());
        assert!(!s.is_playing());
        assert_eq!(s.length(), Duration::ZERO);
        assert_eq!(s.speed(), 1.5);
        assert_eq!(s.length_text(), "00:00.00");
    }

    #[test]
    fn test_snapshot_texts() {
        let mut s = StreamState::occupied(MediaId::new(), 1.0, Timecode::Standard);
        s.set_length(Duration::from_secs(3725));
        s.set_position(Duration::from_secs(61));
        let snap = s.snapshot(1);
        assert_eq!(snap.index, 1);
        assert_eq!(snap.length_text, "1:02:05");
        assert_eq!(snap.position_text, "01:01");
    }
}
