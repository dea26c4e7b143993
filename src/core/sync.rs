//! Sync coordinator: Individual / Synchronized mode state machine.
//!
//! Entering sync captures each occupied stream's current position as its
//! anchor. The shared timeline then runs from 0 to the effective duration,
//! which is the smallest remaining length past any anchor. A global position
//! `g` maps to `anchor_i + g` on every stream.
//!
//! Anchor and duration math lives here as pure steps. Transport side effects
//! (pausing before entry, forwarding seeks) belong to the controller.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use super::clock::{self, Timecode};
use super::stream::StreamState;

/// Fewest occupied streams a synchronized session accepts
pub const MIN_SYNC_STREAMS: usize = 2;

/// Controller playback mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Individual,
    Synchronized,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Individual => write!(f, "individual"),
            Mode::Synchronized => write!(f, "synchronized"),
        }
    }
}

/// Shared timeline state, alive only while synchronized
#[derive(Clone, Debug, PartialEq)]
pub struct SyncSession {
    anchors: BTreeMap<usize, Duration>,
    effective_duration: Duration,
    global_position: Duration,
    is_playing: bool,
}

impl SyncSession {
    /// Capture anchors from the occupied streams.
    ///
    /// Returns the number of occupied streams as error when below
    /// [`MIN_SYNC_STREAMS`].
    pub fn establish(streams: &[StreamState]) -> Result<Self, usize> {
        let anchors: BTreeMap<usize, Duration> = streams
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_occupied())
            .map(|(i, s)| (i, s.position()))
            .collect();
        if anchors.len() < MIN_SYNC_STREAMS {
            return Err(anchors.len());
        }
        let effective_duration = effective_duration(&anchors, streams);
        Ok(Self {
            anchors,
            effective_duration,
            global_position: Duration::ZERO,
            is_playing: false,
        })
    }

    pub fn anchors(&self) -> &BTreeMap<usize, Duration> {
        &self.anchors
    }

    pub fn anchor(&self, index: usize) -> Option<Duration> {
        self.anchors.get(&index).copied()
    }

    pub fn effective_duration(&self) -> Duration {
        self.effective_duration
    }

    pub fn global_position(&self) -> Duration {
        self.global_position
    }

    pub fn progress(&self) -> f64 {
        clock::compute_progress(self.global_position, self.effective_duration)
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub(crate) fn set_playing(&mut self, playing: bool) -> bool {
        let changed = self.is_playing != playing;
        self.is_playing = playing;
        changed
    }

    pub fn at_end(&self) -> bool {
        !self.effective_duration.is_zero() && self.global_position >= self.effective_duration
    }

    /// Stream whose telemetry drives the global position (lowest index)
    pub fn reference_stream(&self) -> Option<usize> {
        self.anchors.keys().next().copied()
    }

    /// Per-stream target for the current global position
    pub fn target_for(&self, index: usize) -> Option<Duration> {
        self.anchor(index).map(|a| a + self.global_position)
    }

    /// Move the global position to `position` (clamped). Returns true if it moved.
    pub(crate) fn set_global_position(&mut self, position: Duration) -> bool {
        let position = position.min(self.effective_duration);
        let changed = self.global_position != position;
        self.global_position = position;
        changed
    }

    pub(crate) fn seek_relative(&mut self, delta_secs: f64) -> bool {
        let target = clock::clamp_seek(self.global_position, delta_secs, self.effective_duration);
        self.set_global_position(target)
    }

    /// None for NaN ratios
    pub(crate) fn seek_to_ratio(&mut self, ratio: f64) -> Option<bool> {
        let target = clock::position_at_ratio(ratio, self.effective_duration)?;
        Some(self.set_global_position(target))
    }

    /// Follow telemetry from `index`. Only the reference stream moves the
    /// global position. Returns true if the global position changed.
    pub(crate) fn follow(&mut self, index: usize, position: Duration) -> bool {
        if self.reference_stream() != Some(index) {
            return false;
        }
        let Some(anchor) = self.anchor(index) else {
            return false;
        };
        self.set_global_position(position.saturating_sub(anchor))
    }

    /// Recompute the effective duration after a length report.
    /// Returns true if it changed.
    pub(crate) fn refresh_duration(&mut self, streams: &[StreamState]) -> bool {
        let updated = effective_duration(&self.anchors, streams);
        if updated == self.effective_duration {
            return false;
        }
        self.effective_duration = updated;
        self.global_position = self.global_position.min(updated);
        true
    }

    pub fn snapshot(&self, timecode: Timecode) -> SessionSnapshot {
        SessionSnapshot {
            anchors: self
                .anchors
                .iter()
                .map(|(&stream, a)| AnchorSnapshot {
                    stream,
                    anchor_secs: a.as_secs_f64(),
                })
                .collect(),
            effective_duration_secs: self.effective_duration.as_secs_f64(),
            global_position_secs: self.global_position.as_secs_f64(),
            progress: self.progress(),
            is_playing: self.is_playing,
            global_position_text: timecode.format(self.global_position),
            effective_duration_text: timecode.format(self.effective_duration),
        }
    }
}

/// `min_i(length_i - anchor_i)` over anchored streams, saturating at zero
fn effective_duration(anchors: &BTreeMap<usize, Duration>, streams: &[StreamState]) -> Duration {
    anchors
        .iter()
        .filter_map(|(&i, &anchor)| streams.get(i).map(|s| s.remaining_after(anchor)))
        .min()
        .unwrap_or(Duration::ZERO)
}

/// Owns the mode and the optional session.
///
/// `Synchronized` is represented by `session.is_some()`; there is no separate
/// flag that could disagree with it.
#[derive(Clone, Debug, Default)]
pub struct SyncCoordinator {
    session: Option<SyncSession>,
}

impl SyncCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        if self.session.is_some() {
            Mode::Synchronized
        } else {
            Mode::Individual
        }
    }

    pub fn session(&self) -> Option<&SyncSession> {
        self.session.as_ref()
    }

    pub(crate) fn session_mut(&mut self) -> Option<&mut SyncSession> {
        self.session.as_mut()
    }

    /// Number of occupied slots
    pub fn occupied(streams: &[StreamState]) -> usize {
        streams.iter().filter(|s| s.is_occupied()).count()
    }

    /// Individual -> Synchronized. Caller must have paused every stream.
    ///
    /// Anchors are always recomputed; an existing session is replaced.
    pub fn enter(&mut self, streams: &[StreamState]) -> Result<&SyncSession, usize> {
        debug_assert!(streams.iter().all(|s| !s.is_playing()));
        let session = SyncSession::establish(streams)?;
        Ok(self.session.insert(session))
    }

    /// Synchronized -> Individual. Returns the dropped session.
    pub fn exit(&mut self) -> Option<SyncSession> {
        self.session.take()
    }

    /// Translated seek targets for every anchored stream, clamped to each
    /// stream's length.
    pub fn seek_targets(&self, streams: &[StreamState]) -> Vec<(usize, Duration)> {
        let Some(session) = &self.session else {
            return Vec::new();
        };
        session
            .anchors
            .keys()
            .filter_map(|&i| {
                let stream = streams.get(i).filter(|s| s.is_occupied())?;
                let target = session.target_for(i)?;
                Some((i, target.min(stream.length())))
            })
            .collect()
    }
}

/// Anchor entry of [`SessionSnapshot`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnchorSnapshot {
    pub stream: usize,
    pub anchor_secs: f64,
}

/// Serializable copy of the sync session
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub anchors: Vec<AnchorSnapshot>,
    pub effective_duration_secs: f64,
    pub global_position_secs: f64,
    pub progress: f64,
    pub is_playing: bool,
    pub global_position_text: String,
    pub effective_duration_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stream::MediaId;

    fn stream(position: u64, length: u64) -> StreamState {
        let mut s = StreamState::occupied(MediaId::new(), 1.0, Timecode::Standard);
        s.set_length(Duration::from_secs(length));
        s.set_position(Duration::from_secs(position));
        s
    }

    fn empty() -> StreamState {
        StreamState::empty(1.0, Timecode::Standard)
    }

    #[test]
    fn test_effective_duration_min_remaining() {
        let streams = vec![stream(10, 120), stream(5, 90)];
        let session = SyncSession::establish(&streams).unwrap();
        assert_eq!(session.effective_duration(), Duration::from_secs(85));
        assert_eq!(session.anchor(0), Some(Duration::from_secs(10)));
        assert_eq!(session.anchor(1), Some(Duration::from_secs(5)));
        assert_eq!(session.global_position(), Duration::ZERO);
    }

    #[test]
    fn test_empty_slots_not_anchored() {
        let streams = vec![stream(0, 60), empty(), stream(20, 50), empty()];
        let session = SyncSession::establish(&streams).unwrap();
        assert_eq!(session.anchors().len(), 2);
        assert_eq!(session.anchor(1), None);
        assert_eq!(session.effective_duration(), Duration::from_secs(30));
    }

    #[test]
    fn test_establish_rejects_single_stream() {
        assert_eq!(SyncSession::establish(&[stream(0, 60), empty()]), Err(1));
        assert_eq!(SyncSession::establish(&[empty(), empty()]), Err(0));
        assert_eq!(SyncSession::establish(&[]), Err(0));
    }

    #[test]
    fn test_anchor_past_length_saturates() {
        // Position reported beyond a stale length
        let streams = vec![stream(100, 90), stream(0, 60)];
        let session = SyncSession::establish(&streams).unwrap();
        assert_eq!(session.effective_duration(), Duration::ZERO);
        assert!(!session.at_end());
    }

    #[test]
    fn test_coordinator_enter_exit() {
        let streams = vec![stream(10, 120), stream(5, 90)];
        let mut coord = SyncCoordinator::new();
        assert_eq!(coord.mode(), Mode::Individual);

        coord.enter(&streams).unwrap();
        assert_eq!(coord.mode(), Mode::Synchronized);

        let dropped = coord.exit().unwrap();
        assert_eq!(dropped.effective_duration(), Duration::from_secs(85));
        assert_eq!(coord.mode(), Mode::Individual);
        assert!(coord.session().is_none());
        assert!(coord.exit().is_none());
    }

    #[test]
    fn test_seek_targets_translate_by_anchor() {
        let streams = vec![stream(10, 120), stream(5, 90)];
        let mut coord = SyncCoordinator::new();
        coord.enter(&streams).unwrap();
        coord.session_mut().unwrap().seek_relative(40.0);

        let targets = coord.seek_targets(&streams);
        assert_eq!(
            targets,
            vec![(0, Duration::from_secs(50)), (1, Duration::from_secs(45))]
        );
    }

    #[test]
    fn test_global_seek_clamped() {
        let streams = vec![stream(10, 120), stream(5, 90)];
        let mut session = SyncSession::establish(&streams).unwrap();

        assert!(session.seek_relative(1e12));
        assert_eq!(session.global_position(), Duration::from_secs(85));
        assert!(session.at_end());

        assert!(session.seek_relative(f64::NEG_INFINITY));
        assert_eq!(session.global_position(), Duration::ZERO);

        assert_eq!(session.seek_to_ratio(0.5), Some(true));
        assert_eq!(session.global_position(), Duration::from_secs_f64(42.5));
        assert_eq!(session.seek_to_ratio(f64::NAN), None);
    }

    #[test]
    fn test_follow_reference_stream_only() {
        let streams = vec![stream(10, 120), stream(5, 90)];
        let mut session = SyncSession::establish(&streams).unwrap();

        assert!(!session.follow(1, Duration::from_secs(30)));
        assert!(session.follow(0, Duration::from_secs(30)));
        assert_eq!(session.global_position(), Duration::from_secs(20));

        // Before anchor saturates to zero
        assert!(session.follow(0, Duration::from_secs(2)));
        assert_eq!(session.global_position(), Duration::ZERO);
    }

    #[test]
    fn test_refresh_duration_clamps_position() {
        let mut streams = vec![stream(10, 120), stream(5, 90)];
        let mut session = SyncSession::establish(&streams).unwrap();
        session.seek_relative(80.0);

        streams[1].set_length(Duration::from_secs(45));
        assert!(session.refresh_duration(&streams));
        assert_eq!(session.effective_duration(), Duration::from_secs(40));
        assert_eq!(session.global_position(), Duration::from_secs(40));
        assert!(!session.refresh_duration(&streams));
    }
}
