//! Multi-stream playback controller.
//!
//! **Architecture**: Controller owns every [`StreamState`] and the optional
//! sync session. It never touches decode/render resources; it raises
//! [`TransportRequest`]s through a [`PlayerAdapter`] and reconciles its state
//! from adapter telemetry.
//!
//! # Command scopes
//!
//! - **Stream(i)**: acts on one slot, in any mode
//! - **Global**: acts on the shared timeline, only while synchronized
//!
//! Commands against empty slots, global transport in Individual mode and
//! unparseable speeds are ignored and reported as [`CommandOutcome::Ignored`].
//! Nothing here fails hard.
//!
//! # Notifications
//!
//! Every observable mutation emits a [`Notification`] synchronously, after the
//! mutation and before the call returns. No batching.
//!
//! # Threading
//!
//! The controller is plain `&mut self` state. Wrap it in
//! [`ControllerHandle`](super::handle::ControllerHandle) to feed commands and
//! telemetry from several threads through one execution context.

use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::adapter::{PlayerAdapter, Telemetry, TransportRequest};
use super::clock::{self, Timecode};
use super::event_bus::EventEmitter;
use super::player_events::{Command, CommandKind, Field, Notification, Scope};
use super::stream::{MediaId, StreamSnapshot, StreamState};
use super::sync::{MIN_SYNC_STREAMS, Mode, SessionSnapshot, SyncCoordinator, SyncSession};

/// Upper bound for stream slots per controller
pub const MAX_STREAMS: usize = 16;

/// Fastest accepted playback speed
pub const MAX_SPEED: f64 = 16.0;

/// Whether speed is one value for all streams or tracked per stream
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedScope {
    #[default]
    Shared,
    PerStream,
}

/// Construction-time controller parameters
#[derive(Clone, Debug, PartialEq)]
pub struct ControllerConfig {
    /// Number of stream slots (1..=MAX_STREAMS)
    pub slots: usize,
    pub speed_scope: SpeedScope,
    pub default_speed: f64,
    pub timecode: Timecode,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            slots: 2,
            speed_scope: SpeedScope::Shared,
            default_speed: 1.0,
            timecode: Timecode::Standard,
        }
    }
}

/// Parse user speed input ("1.5", " 2x ", "0.25X").
///
/// Accepts finite values in `(0, MAX_SPEED]`; anything else is None.
pub fn parse_speed(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    let number = trimmed
        .strip_suffix(|c: char| c == 'x' || c == 'X')
        .unwrap_or(trimmed)
        .trim();
    let value: f64 = number.parse().ok()?;
    is_valid_speed(value).then_some(value)
}

fn is_valid_speed(value: f64) -> bool {
    value.is_finite() && value > 0.0 && value <= MAX_SPEED
}

/// Why a command or telemetry report was not applied
#[derive(Clone, Debug, PartialEq)]
pub enum IgnoreReason {
    /// Controller already closed
    Closed,
    /// Slot out of range or unoccupied
    NoSuchStream(usize),
    /// Global transport command while in Individual mode
    RequiresSync,
    /// Sync needs at least two occupied streams
    NotEnoughStreams { occupied: usize },
    InvalidSpeed(String),
    InvalidRatio,
    InvalidStep,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::Closed => write!(f, "controller is closed"),
            IgnoreReason::NoSuchStream(i) => write!(f, "no stream in slot {}", i + 1),
            IgnoreReason::RequiresSync => write!(f, "global command requires synchronized mode"),
            IgnoreReason::NotEnoughStreams { occupied } => write!(
                f,
                "synchronization needs {} streams, {} occupied",
                MIN_SYNC_STREAMS, occupied
            ),
            IgnoreReason::InvalidSpeed(s) => write!(f, "invalid speed: {:?}", s),
            IgnoreReason::InvalidRatio => write!(f, "seek ratio is not a number"),
            IgnoreReason::InvalidStep => write!(f, "frame step must be non-zero"),
        }
    }
}

impl std::error::Error for IgnoreReason {}

/// Result of a controller call. Never an error: ignored calls are policy.
#[derive(Clone, Debug, PartialEq)]
pub enum CommandOutcome {
    Applied,
    Ignored(IgnoreReason),
}

impl CommandOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, CommandOutcome::Applied)
    }
}

impl From<Result<(), IgnoreReason>> for CommandOutcome {
    fn from(result: Result<(), IgnoreReason>) -> Self {
        match result {
            Ok(()) => CommandOutcome::Applied,
            Err(reason) => CommandOutcome::Ignored(reason),
        }
    }
}

/// Serializable copy of the whole controller
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControllerSnapshot {
    pub mode: Mode,
    pub speed: f64,
    pub closed: bool,
    pub streams: Vec<StreamSnapshot>,
    pub session: Option<SessionSnapshot>,
}

/// N-stream playback controller
pub struct PlaybackController {
    config: ControllerConfig,
    streams: Vec<StreamState>,
    sync: SyncCoordinator,
    /// Shared speed (and the speed new streams start with)
    speed: f64,
    adapter: Box<dyn PlayerAdapter>,
    events: EventEmitter<Notification>,
    closed: bool,
}

impl PlaybackController {
    pub fn new(
        config: ControllerConfig,
        adapter: impl PlayerAdapter + 'static,
        events: EventEmitter<Notification>,
    ) -> Self {
        let mut config = config;
        config.slots = config.slots.clamp(1, MAX_STREAMS);
        if !is_valid_speed(config.default_speed) {
            warn!("Default speed {} out of range, using 1.0", config.default_speed);
            config.default_speed = 1.0;
        }
        let streams = (0..config.slots)
            .map(|_| StreamState::empty(config.default_speed, config.timecode))
            .collect();
        info!(
            "PlaybackController created ({} slots, {:?} speed)",
            config.slots, config.speed_scope
        );
        Self {
            speed: config.default_speed,
            config,
            streams,
            sync: SyncCoordinator::new(),
            adapter: Box::new(adapter),
            events,
            closed: false,
        }
    }

    // === Accessors ===

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.sync.mode()
    }

    pub fn session(&self) -> Option<&SyncSession> {
        self.sync.session()
    }

    pub fn streams(&self) -> &[StreamState] {
        &self.streams
    }

    pub fn stream(&self, index: usize) -> Option<&StreamState> {
        self.streams.get(index)
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            mode: self.mode(),
            speed: self.speed,
            closed: self.closed,
            streams: self
                .streams
                .iter()
                .enumerate()
                .map(|(i, s)| s.snapshot(i))
                .collect(),
            session: self.sync.session().map(|s| s.snapshot(self.config.timecode)),
        }
    }

    // === Session lifecycle ===

    /// Assign identities to slots (index = slot) and reset all state.
    ///
    /// Drops any sync session. Identities beyond the slot count are ignored.
    pub fn initialize(&mut self, identities: Vec<Option<MediaId>>) -> CommandOutcome {
        if self.closed {
            return CommandOutcome::Ignored(IgnoreReason::Closed);
        }
        if identities.len() > self.streams.len() {
            warn!(
                "{} identities for {} slots, extra ignored",
                identities.len(),
                self.streams.len()
            );
        }

        for i in self.occupied_indices() {
            self.pause_stream(i);
        }
        if self.sync.exit().is_some() {
            self.notify(Notification::ModeChanged(Mode::Individual));
        }

        let speed = self.config.default_speed;
        let timecode = self.config.timecode;
        if self.speed != speed {
            self.speed = speed;
            self.changed(Scope::Global, Field::Speed);
        }
        for (i, slot) in self.streams.iter_mut().enumerate() {
            *slot = match identities.get(i).copied().flatten() {
                Some(id) => StreamState::occupied(id, speed, timecode),
                None => StreamState::empty(speed, timecode),
            };
        }

        let occupied = SyncCoordinator::occupied(&self.streams);
        info!("Initialized {} of {} slots", occupied, self.streams.len());
        self.notify(Notification::Initialized { occupied });
        for i in 0..self.streams.len() {
            self.changed(Scope::Stream(i), Field::Identity);
        }
        CommandOutcome::Applied
    }

    /// Stop every stream, then signal session end. Terminal.
    pub fn close(&mut self) -> CommandOutcome {
        if self.closed {
            return CommandOutcome::Ignored(IgnoreReason::Closed);
        }
        info!("Closing playback session");
        for i in self.occupied_indices() {
            self.pause_stream(i);
        }
        if self.sync.session_mut().is_some_and(|s| s.set_playing(false)) {
            self.changed(Scope::Global, Field::IsPlaying);
        }
        if self.sync.exit().is_some() {
            self.notify(Notification::ModeChanged(Mode::Individual));
        }

        self.closed = true;
        self.notify(Notification::SessionEnded);
        for stream in &mut self.streams {
            stream.clear();
        }
        CommandOutcome::Applied
    }

    // === Mode state machine ===

    /// Individual <-> Synchronized. The only way in or out of sync.
    pub fn toggle_mode(&mut self) -> CommandOutcome {
        let result = if self.closed {
            Err(IgnoreReason::Closed)
        } else {
            match self.sync.mode() {
                Mode::Individual => self.enter_sync(),
                Mode::Synchronized => {
                    self.exit_sync();
                    Ok(())
                }
            }
        };
        if let Err(ref reason) = result {
            debug!("Mode toggle ignored: {}", reason);
        }
        result.into()
    }

    fn enter_sync(&mut self) -> Result<(), IgnoreReason> {
        let occupied = SyncCoordinator::occupied(&self.streams);
        if occupied < MIN_SYNC_STREAMS {
            warn!(
                "Cannot synchronize {} stream(s), need at least {}",
                occupied, MIN_SYNC_STREAMS
            );
            self.notify(Notification::SyncRejected { occupied });
            return Err(IgnoreReason::NotEnoughStreams { occupied });
        }

        // Anchors must be captured from stopped streams
        for i in self.occupied_indices() {
            self.pause_stream(i);
        }

        let session = self
            .sync
            .enter(&self.streams)
            .map_err(|occupied| IgnoreReason::NotEnoughStreams { occupied })?;
        let anchors: Vec<(usize, Duration)> =
            session.anchors().iter().map(|(&i, &a)| (i, a)).collect();
        let effective_duration = session.effective_duration();
        info!(
            "Synchronized {} streams, effective duration {}",
            anchors.len(),
            self.config.timecode.format(effective_duration)
        );

        self.notify(Notification::ModeChanged(Mode::Synchronized));
        self.notify(Notification::SyncEstablished {
            anchors,
            effective_duration,
        });
        self.changed(Scope::Global, Field::GlobalPosition);
        Ok(())
    }

    fn exit_sync(&mut self) {
        for i in self.occupied_indices() {
            self.pause_stream(i);
        }
        if self.sync.session_mut().is_some_and(|s| s.set_playing(false)) {
            self.changed(Scope::Global, Field::IsPlaying);
        }
        self.sync.exit();
        info!("Left synchronized mode");
        self.notify(Notification::ModeChanged(Mode::Individual));
    }

    // === Commands ===

    /// Apply a command. Ignored commands leave state untouched.
    pub fn dispatch(&mut self, command: Command) -> CommandOutcome {
        let result = if self.closed {
            Err(IgnoreReason::Closed)
        } else {
            match command.scope {
                Scope::Global => self.global_command(&command.kind),
                Scope::Stream(i) => self.stream_command(i, &command.kind),
            }
        };
        if let Err(ref reason) = result {
            debug!("{:?} on {} ignored: {}", command.kind, command.scope, reason);
        }
        result.into()
    }

    fn stream_command(&mut self, i: usize, kind: &CommandKind) -> Result<(), IgnoreReason> {
        self.check_stream(i)?;
        match *kind {
            CommandKind::TogglePlay => {
                if self.streams[i].is_playing() {
                    self.pause_stream(i);
                } else {
                    self.play_stream(i);
                }
            }
            CommandKind::Play => {
                self.play_stream(i);
            }
            CommandKind::Pause => {
                self.pause_stream(i);
            }
            CommandKind::Stop => {
                self.pause_stream(i);
                self.move_stream(i, Duration::ZERO);
            }
            CommandKind::SeekRelative(delta) => {
                let s = &self.streams[i];
                let target = clock::clamp_seek(s.position(), delta, s.length());
                self.move_stream(i, target);
            }
            CommandKind::SeekToRatio(ratio) => {
                let target = clock::position_at_ratio(ratio, self.streams[i].length())
                    .ok_or(IgnoreReason::InvalidRatio)?;
                self.move_stream(i, target);
            }
            CommandKind::StepFrame(frames) => {
                let direction = step_direction(frames)?;
                self.pause_stream(i);
                self.send(i, TransportRequest::StepFrame(direction));
            }
            CommandKind::SetSpeed(ref input) => self.set_speed(Scope::Stream(i), input)?,
        }
        Ok(())
    }

    fn global_command(&mut self, kind: &CommandKind) -> Result<(), IgnoreReason> {
        match *kind {
            // Speed is not transport: allowed in both modes
            CommandKind::SetSpeed(ref input) => self.set_speed(Scope::Global, input)?,
            CommandKind::TogglePlay => {
                if self.require_session()?.is_playing() {
                    self.global_pause();
                } else {
                    self.global_play();
                }
            }
            CommandKind::Play => {
                self.require_session()?;
                self.global_play();
            }
            CommandKind::Pause => {
                self.require_session()?;
                self.global_pause();
            }
            CommandKind::Stop => {
                self.require_session()?;
                self.global_pause();
                self.global_seek_to(Duration::ZERO);
            }
            CommandKind::SeekRelative(delta) => {
                let moved = self.require_session_mut()?.seek_relative(delta);
                self.apply_global_position(moved);
            }
            CommandKind::SeekToRatio(ratio) => {
                let moved = self
                    .require_session_mut()?
                    .seek_to_ratio(ratio)
                    .ok_or(IgnoreReason::InvalidRatio)?;
                self.apply_global_position(moved);
            }
            CommandKind::StepFrame(frames) => {
                self.require_session()?;
                let direction = step_direction(frames)?;
                self.global_pause();
                for i in self.anchored_indices() {
                    self.send(i, TransportRequest::StepFrame(direction));
                }
            }
        }
        Ok(())
    }

    fn global_play(&mut self) {
        if self.sync.session().is_some_and(|s| s.at_end()) {
            debug!("Global playback at end, restarting from anchors");
            self.global_seek_to(Duration::ZERO);
        }
        for i in self.anchored_indices() {
            self.play_stream(i);
        }
        if self.sync.session_mut().is_some_and(|s| s.set_playing(true)) {
            self.changed(Scope::Global, Field::IsPlaying);
        }
    }

    fn global_pause(&mut self) {
        for i in self.anchored_indices() {
            self.pause_stream(i);
        }
        if self.sync.session_mut().is_some_and(|s| s.set_playing(false)) {
            self.changed(Scope::Global, Field::IsPlaying);
        }
    }

    fn global_seek_to(&mut self, position: Duration) {
        let moved = self
            .sync
            .session_mut()
            .is_some_and(|s| s.set_global_position(position));
        self.apply_global_position(moved);
    }

    /// Forward one translated seek per anchored stream
    fn apply_global_position(&mut self, moved: bool) {
        if moved {
            self.changed(Scope::Global, Field::GlobalPosition);
        }
        for (i, target) in self.sync.seek_targets(&self.streams) {
            self.move_stream(i, target);
        }
    }

    fn set_speed(&mut self, scope: Scope, input: &str) -> Result<(), IgnoreReason> {
        if let Scope::Stream(i) = scope {
            self.check_stream(i)?;
        }
        let Some(value) = parse_speed(input) else {
            return Err(IgnoreReason::InvalidSpeed(input.to_string()));
        };

        let shared = scope == Scope::Global || self.config.speed_scope == SpeedScope::Shared;
        let targets = match scope {
            Scope::Stream(i) if !shared => {
                if self.streams[i].set_speed(value) {
                    self.changed(Scope::Stream(i), Field::Speed);
                }
                vec![i]
            }
            _ => {
                if self.speed != value {
                    self.speed = value;
                    self.changed(Scope::Global, Field::Speed);
                }
                // Empty slots pick it up too, for when they get occupied
                for i in 0..self.streams.len() {
                    if self.streams[i].set_speed(value) && self.streams[i].is_occupied() {
                        self.changed(Scope::Stream(i), Field::Speed);
                    }
                }
                self.occupied_indices()
            }
        };

        debug!("Speed {} applied to {}", value, scope);
        for i in targets {
            self.send(i, TransportRequest::SetSpeed(value));
        }
        Ok(())
    }

    // === Telemetry ===

    pub fn apply_telemetry(&mut self, telemetry: Telemetry) -> CommandOutcome {
        match telemetry {
            Telemetry::Position { stream, position } => self.report_position(stream, position),
            Telemetry::Length { stream, length } => self.report_length(stream, length),
            Telemetry::Ended { stream } => self.report_playback_ended(stream),
        }
    }

    /// Adapter reports the actual position (overwrites ours)
    pub fn report_position(&mut self, i: usize, position: Duration) -> CommandOutcome {
        let result = self.check_stream(i).map(|()| {
            trace!("Stream {} position {:?}", i, position);
            if self.streams[i].set_position(position) {
                self.changed(Scope::Stream(i), Field::Position);
                self.changed(Scope::Stream(i), Field::Progress);
            }
            if self.sync.session_mut().is_some_and(|s| s.follow(i, position)) {
                self.changed(Scope::Global, Field::GlobalPosition);
            }
            if self
                .sync
                .session()
                .is_some_and(|s| s.is_playing() && s.at_end())
            {
                self.end_global_playback();
            }
        });
        result.into()
    }

    /// Adapter reports the native length of a stream
    pub fn report_length(&mut self, i: usize, length: Duration) -> CommandOutcome {
        let result = self.check_stream(i).map(|()| {
            trace!("Stream {} length {:?}", i, length);
            if self.streams[i].set_length(length) {
                self.changed(Scope::Stream(i), Field::Length);
                self.changed(Scope::Stream(i), Field::Progress);
            }
            let streams = &self.streams;
            if self
                .sync
                .session_mut()
                .is_some_and(|s| s.refresh_duration(streams))
            {
                self.changed(Scope::Global, Field::EffectiveDuration);
            }
        });
        result.into()
    }

    /// Adapter reports the stream ran to its end
    pub fn report_playback_ended(&mut self, i: usize) -> CommandOutcome {
        let result = self.check_stream(i).map(|()| {
            debug!("Stream {} ended", i);
            // The stream stopped by itself; no pause request needed
            if self.streams[i].set_playing(false) {
                self.changed(Scope::Stream(i), Field::IsPlaying);
            }
            let length = self.streams[i].length();
            if !length.is_zero() && self.streams[i].set_position(length) {
                self.changed(Scope::Stream(i), Field::Position);
                self.changed(Scope::Stream(i), Field::Progress);
            }
            self.notify(Notification::PlaybackEnded(Scope::Stream(i)));

            let anchored = self
                .sync
                .session()
                .is_some_and(|s| s.is_playing() && s.anchor(i).is_some());
            if anchored {
                self.end_global_playback();
            }
        });
        result.into()
    }

    /// Shared timeline ran out: park at the end and pause everything
    fn end_global_playback(&mut self) {
        info!("Synchronized playback reached the end");
        let moved = self.sync.session_mut().is_some_and(|s| {
            let end = s.effective_duration();
            s.set_global_position(end)
        });
        if moved {
            self.changed(Scope::Global, Field::GlobalPosition);
        }
        self.global_pause();
        self.notify(Notification::PlaybackEnded(Scope::Global));
    }

    // === Helpers ===

    fn check_stream(&self, i: usize) -> Result<(), IgnoreReason> {
        if self.closed {
            return Err(IgnoreReason::Closed);
        }
        match self.streams.get(i) {
            Some(s) if s.is_occupied() => Ok(()),
            _ => Err(IgnoreReason::NoSuchStream(i)),
        }
    }

    fn require_session(&self) -> Result<&SyncSession, IgnoreReason> {
        self.sync.session().ok_or(IgnoreReason::RequiresSync)
    }

    fn require_session_mut(&mut self) -> Result<&mut SyncSession, IgnoreReason> {
        self.sync.session_mut().ok_or(IgnoreReason::RequiresSync)
    }

    fn occupied_indices(&self) -> Vec<usize> {
        self.streams
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_occupied())
            .map(|(i, _)| i)
            .collect()
    }

    fn anchored_indices(&self) -> Vec<usize> {
        self.sync
            .session()
            .map(|s| s.anchors().keys().copied().collect())
            .unwrap_or_default()
    }

    fn play_stream(&mut self, i: usize) {
        if self.streams[i].set_playing(true) {
            self.send(i, TransportRequest::Play);
            self.changed(Scope::Stream(i), Field::IsPlaying);
        }
    }

    fn pause_stream(&mut self, i: usize) {
        if self.streams[i].set_playing(false) {
            self.send(i, TransportRequest::Pause);
            self.changed(Scope::Stream(i), Field::IsPlaying);
        }
    }

    /// Optimistic position update + seek request (sent even when unchanged,
    /// the adapter may have drifted)
    fn move_stream(&mut self, i: usize, position: Duration) {
        if self.streams[i].set_position(position) {
            self.changed(Scope::Stream(i), Field::Position);
            self.changed(Scope::Stream(i), Field::Progress);
        }
        self.send(i, TransportRequest::Seek(position));
    }

    fn send(&mut self, i: usize, request: TransportRequest) {
        trace!("-> stream {}: {:?}", i, request);
        self.adapter.request(i, request);
    }

    fn notify(&self, notification: Notification) {
        self.events.emit(notification);
    }

    fn changed(&self, scope: Scope, field: Field) {
        self.notify(Notification::changed(scope, field));
    }
}

/// Normalize a frame step to +1 / -1
fn step_direction(frames: i32) -> Result<i32, IgnoreReason> {
    match frames.signum() {
        0 => Err(IgnoreReason::InvalidStep),
        d => Ok(d),
    }
}
