//! Thread-owned controller.
//!
//! A dedicated thread owns the [`PlaybackController`]; commands, telemetry and
//! snapshot requests reach it over one crossbeam channel and are applied in
//! arrival order. Adapters on their own threads report through a
//! [`TelemetrySink`] and never touch controller state directly.
//!
//! # Example
//! ```ignore
//! let handle = ControllerHandle::spawn(controller)?;
//! handle.initialize(vec![Some(MediaId::new()), Some(MediaId::new())]);
//! let sink = handle.telemetry_sink();
//! sink.report(Telemetry::Length { stream: 0, length });
//! handle.call(Command::stream(0, CommandKind::Play));
//! ```

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use log::{debug, error, trace};
use std::thread;

use super::adapter::Telemetry;
use super::controller::{CommandOutcome, ControllerSnapshot, IgnoreReason, PlaybackController};
use super::player_events::Command;
use super::stream::MediaId;

type Reply = Option<Sender<CommandOutcome>>;

enum Input {
    Initialize(Vec<Option<MediaId>>, Reply),
    Command(Command, Reply),
    ToggleMode(Reply),
    Telemetry(Telemetry),
    Snapshot(Sender<ControllerSnapshot>),
    Close(Reply),
}

/// Owner of the controller thread. Dropping it closes the controller.
pub struct ControllerHandle {
    tx: Sender<Input>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ControllerHandle {
    pub fn spawn(controller: PlaybackController) -> Result<Self> {
        let (tx, rx) = unbounded();
        let thread = thread::Builder::new()
            .name("syncview-controller".into())
            .spawn(move || run(controller, rx))
            .context("Failed to spawn controller thread")?;
        debug!("Controller thread started");
        Ok(Self {
            tx,
            thread: Some(thread),
        })
    }

    pub fn initialize(&self, identities: Vec<Option<MediaId>>) -> CommandOutcome {
        self.roundtrip(|reply| Input::Initialize(identities, Some(reply)))
    }

    /// Fire-and-forget command
    pub fn send(&self, command: Command) {
        let _ = self.tx.send(Input::Command(command, None));
    }

    /// Command, waiting for the outcome
    pub fn call(&self, command: Command) -> CommandOutcome {
        self.roundtrip(|reply| Input::Command(command, Some(reply)))
    }

    pub fn toggle_mode(&self) -> CommandOutcome {
        self.roundtrip(|reply| Input::ToggleMode(Some(reply)))
    }

    pub fn report(&self, telemetry: Telemetry) {
        let _ = self.tx.send(Input::Telemetry(telemetry));
    }

    /// Cloneable telemetry entry point for adapter threads
    pub fn telemetry_sink(&self) -> TelemetrySink {
        TelemetrySink {
            tx: self.tx.clone(),
        }
    }

    /// State after every input queued so far. None once the thread is gone.
    pub fn snapshot(&self) -> Option<ControllerSnapshot> {
        let (reply, rx) = bounded(1);
        self.tx.send(Input::Snapshot(reply)).ok()?;
        rx.recv().ok()
    }

    /// Close the controller and stop its thread
    pub fn close(&self) -> CommandOutcome {
        self.roundtrip(|reply| Input::Close(Some(reply)))
    }

    fn roundtrip(&self, input: impl FnOnce(Sender<CommandOutcome>) -> Input) -> CommandOutcome {
        let (reply, rx) = bounded(1);
        if self.tx.send(input(reply)).is_err() {
            return CommandOutcome::Ignored(IgnoreReason::Closed);
        }
        rx.recv()
            .unwrap_or(CommandOutcome::Ignored(IgnoreReason::Closed))
    }
}

impl Drop for ControllerHandle {
    fn drop(&mut self) {
        let _ = self.tx.send(Input::Close(None));
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Controller thread panicked");
            }
        }
    }
}

/// Telemetry-only sender; silently drops reports once the controller is gone
#[derive(Clone)]
pub struct TelemetrySink {
    tx: Sender<Input>,
}

impl TelemetrySink {
    /// Returns false if the controller thread has stopped
    pub fn report(&self, telemetry: Telemetry) -> bool {
        self.tx.send(Input::Telemetry(telemetry)).is_ok()
    }
}

fn reply(to: Reply, outcome: CommandOutcome) {
    if let Some(tx) = to {
        let _ = tx.send(outcome);
    }
}

fn run(mut controller: PlaybackController, rx: Receiver<Input>) {
    for input in rx.iter() {
        match input {
            Input::Initialize(identities, to) => reply(to, controller.initialize(identities)),
            Input::Command(command, to) => reply(to, controller.dispatch(command)),
            Input::ToggleMode(to) => reply(to, controller.toggle_mode()),
            Input::Telemetry(telemetry) => {
                let outcome = controller.apply_telemetry(telemetry);
                if !outcome.is_applied() {
                    trace!("Telemetry dropped: {:?}", outcome);
                }
            }
            Input::Snapshot(to) => {
                let _ = to.send(controller.snapshot());
            }
            Input::Close(to) => {
                reply(to, controller.close());
                break;
            }
        }
    }
    debug!("Controller thread stopped");
}
