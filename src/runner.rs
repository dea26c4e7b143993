//! Application runner - wires controller, simulated players and script.

use anyhow::{Context, Result, bail};
use crossbeam_channel::{Receiver, unbounded};
use log::{debug, info, warn};
use std::io::{Read, Write};

use crate::cli::Args;
use crate::config::{ControllerSettings, PathConfig, SETTINGS_FILE};
use crate::core::adapter::{TransportRequest, TransportSender};
use crate::core::controller::{ControllerSnapshot, PlaybackController};
use crate::core::event_bus::EventBus;
use crate::core::handle::ControllerHandle;
use crate::core::player_events::Notification;
use crate::core::stream::MediaId;
use crate::script::{self, ScriptCommand};
use crate::simulator::{SimulatedStream, Simulator};

/// Output switches for [`Session`]
#[derive(Clone, Copy, Debug, Default)]
pub struct OutputOptions {
    pub json: bool,
    /// Print StateChanged notifications too
    pub all_events: bool,
}

/// One controller driving simulated players, printing to `out`
pub struct Session<W: Write> {
    handle: ControllerHandle,
    requests: Receiver<(usize, TransportRequest)>,
    simulator: Simulator,
    bus: EventBus<Notification>,
    out: W,
    options: OutputOptions,
}

impl<W: Write> Session<W> {
    pub fn start(
        settings: &ControllerSettings,
        streams: Vec<SimulatedStream>,
        out: W,
        options: OutputOptions,
    ) -> Result<Self> {
        let config = settings.controller_config();
        if streams.len() > config.slots {
            bail!("{} streams given but only {} slots configured", streams.len(), config.slots);
        }

        let bus = EventBus::with_limit(settings.event_queue_limit);
        let (tx, requests) = unbounded();
        let controller = PlaybackController::new(config, TransportSender::new(tx), bus.emitter());
        let handle = ControllerHandle::spawn(controller)?;

        let identities = streams.iter().map(|_| Some(MediaId::new())).collect();
        let simulator = Simulator::new(streams);
        let mut session = Self {
            handle,
            requests,
            simulator,
            bus,
            out,
            options,
        };

        session.handle.initialize(identities);
        for telemetry in session.simulator.lengths() {
            session.handle.report(telemetry);
        }
        session.settle()?;
        Ok(session)
    }

    pub fn handle(&self) -> &ControllerHandle {
        &self.handle
    }

    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }

    /// Run every command of a parsed script; stops after `close`
    pub fn run_script(&mut self, text: &str) -> Result<()> {
        let commands = script::parse_script(text)?;
        info!("Running script ({} commands)", commands.len());
        for (line, cmd) in commands {
            debug!("line {}: {:?}", line, cmd);
            let closing = cmd == ScriptCommand::Close;
            self.execute(&cmd)
                .with_context(|| format!("Script failed at line {}", line))?;
            if closing {
                break;
            }
        }
        Ok(())
    }

    pub fn execute(&mut self, cmd: &ScriptCommand) -> Result<()> {
        let outcome = match cmd {
            ScriptCommand::ToggleMode => Some(self.handle.toggle_mode()),
            ScriptCommand::Control(command) => Some(self.handle.call(command.clone())),
            ScriptCommand::Close => Some(self.handle.close()),
            ScriptCommand::Tick(dt) => {
                for telemetry in self.simulator.tick(*dt) {
                    self.handle.report(telemetry);
                }
                None
            }
            ScriptCommand::Show => {
                self.settle()?;
                return self.show();
            }
        };
        if let Some(outcome) = outcome {
            if !outcome.is_applied() {
                writeln!(self.out, "! {:?}", outcome)?;
            }
        }
        self.settle()
    }

    /// Pump requests into the simulator and telemetry back until quiet, then
    /// print notifications.
    fn settle(&mut self) -> Result<()> {
        // Snapshot round-trip: every queued input has been applied after it
        while self.handle.snapshot().is_some() {
            let pending: Vec<_> = self.requests.try_iter().collect();
            if pending.is_empty() {
                break;
            }
            for (index, request) in pending {
                for telemetry in self.simulator.apply(index, request) {
                    self.handle.report(telemetry);
                }
            }
        }
        for notification in self.bus.poll() {
            let is_change = matches!(notification, Notification::StateChanged { .. });
            if self.options.all_events || !is_change {
                writeln!(self.out, "> {}", notification)?;
            }
        }
        Ok(())
    }

    fn show(&mut self) -> Result<()> {
        let Some(snapshot) = self.handle.snapshot() else {
            writeln!(self.out, "(closed)")?;
            return Ok(());
        };
        if self.options.json {
            let json = serde_json::to_string_pretty(&snapshot).context("Failed to serialize snapshot")?;
            writeln!(self.out, "{}", json)?;
        } else {
            let text = render(&snapshot, &self.simulator);
            write!(self.out, "{}", text)?;
        }
        Ok(())
    }

    /// Close (if still open) and hand back the output
    pub fn finish(mut self) -> Result<W> {
        if self.handle.close().is_applied() {
            self.settle()?;
        }
        Ok(self.out)
    }
}

/// Human-readable snapshot
pub fn render(snapshot: &ControllerSnapshot, simulator: &Simulator) -> String {
    let mut text = format!("mode: {}  speed: {}x\n", snapshot.mode, snapshot.speed);
    for s in &snapshot.streams {
        let name = simulator
            .streams()
            .get(s.index)
            .map(|sim| sim.name.as_str())
            .unwrap_or("-");
        if s.identity.is_none() {
            text.push_str(&format!("  [{}] (empty)\n", s.index + 1));
            continue;
        }
        text.push_str(&format!(
            "  [{}] {:<12} {:<7} {} / {}  {:>5.1}%  {}x\n",
            s.index + 1,
            name,
            if s.is_playing { "playing" } else { "paused" },
            s.position_text,
            s.length_text,
            s.progress * 100.0,
            s.speed,
        ));
    }
    if let Some(ref session) = snapshot.session {
        text.push_str(&format!(
            "  global       {:<7} {} / {}  {:>5.1}%\n",
            if session.is_playing { "playing" } else { "paused" },
            session.global_position_text,
            session.effective_duration_text,
            session.progress * 100.0,
        ));
    }
    text
}

/// Run the syncview binary with given arguments.
pub fn run_app(args: Args) -> Result<()> {
    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    let settings_path = path_config.config_file(SETTINGS_FILE);
    info!("Config path: {}", settings_path.display());

    let mut settings = ControllerSettings::load(&settings_path)?;
    if let Some(slots) = args.slots {
        settings.stream_slots = slots;
    }
    if args.precise {
        settings.precise_timecode = true;
    }
    // Grow to fit the given streams unless slots were pinned on the command line
    if args.slots.is_none() && args.streams.len() > settings.stream_slots {
        settings.stream_slots = args.streams.len();
    }
    let settings = settings.sanitized();

    if args.streams.is_empty() {
        warn!("No streams given; every command will be ignored");
    }
    let streams = args
        .streams
        .iter()
        .map(|spec| SimulatedStream::new(spec.name.clone(), spec.length))
        .collect();

    let script = match &args.script {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script: {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read script from stdin")?;
            text
        }
    };

    let options = OutputOptions {
        json: args.json,
        all_events: args.events,
    };
    let stdout = std::io::stdout();
    let mut session = Session::start(&settings, streams, stdout.lock(), options)?;
    session.run_script(&script)?;
    session.finish()?;
    Ok(())
}
