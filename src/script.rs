//! Line-oriented command scripts.
//!
//! ```text
//! # comment
//! sync                    toggle Individual/Synchronized
//! play 1 | play all       TARGET is a 1-based slot or "all" (global)
//! pause | toggle | stop [TARGET]
//! seek TARGET +SECS       relative seek
//! jump TARGET RATIO       absolute seek, 0..1
//! step TARGET +1|-1       frame step
//! speed TARGET VALUE      e.g. 1.5, 2x
//! tick SECS               advance simulated time
//! show                    print a snapshot
//! close
//! ```
//!
//! Targets default to "all" when omitted on play/pause/toggle/stop.

use std::fmt;
use std::time::Duration;

use crate::core::player_events::{Command, CommandKind, Scope};

#[derive(Clone, Debug, PartialEq)]
pub enum ScriptCommand {
    ToggleMode,
    Control(Command),
    Tick(Duration),
    Show,
    Close,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ScriptErrorKind {
    UnknownCommand(String),
    MissingArgument(&'static str),
    InvalidTarget(String),
    InvalidNumber(String),
    TrailingInput(String),
}

impl fmt::Display for ScriptErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptErrorKind::UnknownCommand(w) => write!(f, "unknown command '{}'", w),
            ScriptErrorKind::MissingArgument(what) => write!(f, "missing {}", what),
            ScriptErrorKind::InvalidTarget(t) => {
                write!(f, "invalid target '{}' (expected slot number or 'all')", t)
            }
            ScriptErrorKind::InvalidNumber(n) => write!(f, "invalid number '{}'", n),
            ScriptErrorKind::TrailingInput(t) => write!(f, "unexpected '{}'", t),
        }
    }
}

/// Parse failure with its 1-based line number
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptError {
    pub line: usize,
    pub kind: ScriptErrorKind,
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.kind)
    }
}

impl std::error::Error for ScriptError {}

/// Parse a whole script into (line number, command) pairs
pub fn parse_script(text: &str) -> Result<Vec<(usize, ScriptCommand)>, ScriptError> {
    let mut out = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let parsed = parse_line(line).map_err(|kind| ScriptError { line: i + 1, kind })?;
        if let Some(cmd) = parsed {
            out.push((i + 1, cmd));
        }
    }
    Ok(out)
}

/// Parse one line. Blank lines and comments are None.
pub fn parse_line(line: &str) -> Result<Option<ScriptCommand>, ScriptErrorKind> {
    let line = line.split('#').next().unwrap_or("").trim();
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };

    let cmd = match verb.to_ascii_lowercase().as_str() {
        "sync" => ScriptCommand::ToggleMode,
        "show" => ScriptCommand::Show,
        "close" => ScriptCommand::Close,
        "tick" => {
            let secs = number(words.next().ok_or(ScriptErrorKind::MissingArgument("seconds"))?)?;
            let dt = Duration::try_from_secs_f64(secs)
                .map_err(|_| ScriptErrorKind::InvalidNumber(secs.to_string()))?;
            ScriptCommand::Tick(dt)
        }
        transport @ ("play" | "pause" | "toggle" | "stop") => {
            let scope = match words.next() {
                Some(t) => target(t)?,
                None => Scope::Global,
            };
            let kind = match transport {
                "play" => CommandKind::Play,
                "pause" => CommandKind::Pause,
                "toggle" => CommandKind::TogglePlay,
                _ => CommandKind::Stop,
            };
            control(scope, kind)
        }
        "seek" => {
            let scope = target(words.next().ok_or(ScriptErrorKind::MissingArgument("target"))?)?;
            let delta = number(words.next().ok_or(ScriptErrorKind::MissingArgument("seconds"))?)?;
            control(scope, CommandKind::SeekRelative(delta))
        }
        "jump" => {
            let scope = target(words.next().ok_or(ScriptErrorKind::MissingArgument("target"))?)?;
            let ratio = number(words.next().ok_or(ScriptErrorKind::MissingArgument("ratio"))?)?;
            control(scope, CommandKind::SeekToRatio(ratio))
        }
        "step" => {
            let scope = target(words.next().ok_or(ScriptErrorKind::MissingArgument("target"))?)?;
            let word = words.next().ok_or(ScriptErrorKind::MissingArgument("direction"))?;
            let frames: i32 = word
                .parse()
                .map_err(|_| ScriptErrorKind::InvalidNumber(word.to_string()))?;
            control(scope, CommandKind::StepFrame(frames))
        }
        "speed" => {
            let scope = target(words.next().ok_or(ScriptErrorKind::MissingArgument("target"))?)?;
            // Raw text: the controller decides what is a valid speed
            let value = words.next().ok_or(ScriptErrorKind::MissingArgument("speed"))?;
            control(scope, CommandKind::SetSpeed(value.to_string()))
        }
        other => return Err(ScriptErrorKind::UnknownCommand(other.to_string())),
    };

    if let Some(extra) = words.next() {
        return Err(ScriptErrorKind::TrailingInput(extra.to_string()));
    }
    Ok(Some(cmd))
}

fn control(scope: Scope, kind: CommandKind) -> ScriptCommand {
    ScriptCommand::Control(Command { scope, kind })
}

/// "all" -> Global, "N" (1-based) -> Stream(N-1)
fn target(word: &str) -> Result<Scope, ScriptErrorKind> {
    if word.eq_ignore_ascii_case("all") {
        return Ok(Scope::Global);
    }
    match word.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(Scope::Stream(n - 1)),
        _ => Err(ScriptErrorKind::InvalidTarget(word.to_string())),
    }
}

fn number(word: &str) -> Result<f64, ScriptErrorKind> {
    word.parse::<f64>()
        .ok()
        .filter(|v| !v.is_nan())
        .ok_or_else(|| ScriptErrorKind::InvalidNumber(word.to_string()))
}
