use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// Build version with target info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Adapter: simulated\n",
    "Target:  ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Synchronized multi-stream playback controller (simulated players)
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Streams to load as NAME:SECONDS, one per slot (e.g. intro:120 cam2:95.5)
    #[arg(value_name = "NAME:SECONDS")]
    pub streams: Vec<StreamSpec>,

    /// Command script to run (default: read commands from stdin)
    #[arg(short = 's', long = "script", value_name = "FILE")]
    pub script: Option<PathBuf>,

    /// Number of stream slots (overrides settings file)
    #[arg(short = 'n', long = "slots", value_name = "N")]
    pub slots: Option<usize>,

    /// Show hundredths in timecodes
    #[arg(short = 'p', long = "precise")]
    pub precise: bool,

    /// Print snapshots as JSON
    #[arg(short = 'j', long = "json")]
    pub json: bool,

    /// Print every notification, not only the summary lines
    #[arg(short = 'e', long = "events")]
    pub events: bool,

    /// Enable debug logging to file (default: syncview.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

/// `NAME:SECONDS` stream description for the simulator
#[derive(Clone, Debug, PartialEq)]
pub struct StreamSpec {
    pub name: String,
    pub length: Duration,
}

impl FromStr for StreamSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, secs) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("expected NAME:SECONDS, got {:?}", s))?;
        if name.is_empty() {
            return Err(format!("missing stream name in {:?}", s));
        }
        let secs: f64 = secs
            .trim()
            .parse()
            .map_err(|_| format!("invalid length in {:?}", s))?;
        let length = Duration::try_from_secs_f64(secs)
            .map_err(|_| format!("length must be a non-negative number of seconds: {:?}", s))?;
        Ok(Self {
            name: name.to_string(),
            length,
        })
    }
}
