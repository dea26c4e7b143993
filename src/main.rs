use syncview::cli::Args;
use syncview::config::{LOG_FILE, PathConfig};
use syncview::runner;

use anyhow::Context;
use clap::Parser;
use log::{debug, error, info};

fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for log setup)
    let args = Args::parse();

    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());

    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        // File logging with specified verbosity level
        let log_path = match log_path_opt {
            Some(path) => path.clone(),
            None => {
                if let Err(e) = path_config.ensure_dir() {
                    eprintln!("Warning: {:#}", e);
                }
                path_config.config_file(LOG_FILE)
            }
        };
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging with specified verbosity level (respects RUST_LOG if set)
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }

    info!("syncview starting...");
    debug!("Command-line args: {:?}", args);

    runner::run_app(args).inspect_err(|e| error!("{:#}", e))
}
