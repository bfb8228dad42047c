//! `ralph`: run an external coding agent in a loop until it reports completion.
//!
//! Reads `.ralph/config.json` (or `--config`), loads the requirements document
//! and prompt template, then invokes the agent until it prints
//! `<promise>COMPLETE</promise>` or the configured bound is reached.

use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing::{error, info};

use ralph::core::budget::Bound;
use ralph::core::types::LogLevel;
use ralph::error::DriverError;
use ralph::exit_codes;
use ralph::io::config::{DriverConfig, load_config};
use ralph::io::init::{DEFAULT_CONFIG_PATH, init_files};
use ralph::io::invoker::CopilotInvoker;
use ralph::logging;
use ralph::looping::{LoopStop, Session, run_loop};

#[derive(Parser)]
#[command(
    name = "ralph",
    version,
    about = "Drive an external coding agent until it reports completion"
)]
struct Cli {
    /// Path to the config file.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Write default config, requirements and prompt files into `.ralph/` and exit.
    /// Existing files are kept.
    #[arg(long)]
    init: bool,
}

fn main() {
    let cli = Cli::parse();
    process::exit(run(cli));
}

fn run(cli: Cli) -> i32 {
    if cli.init {
        logging::init(LogLevel::Info);
        return match init_files(Path::new(".")) {
            Ok(report) => {
                info!(
                    created = report.created.len(),
                    skipped = report.skipped.len(),
                    "initialized config files"
                );
                exit_codes::OK
            }
            Err(err) => {
                error!(err = %format!("{err:#}"), "could not initialize config files");
                exit_codes::FATAL
            }
        };
    }

    let (config, bound) = match load(&cli.config) {
        Ok(loaded) => loaded,
        Err(err) => {
            logging::init(LogLevel::Info);
            report(err);
            return exit_codes::FATAL;
        }
    };
    logging::init(config.tracing_level());

    let invoker = CopilotInvoker::new(config.command.clone());
    let outcome = Session::load(config, bound).and_then(|session| run_loop(&invoker, &session));
    match outcome {
        Ok(outcome) => {
            match outcome.stop {
                LoopStop::Completed => info!(iterations = outcome.iterations, "done"),
                LoopStop::TimedOut { .. } | LoopStop::Exhausted { .. } => {
                    info!(iterations = outcome.iterations, "stopped without completion");
                }
            }
            outcome.stop.exit_code()
        }
        Err(err) => {
            report(err);
            exit_codes::FATAL
        }
    }
}

fn load(path: &Path) -> Result<(DriverConfig, Bound), DriverError> {
    let wrap = |source| DriverError::Config {
        path: path.to_path_buf(),
        source,
    };
    let config = load_config(path).map_err(wrap)?;
    let bound = config.bound().map_err(wrap)?;
    Ok((config, bound))
}

fn report(err: DriverError) {
    let message = match &err {
        DriverError::Config { .. } => "could not load config",
        DriverError::RequiredFile { .. } => "could not load required file",
        DriverError::ProgressRead { .. } => "could not load progress",
        DriverError::Template(_) => "could not build prompt",
        DriverError::ToolInvocation { .. } => "could not run external tool",
    };
    let err = anyhow::Error::new(err);
    error!(err = %format!("{err:#}"), "{message}");
}
