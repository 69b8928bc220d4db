//! The fest runner command-line interface.
//!
//! Parses arguments, installs logging, runs the suite and turns the outcome
//! into a process exit status.

use std::process::ExitCode;

use clap::Parser;
use miette::Report;
use termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::EnvFilter;

use crate::cli::args::FestArgs;
use crate::errors::{FestError, FestResult};
use crate::report::RunSummary;
use crate::runner::Runner;

pub mod args;

/// Exit status for a configuration error that prevented the run.
const FATAL_EXIT: u8 = 2;

/// The main entry point for the CLI.
pub fn run() -> ExitCode {
    let args = FestArgs::parse();
    init_tracing(args.verbose);

    match run_suite(args) {
        Ok(summary) => ExitCode::from(summary.exit_code()),
        Err(error) => {
            print_error(error);
            ExitCode::from(FATAL_EXIT)
        }
    }
}

fn run_suite(args: FestArgs) -> FestResult<RunSummary> {
    let config = args.into_config()?;
    let choice = if config.use_colors {
        ColorChoice::Always
    } else {
        ColorChoice::Never
    };
    let runner = Runner::from_config(config)?;
    runner.run(StandardStream::stdout(choice))
}

/// Renders a fatal error with its code and help on stderr.
pub fn print_error(error: FestError) {
    let report = Report::new(error);
    eprintln!("{report:?}");
}

/// Installs a stderr subscriber when `-v` was given. `RUST_LOG` overrides the
/// level picked from the verbosity.
fn init_tracing(verbosity: u8) {
    if verbosity == 0 {
        return;
    }
    let default_level = if verbosity > 1 { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
