//! Command-line surface of `fest-runner`.
//!
//! Flags fall back to `FEST_*` environment variables where it makes sense,
//! and everything resolves into a single [`RunConfig`].

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};

use crate::config::{ExitCodePolicy, RunConfig, DEFAULT_SCRATCH_DIR};
use crate::errors::FestResult;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "fest-runner",
    version,
    about = "Runs every milestone's executable against its fest fixtures and checks the output with json-eq."
)]
pub struct FestArgs {
    /// Milestone names to skip, matched exactly.
    #[arg(value_name = "SKIP")]
    pub skips: Vec<String>,

    /// Directory holding the numbered milestone folders. Defaults to the
    /// directory three levels above the runner's own directory.
    #[arg(long, env = "FEST_ROOT", value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Where execution artifacts are written. Wiped at the start of every run.
    #[arg(long, env = "FEST_SCRATCH_DIR", value_name = "DIR", default_value = DEFAULT_SCRATCH_DIR)]
    pub scratch_dir: PathBuf,

    /// Use this comparator instead of searching for json-eq/json-eq.
    #[arg(long, value_name = "PATH")]
    pub comparator: Option<PathBuf>,

    /// Seconds any tested program or comparator run may take.
    #[arg(long, value_name = "SECS", default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Fail a fixture when its program exits nonzero, before comparing.
    #[arg(long)]
    pub fail_on_exit_code: bool,

    /// Remove the scratch directory once the run is over.
    #[arg(long)]
    pub clean_scratch: bool,

    /// When to color the report.
    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    /// Log progress to stderr; repeat for debug output.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

impl FestArgs {
    /// Resolves the arguments into a run configuration. Only the anchored
    /// root lookup can fail.
    pub fn into_config(self) -> FestResult<RunConfig> {
        let config = match self.root {
            Some(root) => RunConfig::new(root),
            None => RunConfig::anchored()?,
        };
        let use_colors = match self.color {
            ColorMode::Auto => config.use_colors,
            ColorMode::Always => true,
            ColorMode::Never => false,
        };
        let exit_code_policy = if self.fail_on_exit_code {
            ExitCodePolicy::Enforce
        } else {
            ExitCodePolicy::Ignore
        };

        let config = config
            .with_scratch_dir(self.scratch_dir)
            .with_skips(self.skips)
            .with_timeout(Duration::from_secs(self.timeout))
            .with_exit_code_policy(exit_code_policy)
            .with_clean_scratch(self.clean_scratch)
            .with_colors(use_colors);
        Ok(match self.comparator {
            Some(path) => config.with_comparator(path),
            None => config,
        })
    }
}
