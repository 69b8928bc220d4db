//! Error taxonomy for the fest runner.
//!
//! Three tiers, from most to least severe:
//!
//! - [`FestError`]: configuration problems that make the whole run impossible
//!   (no comparator, unusable root, scratch directory cannot be recreated).
//!   These abort before any milestone runs.
//! - [`SkipReason`]: a milestone that cannot be run. The run continues.
//! - [`FixtureError`]: one fixture could not be executed or compared. It is
//!   recorded as a failed fixture and the run continues.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

/// Result alias for operations that can only fail with a configuration error.
pub type FestResult<T> = Result<T, FestError>;

// =============================================================================
// FATAL CONFIGURATION ERRORS
// =============================================================================

#[derive(Debug, Error, Diagnostic)]
pub enum FestError {
    #[error("suite root {} is not usable: {reason}", .path.display())]
    #[diagnostic(
        code(fest::config::root),
        help("pass --root <DIR> or set FEST_ROOT to the directory holding the milestone folders")
    )]
    RootUnusable { path: PathBuf, reason: String },

    #[error("could not resolve the suite root from the runner's location")]
    #[diagnostic(code(fest::config::anchor), help("pass --root <DIR> explicitly"))]
    AnchorUnavailable {
        #[source]
        source: io::Error,
    },

    #[error("no json-eq/json-eq comparator found under {}", .root.display())]
    #[diagnostic(
        code(fest::config::comparator_missing),
        help("build the json-eq script first, or point at it with --comparator <PATH>")
    )]
    ComparatorNotFound { root: PathBuf },

    #[error("found {} json-eq/json-eq comparators under {}", .candidates.len(), .root.display())]
    #[diagnostic(
        code(fest::config::comparator_ambiguous),
        help("pick one with --comparator <PATH>")
    )]
    ComparatorAmbiguous {
        root: PathBuf,
        candidates: Vec<PathBuf>,
    },

    #[error("configured comparator {} does not exist", .path.display())]
    #[diagnostic(code(fest::config::comparator_path))]
    ComparatorPathMissing { path: PathBuf },

    #[error("could not recreate scratch directory {}", .path.display())]
    #[diagnostic(
        code(fest::scratch),
        help("the scratch directory is wiped on every run; make sure it is writable")
    )]
    Scratch {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("refusing to use {} as scratch directory: {reason}", .path.display())]
    #[diagnostic(code(fest::scratch::refused), help("pass --scratch-dir <DIR> pointing at a throwaway directory"))]
    ScratchRefused { path: PathBuf, reason: String },

    #[error("failed to write the report")]
    #[diagnostic(code(fest::io::report))]
    Report {
        #[source]
        source: io::Error,
    },

    #[error("failed to read {}", .path.display())]
    #[diagnostic(code(fest::io::read))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

// =============================================================================
// MILESTONE SKIPS
// =============================================================================

/// Why a discovered milestone was not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Named on the command line.
    Requested,
    /// Zero or several `fest` directories.
    NoFixtureSet,
    /// Zero or several `x*` entries.
    NoExecutable,
    /// The milestone directory could not be listed.
    Unreadable,
}

impl SkipReason {
    /// Requested skips are deliberate; the other reasons point at a broken
    /// milestone layout and make the run red.
    pub fn is_configuration_problem(&self) -> bool {
        !matches!(self, SkipReason::Requested)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Requested => "as requested",
            SkipReason::NoFixtureSet => "no fest folder found",
            SkipReason::NoExecutable => "no executable found",
            SkipReason::Unreadable => "milestone folder unreadable",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// FIXTURE-LEVEL ERRORS
// =============================================================================

/// An input file whose expected output could not be paired unambiguously.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairingError {
    #[error("missing expected output {expected_name} next to {}", .input.display())]
    MissingExpected {
        input: PathBuf,
        expected_name: String,
    },
    #[error("{count} files match expected output {expected_name} next to {}", .input.display())]
    AmbiguousExpected {
        input: PathBuf,
        expected_name: String,
        count: usize,
    },
    #[error("could not list the directory of {}: {reason}", .input.display())]
    Unreadable { input: PathBuf, reason: String },
}

/// A fixture that could not be run to a verdict.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error(transparent)]
    Pairing(#[from] PairingError),

    #[error("failed to read input {}: {source}", .path.display())]
    ReadInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to launch {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("i/o with {} failed: {source}", .program.display())]
    Pipe {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} timed out after {}s", .program.display(), .timeout.as_secs_f64())]
    TimedOut { program: PathBuf, timeout: Duration },

    #[error("{} exited with {status}{}", .program.display(), stderr_suffix(.stderr))]
    NonZeroExit {
        program: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("failed to write artifact {}: {source}", .path.display())]
    WriteArtifact {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("run cancelled")]
    Cancelled,
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}
