//! Run configuration.
//!
//! Everything the runner needs to know about its surroundings lives in
//! [`RunConfig`]: where the suite root is, where artifacts go, which
//! milestones to leave alone and how long any child process may take.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{FestError, FestResult};

/// Scratch directory used when none is configured. Wiped on every run.
pub const DEFAULT_SCRATCH_DIR: &str = "/tmp/fish";

/// Upper bound on how long a tested program or the comparator may run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// How many directories above the runner's own directory the suite root sits
/// (`<root>/Fish/scripts/run-integration/<runner>`).
pub const ANCHOR_DEPTH: usize = 3;

/// What a nonzero exit from a tested program means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitCodePolicy {
    /// The comparator alone decides pass or fail.
    #[default]
    Ignore,
    /// A nonzero exit fails the fixture before comparison.
    Enforce,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory holding the numbered milestone folders.
    pub root: PathBuf,
    /// Directory receiving one artifact per executed fixture.
    pub scratch_dir: PathBuf,
    /// Milestone names to bypass, compared verbatim.
    pub skips: BTreeSet<String>,
    /// Explicit comparator; searched for under `root` when absent.
    pub comparator: Option<PathBuf>,
    pub timeout: Duration,
    pub exit_code_policy: ExitCodePolicy,
    /// Remove the scratch directory when the run finishes.
    pub clean_scratch: bool,
    pub use_colors: bool,
}

impl RunConfig {
    /// A configuration rooted at `root` with every other setting defaulted.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            scratch_dir: PathBuf::from(DEFAULT_SCRATCH_DIR),
            skips: BTreeSet::new(),
            comparator: None,
            timeout: DEFAULT_TIMEOUT,
            exit_code_policy: ExitCodePolicy::default(),
            clean_scratch: false,
            use_colors: atty::is(atty::Stream::Stdout),
        }
    }

    /// A configuration rooted relative to the running executable.
    pub fn anchored() -> FestResult<Self> {
        let exe = std::env::current_exe().map_err(|source| FestError::AnchorUnavailable { source })?;
        Ok(Self::new(anchor_root(&exe)?))
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn with_skips<I, S>(mut self, skips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skips.extend(skips.into_iter().map(Into::into));
        self
    }

    pub fn with_comparator(mut self, path: impl Into<PathBuf>) -> Self {
        self.comparator = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_exit_code_policy(mut self, policy: ExitCodePolicy) -> Self {
        self.exit_code_policy = policy;
        self
    }

    pub fn with_clean_scratch(mut self, clean: bool) -> Self {
        self.clean_scratch = clean;
        self
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    pub fn is_skipped(&self, milestone: &str) -> bool {
        self.skips.contains(milestone)
    }

    /// Checks that the root exists and is a directory.
    pub fn validate(&self) -> FestResult<()> {
        match std::fs::metadata(&self.root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(FestError::RootUnusable {
                path: self.root.clone(),
                reason: "not a directory".to_string(),
            }),
            Err(e) => Err(FestError::RootUnusable {
                path: self.root.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Walks [`ANCHOR_DEPTH`] levels up from the directory containing `exe`.
pub fn anchor_root(exe: &Path) -> FestResult<PathBuf> {
    let mut dir = exe.parent();
    for _ in 0..ANCHOR_DEPTH {
        dir = dir.and_then(Path::parent);
    }
    dir.filter(|d| !d.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .ok_or_else(|| FestError::RootUnusable {
            path: exe.to_path_buf(),
            reason: format!("fewer than {} parent directories", ANCHOR_DEPTH + 1),
        })
}
