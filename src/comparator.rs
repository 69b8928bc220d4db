//! Adapter for the external JSON equality oracle.
//!
//! The oracle is a black box invoked as `json-eq <expected> <actual>`. Exit
//! status `0` means the documents are equal; anything else means they differ,
//! and every line it printed on stdout explains how.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::errors::FixtureError;
use crate::process::{run_piped, Completion, WaitPolicy};

/// Verdict plus the oracle's explanation, in the order it printed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonResult {
    pub passed: bool,
    pub diagnostics: Vec<String>,
}

impl ComparisonResult {
    pub fn pass() -> Self {
        Self {
            passed: true,
            diagnostics: Vec::new(),
        }
    }

    pub fn fail(diagnostics: Vec<String>) -> Self {
        Self {
            passed: false,
            diagnostics,
        }
    }
}

/// Decides whether an actual output matches the expected one.
///
/// `policy` bounds how long the decision may take and carries the run's
/// cancellation token.
pub trait Oracle {
    fn compare(
        &self,
        expected: &Path,
        actual: &Path,
        policy: &WaitPolicy,
    ) -> Result<ComparisonResult, FixtureError>;
}

/// The `json-eq` comparator shipped with the suite.
#[derive(Debug, Clone)]
pub struct JsonEq {
    program: PathBuf,
}

impl JsonEq {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Oracle for JsonEq {
    fn compare(
        &self,
        expected: &Path,
        actual: &Path,
        policy: &WaitPolicy,
    ) -> Result<ComparisonResult, FixtureError> {
        let absolute = |path: &Path| {
            std::path::absolute(path).map_err(|source| FixtureError::Spawn {
                program: self.program.clone(),
                source,
            })
        };
        let program = absolute(&self.program)?;

        let mut command = Command::new(&program);
        command.arg(absolute(expected)?).arg(absolute(actual)?);
        if let Some(dir) = program.parent() {
            command.current_dir(dir);
        }

        let output = run_piped(command, None, policy)?;
        match output.completion {
            Completion::TimedOut => Err(FixtureError::TimedOut {
                program,
                timeout: policy.timeout,
            }),
            Completion::Cancelled => Err(FixtureError::Cancelled),
            Completion::Exited(status) if status.success() => Ok(ComparisonResult::pass()),
            Completion::Exited(status) => {
                debug!(%status, expected = %expected.display(), "comparator reported a mismatch");
                Ok(ComparisonResult::fail(diagnostic_lines(&output.stdout)))
            }
        }
    }
}

/// Splits oracle output into lines, dropping line terminators only.
pub fn diagnostic_lines(stdout: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::to_owned)
        .collect()
}
