//! Runs a milestone's executable against one fixture.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use crate::config::ExitCodePolicy;
use crate::discovery::Fixture;
use crate::errors::FixtureError;
use crate::process::{run_piped, Completion, ProcessOutput, WaitPolicy};

/// Stderr beyond this many trailing bytes is dropped from failure messages.
const STDERR_TAIL_BYTES: usize = 2048;

/// A finished execution whose output is persisted as an artifact.
#[derive(Debug)]
pub struct ExecutionResult {
    pub artifact: PathBuf,
    pub output: ProcessOutput,
}

#[derive(Debug)]
pub struct Executor {
    scratch_dir: PathBuf,
    policy: WaitPolicy,
    exit_code_policy: ExitCodePolicy,
}

impl Executor {
    pub fn new(scratch_dir: impl Into<PathBuf>, policy: WaitPolicy, exit_code_policy: ExitCodePolicy) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            policy,
            exit_code_policy,
        }
    }

    pub fn artifact_path(&self, fixture: &Fixture, milestone: &str) -> PathBuf {
        self.scratch_dir.join(fixture.artifact_name(milestone))
    }

    /// Feeds the fixture's input to `executable` and stores its stdout in the
    /// scratch directory.
    ///
    /// The artifact is written on every path through this function, with
    /// whatever output was captured (nothing, if the program never started).
    pub fn execute(
        &self,
        executable: &Path,
        fixture: &Fixture,
        milestone: &str,
    ) -> Result<ExecutionResult, FixtureError> {
        let artifact = self.artifact_path(fixture, milestone);
        let outcome = self.spawn(executable, fixture);

        let captured: &[u8] = match &outcome {
            Ok(output) => &output.stdout,
            Err(_) => &[],
        };
        if let Err(source) = fs::write(&artifact, captured) {
            let write_err = FixtureError::WriteArtifact {
                path: artifact.clone(),
                source,
            };
            return match outcome {
                Err(original) => {
                    warn!(error = %write_err, "artifact lost after failed execution");
                    Err(original)
                }
                Ok(_) => Err(write_err),
            };
        }
        debug!(artifact = %artifact.display(), bytes = captured.len(), "artifact written");

        let output = outcome?;
        match output.completion {
            Completion::TimedOut => Err(FixtureError::TimedOut {
                program: executable.to_path_buf(),
                timeout: self.policy.timeout,
            }),
            Completion::Cancelled => Err(FixtureError::Cancelled),
            Completion::Exited(status) => {
                if self.exit_code_policy == ExitCodePolicy::Enforce && !status.success() {
                    return Err(FixtureError::NonZeroExit {
                        program: executable.to_path_buf(),
                        status: status.to_string(),
                        stderr: stderr_tail(&output.stderr),
                    });
                }
                if !status.success() {
                    debug!(program = %executable.display(), %status, "nonzero exit left to the comparator");
                }
                Ok(ExecutionResult { artifact, output })
            }
        }
    }

    fn spawn(&self, executable: &Path, fixture: &Fixture) -> Result<ProcessOutput, FixtureError> {
        let input = fs::read(&fixture.input).map_err(|source| FixtureError::ReadInput {
            path: fixture.input.clone(),
            source,
        })?;
        let program = std::path::absolute(executable).map_err(|source| FixtureError::Spawn {
            program: executable.to_path_buf(),
            source,
        })?;

        let mut command = Command::new(&program);
        if let Some(dir) = program.parent() {
            command.current_dir(dir);
        }
        run_piped(command, Some(input), &self.policy)
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&stderr[start..]).into_owned()
}
