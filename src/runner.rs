//! The sequential pipeline: discover, execute, compare, report.
//!
//! Milestones run one after another in ascending numeric order and fixtures
//! within a milestone run one at a time. Nothing a single fixture does can
//! abort the run; only configuration problems surface as [`FestError`].

use std::path::Path;

use termcolor::WriteColor;
use tracing::{info, info_span, warn};

use crate::comparator::{JsonEq, Oracle};
use crate::config::RunConfig;
use crate::discovery::{Fixture, RunnableMilestone, SuiteDiscoverer};
use crate::errors::{FestError, FestResult, FixtureError, SkipReason};
use crate::executor::Executor;
use crate::process::{CancelToken, WaitPolicy};
use crate::report::{FixtureOutcome, FixtureRecord, Reporter, RunReport, RunSummary};
use crate::scratch::ScratchDir;

pub struct Runner<O: Oracle> {
    config: RunConfig,
    oracle: O,
    cancel: CancelToken,
}

impl Runner<JsonEq> {
    /// Builds a runner around the suite's own `json-eq` comparator, either the
    /// configured one or the single one found under the root.
    pub fn from_config(config: RunConfig) -> FestResult<Self> {
        config.validate()?;
        let comparator = match &config.comparator {
            Some(path) if path.exists() => path.clone(),
            Some(path) => return Err(FestError::ComparatorPathMissing { path: path.clone() }),
            None => SuiteDiscoverer::locate_comparator(&config.root)?,
        };
        info!(comparator = %comparator.display(), "using comparator");

        Ok(Self::with_oracle(config, JsonEq::new(comparator)))
    }
}

impl<O: Oracle> Runner<O> {
    /// Builds a runner around any oracle.
    pub fn with_oracle(config: RunConfig, oracle: O) -> Self {
        Self {
            config,
            oracle,
            cancel: CancelToken::new(),
        }
    }

    /// Replaces the cancellation token observed between fixtures and while
    /// waiting on child processes.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::new(self.config.timeout, self.cancel.clone())
    }

    /// Runs every milestone under the root and writes the console report to
    /// `out`.
    pub fn run<W: WriteColor>(&self, out: W) -> FestResult<RunSummary> {
        self.config.validate()?;
        let scratch = ScratchDir::recreate(
            &self.config.scratch_dir,
            &self.config.root,
            self.config.clean_scratch,
        )?;
        let milestones = SuiteDiscoverer::discover_milestones(&self.config.root)?;
        info!(root = %self.config.root.display(), milestones = milestones.len(), "starting run");

        let executor = Executor::new(
            scratch.path(),
            self.wait_policy(),
            self.config.exit_code_policy,
        );
        let mut reporter = Reporter::new(out);
        let mut summary = RunSummary::default();

        for milestone in &milestones {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            if self.config.is_skipped(&milestone.name) {
                self.skip(&mut reporter, &mut summary, &milestone.name, SkipReason::Requested)?;
                continue;
            }
            match SuiteDiscoverer::inspect(milestone) {
                Err(reason) => self.skip(&mut reporter, &mut summary, &milestone.name, reason)?,
                Ok(runnable) => {
                    let report = self.run_milestone(&runnable, &executor, &mut reporter)?;
                    summary.push_ran(report);
                }
            }
        }
        if self.cancel.is_cancelled() {
            summary.cancelled = true;
        }

        reporter.finished().map_err(report_err)?;
        info!(
            fixtures = summary.total_fixtures(),
            failed = summary.total_failed(),
            green = summary.is_green(),
            "run finished"
        );
        Ok(summary)
    }

    fn skip<W: WriteColor>(
        &self,
        reporter: &mut Reporter<W>,
        summary: &mut RunSummary,
        name: &str,
        reason: SkipReason,
    ) -> FestResult<()> {
        warn!(milestone = name, %reason, "skipping milestone");
        reporter.skipped(name, reason).map_err(report_err)?;
        summary.push_skipped(name, reason);
        Ok(())
    }

    fn run_milestone<W: WriteColor>(
        &self,
        runnable: &RunnableMilestone,
        executor: &Executor,
        reporter: &mut Reporter<W>,
    ) -> FestResult<RunReport> {
        let name = runnable.milestone.name.as_str();
        let _span = info_span!("milestone", milestone = name).entered();

        let scan = SuiteDiscoverer::enumerate_fixtures(&runnable.fixture_set);
        info!(fixtures = scan.len(), executable = %runnable.executable.display(), "running milestone");

        let mut report = RunReport::new(name, scan.len());
        let unreadable = scan.unreadable.iter().map(|entry| FixtureRecord {
            input: entry.path.clone(),
            outcome: FixtureOutcome::Errored {
                message: format!("unreadable: {}", entry.reason),
            },
        });
        let executed = scan
            .fixtures
            .iter()
            .map(|fixture| self.run_fixture(executor, &runnable.executable, fixture, name));

        for record in unreadable.chain(executed) {
            if !record.passed() {
                reporter.fixture_failed(name, &record).map_err(report_err)?;
            }
            report.record(record);
            reporter
                .progress(report.attempted, report.total)
                .map_err(report_err)?;
            if self.cancel.is_cancelled() {
                break;
            }
        }

        reporter.milestone_finished(&report).map_err(report_err)?;
        Ok(report)
    }

    /// Execute then compare. Every problem becomes part of the record.
    fn run_fixture(
        &self,
        executor: &Executor,
        executable: &Path,
        fixture: &Fixture,
        milestone: &str,
    ) -> FixtureRecord {
        let outcome = match self.check_fixture(executor, executable, fixture, milestone) {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(input = %fixture.input.display(), %error, "fixture errored");
                FixtureOutcome::Errored {
                    message: error.to_string(),
                }
            }
        };
        FixtureRecord {
            input: fixture.input.clone(),
            outcome,
        }
    }

    fn check_fixture(
        &self,
        executor: &Executor,
        executable: &Path,
        fixture: &Fixture,
        milestone: &str,
    ) -> Result<FixtureOutcome, FixtureError> {
        let expected = fixture.expected.clone()?;
        let execution = executor.execute(executable, fixture, milestone)?;
        let comparison = self
            .oracle
            .compare(&expected, &execution.artifact, &self.wait_policy())?;
        Ok(if comparison.passed {
            FixtureOutcome::Passed
        } else {
            FixtureOutcome::Failed {
                expected,
                diagnostics: comparison.diagnostics,
            }
        })
    }
}

fn report_err(source: std::io::Error) -> FestError {
    FestError::Report { source }
}
