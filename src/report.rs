//! Per-milestone bookkeeping and console rendering.
//!
//! The console format is line oriented:
//!
//! ```text
//! Skipping 3 as requested
//! ==================
//! FAILURE: MS 4 /suite/4/fest/team/Tests/2-out.json
//!      Found mismatch at index 0:
//! STATUS: [1/2]
//! STATUS: [2/2]
//! Failed 1 tests
//! ALL DONE
//! ```

use std::io::{self, Write};
use std::path::PathBuf;

use termcolor::{Color, ColorSpec, WriteColor};

use crate::errors::SkipReason;

const BLOCK_RULE: &str = "==================";
const DIAGNOSTIC_INDENT: &str = "     ";

// =============================================================================
// RESULTS
// =============================================================================

/// What happened to one fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixtureOutcome {
    Passed,
    /// The oracle disagreed with the output.
    Failed {
        expected: PathBuf,
        diagnostics: Vec<String>,
    },
    /// The fixture could not be run to a verdict.
    Errored { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureRecord {
    pub input: PathBuf,
    pub outcome: FixtureOutcome,
}

impl FixtureRecord {
    pub fn passed(&self) -> bool {
        matches!(self.outcome, FixtureOutcome::Passed)
    }
}

/// Counts and failures for one milestone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub milestone: String,
    /// Fixtures discovered for this milestone.
    pub total: usize,
    /// Fixtures that ran to a record (passed, failed or errored).
    pub attempted: usize,
    pub failed: usize,
    pub failures: Vec<FixtureRecord>,
}

impl RunReport {
    pub fn new(milestone: impl Into<String>, total: usize) -> Self {
        Self {
            milestone: milestone.into(),
            total,
            attempted: 0,
            failed: 0,
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, record: FixtureRecord) {
        self.attempted += 1;
        if !record.passed() {
            self.failed += 1;
            self.failures.push(record);
        }
    }

    pub fn passed(&self) -> usize {
        self.attempted - self.failed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MilestoneOutcome {
    Ran(RunReport),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneResult {
    pub name: String,
    pub outcome: MilestoneOutcome,
}

/// Everything a run produced, handed back to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub milestones: Vec<MilestoneResult>,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn push_ran(&mut self, report: RunReport) {
        self.milestones.push(MilestoneResult {
            name: report.milestone.clone(),
            outcome: MilestoneOutcome::Ran(report),
        });
    }

    pub fn push_skipped(&mut self, name: impl Into<String>, reason: SkipReason) {
        self.milestones.push(MilestoneResult {
            name: name.into(),
            outcome: MilestoneOutcome::Skipped(reason),
        });
    }

    pub fn reports(&self) -> impl Iterator<Item = &RunReport> {
        self.milestones.iter().filter_map(|m| match &m.outcome {
            MilestoneOutcome::Ran(report) => Some(report),
            MilestoneOutcome::Skipped(_) => None,
        })
    }

    pub fn total_fixtures(&self) -> usize {
        self.reports().map(|r| r.attempted).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.reports().map(|r| r.failed).sum()
    }

    /// Milestones skipped because their layout is broken, not by request.
    pub fn broken_milestones(&self) -> usize {
        self.milestones
            .iter()
            .filter(|m| matches!(m.outcome, MilestoneOutcome::Skipped(reason) if reason.is_configuration_problem()))
            .count()
    }

    pub fn is_green(&self) -> bool {
        !self.cancelled && self.total_failed() == 0 && self.broken_milestones() == 0
    }

    /// Process exit status: `0` for a green run, `1` otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.is_green() {
            0
        } else {
            1
        }
    }
}

// =============================================================================
// RENDERING
// =============================================================================

/// Writes progress and failures as the run goes.
pub struct Reporter<W: WriteColor> {
    out: W,
}

impl<W: WriteColor> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn skipped(&mut self, milestone: &str, reason: SkipReason) -> io::Result<()> {
        self.colored(Color::Yellow, false, |out| match reason {
            SkipReason::Requested => writeln!(out, "Skipping {} {}", milestone, reason),
            _ => writeln!(out, "Skipping {}, {}", milestone, reason),
        })
    }

    /// Prints the failure block for a fixture that did not pass.
    pub fn fixture_failed(&mut self, milestone: &str, record: &FixtureRecord) -> io::Result<()> {
        match &record.outcome {
            FixtureOutcome::Passed => Ok(()),
            FixtureOutcome::Failed {
                expected,
                diagnostics,
            } => {
                writeln!(self.out, "{}", BLOCK_RULE)?;
                self.colored(Color::Red, true, |out| {
                    writeln!(out, "FAILURE: MS {} {}", milestone, expected.display())
                })?;
                for line in diagnostics {
                    writeln!(self.out, "{}{}", DIAGNOSTIC_INDENT, line)?;
                }
                Ok(())
            }
            FixtureOutcome::Errored { message } => {
                writeln!(self.out, "{}", BLOCK_RULE)?;
                self.colored(Color::Red, true, |out| {
                    writeln!(out, "ERROR: MS {} {}", milestone, record.input.display())
                })?;
                writeln!(self.out, "{}{}", DIAGNOSTIC_INDENT, message)
            }
        }
    }

    pub fn progress(&mut self, done: usize, total: usize) -> io::Result<()> {
        writeln!(self.out, "STATUS: [{}/{}]", done, total)
    }

    pub fn milestone_finished(&mut self, report: &RunReport) -> io::Result<()> {
        let color = if report.failed == 0 {
            Color::Green
        } else {
            Color::Red
        };
        self.colored(color, false, |out| writeln!(out, "Failed {} tests", report.failed))
    }

    pub fn finished(&mut self) -> io::Result<()> {
        writeln!(self.out, "ALL DONE")?;
        self.out.flush()
    }

    fn colored(
        &mut self,
        color: Color,
        bold: bool,
        body: impl FnOnce(&mut W) -> io::Result<()>,
    ) -> io::Result<()> {
        self.out
            .set_color(ColorSpec::new().set_fg(Some(color)).set_bold(bold))?;
        let result = body(&mut self.out);
        self.out.reset()?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termcolor::Buffer;

    fn rendered(buffer: Buffer) -> String {
        String::from_utf8(buffer.into_inner()).unwrap()
    }

    fn failed_record() -> FixtureRecord {
        FixtureRecord {
            input: PathBuf::from("/s/2/fest/t/Tests/1-in.json"),
            outcome: FixtureOutcome::Failed {
                expected: PathBuf::from("/s/2/fest/t/Tests/1-out.json"),
                diagnostics: vec!["Found mismatch at index 0: ".to_string(), "ACTUAL: 2".to_string()],
            },
        }
    }

    #[test]
    fn failure_block_lists_each_diagnostic_indented() {
        let mut reporter = Reporter::new(Buffer::no_color());
        reporter.fixture_failed("2", &failed_record()).unwrap();
        assert_eq!(
            rendered(reporter.into_inner()),
            "==================\n\
             FAILURE: MS 2 /s/2/fest/t/Tests/1-out.json\n     \
             Found mismatch at index 0: \n     \
             ACTUAL: 2\n"
        );
    }

    #[test]
    fn skip_lines_match_the_reason() {
        let mut reporter = Reporter::new(Buffer::no_color());
        reporter.skipped("3", SkipReason::Requested).unwrap();
        reporter.skipped("4", SkipReason::NoFixtureSet).unwrap();
        reporter.skipped("5", SkipReason::NoExecutable).unwrap();
        assert_eq!(
            rendered(reporter.into_inner()),
            "Skipping 3 as requested\n\
             Skipping 4, no fest folder found\n\
             Skipping 5, no executable found\n"
        );
    }

    #[test]
    fn colored_output_still_contains_the_text() {
        let mut reporter = Reporter::new(Buffer::ansi());
        reporter.fixture_failed("2", &failed_record()).unwrap();
        let text = rendered(reporter.into_inner());
        assert!(text.contains("\x1b["));
        assert!(text.contains("FAILURE: MS 2"));
    }

    #[test]
    fn report_counts_failures_and_errors() {
        let mut report = RunReport::new("7", 3);
        report.record(FixtureRecord {
            input: PathBuf::from("1-in.json"),
            outcome: FixtureOutcome::Passed,
        });
        report.record(failed_record());
        report.record(FixtureRecord {
            input: PathBuf::from("3-in.json"),
            outcome: FixtureOutcome::Errored {
                message: "timed out".to_string(),
            },
        });
        assert_eq!(report.attempted, 3);
        assert_eq!(report.failed, 2);
        assert_eq!(report.passed(), 1);
        assert_eq!(report.failures.len(), 2);
    }

    #[test]
    fn summary_is_red_on_failures_or_broken_milestones() {
        let mut summary = RunSummary::default();
        summary.push_skipped("3", SkipReason::Requested);
        summary.push_ran(RunReport::new("4", 0));
        assert!(summary.is_green());
        assert_eq!(summary.exit_code(), 0);

        summary.push_skipped("5", SkipReason::NoExecutable);
        assert_eq!(summary.broken_milestones(), 1);
        assert_eq!(summary.exit_code(), 1);

        let mut failing = RunSummary::default();
        let mut report = RunReport::new("6", 1);
        report.record(failed_record());
        failing.push_ran(report);
        assert_eq!(failing.total_failed(), 1);
        assert!(!failing.is_green());
    }
}
