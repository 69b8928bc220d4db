//! Integration-test orchestrator for milestone-structured course projects.
//!
//! Every numbered milestone under the suite root has a `fest` fixture set and
//! a single `x*` executable. Each `*-in.json` fixture is piped through that
//! executable, the output is kept in a scratch directory, and the external
//! `json-eq` oracle decides whether it matches the paired `*-out.json`.

pub mod cli;
pub mod comparator;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod executor;
pub mod process;
pub mod report;
pub mod runner;
pub mod scratch;

pub use crate::comparator::{ComparisonResult, JsonEq, Oracle};
pub use crate::config::{ExitCodePolicy, RunConfig};
pub use crate::errors::{FestError, FestResult, FixtureError, PairingError, SkipReason};
pub use crate::process::CancelToken;
pub use crate::report::{FixtureOutcome, FixtureRecord, RunReport, RunSummary};
pub use crate::runner::Runner;
