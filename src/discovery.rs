//! Milestone and fixture discovery.
//!
//! The suite follows a fixed directory convention:
//!
//! ```text
//! <root>/<N>/                     one directory per milestone, N purely decimal
//! <root>/<N>/x*                   exactly one executable under test
//! <root>/<N>/fest/**/<t>*-in.json fixture inputs, t is the token
//! <root>/<N>/fest/**/<t>-out.json expected output, next to its input
//! <root>/**/json-eq/json-eq       the comparator
//! ```

use std::cmp::Ordering;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::errors::{FestError, FestResult, PairingError, SkipReason};

pub const FIXTURE_SET_DIR: &str = "fest";
pub const EXECUTABLE_PREFIX: char = 'x';
pub const INPUT_SUFFIX: &str = "-in.json";
pub const OUTPUT_SUFFIX: &str = "-out.json";
pub const COMPARATOR_NAME: &str = "json-eq";

static MILESTONE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+$").expect("milestone pattern is a valid regex"));

// =====================
// Core Types
// =====================

/// A numbered milestone directory directly under the suite root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Milestone {
    pub name: String,
    pub dir: PathBuf,
}

impl Ord for Milestone {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_numeric(&self.name, &other.name).then_with(|| self.dir.cmp(&other.dir))
    }
}

impl PartialOrd for Milestone {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A milestone with exactly one fixture set and exactly one executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnableMilestone {
    pub milestone: Milestone,
    pub fixture_set: PathBuf,
    pub executable: PathBuf,
}

/// One input document and the expected output paired with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    pub input: PathBuf,
    /// First character of the input file name.
    pub token: char,
    /// Name of the directory two levels above the input.
    pub group: String,
    pub expected: Result<PathBuf, PairingError>,
}

impl Fixture {
    /// File name of this fixture's artifact in the scratch directory.
    pub fn artifact_name(&self, milestone: &str) -> String {
        format!("{}_{}_{}", self.group, milestone, self.token)
    }
}

/// Everything found under one fixture set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixtureScan {
    pub fixtures: Vec<Fixture>,
    /// Entries the walk could not read. Each counts as an errored fixture.
    pub unreadable: Vec<UnreadableEntry>,
}

impl FixtureScan {
    pub fn len(&self) -> usize {
        self.fixtures.len() + self.unreadable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableEntry {
    pub path: PathBuf,
    pub reason: String,
}

// =====================
// Discovery
// =====================

/// Finds milestones, fixtures and the comparator under a suite root.
#[derive(Debug)]
pub struct SuiteDiscoverer;

impl SuiteDiscoverer {
    /// Lists the purely numeric subdirectories of `root`, ascending by value.
    pub fn discover_milestones<P: AsRef<Path>>(root: P) -> FestResult<Vec<Milestone>> {
        let root = root.as_ref();
        let mut milestones = Vec::new();
        for entry in read_dir(root)? {
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if !MILESTONE_NAME.is_match(&name) {
                continue;
            }
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            milestones.push(Milestone { name, dir });
        }
        milestones.sort();
        Ok(milestones)
    }

    /// Returns the `fest` directory when there is exactly one.
    pub fn locate_fixture_set<P: AsRef<Path>>(milestone_dir: P) -> FestResult<Option<PathBuf>> {
        let candidates: Vec<PathBuf> = read_dir(milestone_dir.as_ref())?
            .into_iter()
            .filter(|entry| entry.file_name() == FIXTURE_SET_DIR)
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        Ok(exactly_one(candidates))
    }

    /// Returns the `x*` entry when there is exactly one.
    pub fn locate_executable<P: AsRef<Path>>(milestone_dir: P) -> FestResult<Option<PathBuf>> {
        let candidates: Vec<PathBuf> = read_dir(milestone_dir.as_ref())?
            .into_iter()
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with(EXECUTABLE_PREFIX)
            })
            .map(|entry| entry.path())
            .collect();
        Ok(exactly_one(candidates))
    }

    /// Decides whether a milestone can run, and with what.
    ///
    /// A milestone directory that cannot be listed is skipped rather than
    /// aborting the run.
    pub fn inspect(milestone: &Milestone) -> Result<RunnableMilestone, SkipReason> {
        let located = Self::locate_fixture_set(&milestone.dir).and_then(|fixture_set| {
            Ok((fixture_set, Self::locate_executable(&milestone.dir)?))
        });
        match located {
            Err(error) => {
                warn!(milestone = %milestone.name, %error, "milestone directory unreadable");
                Err(SkipReason::Unreadable)
            }
            Ok((None, _)) => Err(SkipReason::NoFixtureSet),
            Ok((_, None)) => Err(SkipReason::NoExecutable),
            Ok((Some(fixture_set), Some(executable))) => Ok(RunnableMilestone {
                milestone: milestone.clone(),
                fixture_set,
                executable,
            }),
        }
    }

    /// Recursively collects `*-in.json` files under a fixture set and pairs
    /// each with its `<token>-out.json` sibling.
    ///
    /// Fixtures are sorted by input path so runs are reproducible. Parts of
    /// the tree that cannot be read end up in [`FixtureScan::unreadable`].
    pub fn enumerate_fixtures<P: AsRef<Path>>(fixture_set: P) -> FixtureScan {
        let fixture_set = fixture_set.as_ref();
        let mut scan = FixtureScan::default();
        for entry in WalkDir::new(fixture_set).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    let path = error.path().unwrap_or(fixture_set).to_path_buf();
                    warn!(path = %path.display(), %error, "unreadable entry in fixture set");
                    scan.unreadable.push(UnreadableEntry {
                        path,
                        reason: error.to_string(),
                    });
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                continue;
            }
            let Some(token) = input_token(entry.file_name()) else {
                continue;
            };
            let input = entry.into_path();
            let expected = pair_expected(&input, token);
            if let Err(ref e) = expected {
                debug!(input = %input.display(), error = %e, "fixture has no usable expected output");
            }
            scan.fixtures.push(Fixture {
                group: group_name(&input),
                input,
                token,
                expected,
            });
        }
        scan
    }

    /// Searches the whole suite for the single `json-eq/json-eq` entry.
    pub fn locate_comparator<P: AsRef<Path>>(root: P) -> FestResult<PathBuf> {
        let root = root.as_ref();
        let candidates: Vec<PathBuf> = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(error = %err, "skipping unreadable entry while looking for the comparator");
                    None
                }
            })
            .filter(|e| !e.file_type().is_dir() && Self::is_comparator(e.path()))
            .map(|e| e.into_path())
            .collect();

        if candidates.len() > 1 {
            return Err(FestError::ComparatorAmbiguous {
                root: root.to_path_buf(),
                candidates,
            });
        }
        exactly_one(candidates).ok_or_else(|| FestError::ComparatorNotFound {
            root: root.to_path_buf(),
        })
    }

    // =====================
    // Internal
    // =====================

    /// Returns true for paths ending in `json-eq/json-eq`.
    fn is_comparator(path: &Path) -> bool {
        let name_matches = path.file_name() == Some(OsStr::new(COMPARATOR_NAME));
        let parent_matches = path
            .parent()
            .and_then(Path::file_name)
            .is_some_and(|p| p == OsStr::new(COMPARATOR_NAME));
        name_matches && parent_matches
    }
}

/// Orders decimal strings by value without parsing them into a bounded
/// integer; ties fall back to the raw text so `"07"` and `"7"` stay distinct.
pub fn compare_numeric(a: &str, b: &str) -> Ordering {
    let a_digits = a.trim_start_matches('0');
    let b_digits = b.trim_start_matches('0');
    a_digits
        .len()
        .cmp(&b_digits.len())
        .then_with(|| a_digits.cmp(b_digits))
        .then_with(|| a.cmp(b))
}

/// The token of an input file name, or `None` if it is not an input.
pub fn input_token(file_name: &OsStr) -> Option<char> {
    let name = file_name.to_str()?;
    let stem = name.strip_suffix(INPUT_SUFFIX)?;
    stem.chars().next()
}

fn pair_expected(input: &Path, token: char) -> Result<PathBuf, PairingError> {
    let expected_name = format!("{}{}", token, OUTPUT_SUFFIX);
    let dir = input.parent().unwrap_or_else(|| Path::new("."));
    let entries = read_dir(dir).map_err(|error| PairingError::Unreadable {
        input: input.to_path_buf(),
        reason: error.to_string(),
    })?;
    let matches: Vec<PathBuf> = entries
        .into_iter()
        .filter(|entry| entry.file_name() == expected_name.as_str())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();

    if matches.len() > 1 {
        return Err(PairingError::AmbiguousExpected {
            input: input.to_path_buf(),
            count: matches.len(),
            expected_name,
        });
    }
    exactly_one(matches).ok_or_else(|| PairingError::MissingExpected {
        input: input.to_path_buf(),
        expected_name,
    })
}

fn group_name(input: &Path) -> String {
    input
        .parent()
        .and_then(Path::parent)
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn exactly_one(mut candidates: Vec<PathBuf>) -> Option<PathBuf> {
    if candidates.len() == 1 {
        candidates.pop()
    } else {
        None
    }
}

/// Reads a directory into a list sorted by file name.
fn read_dir(dir: &Path) -> FestResult<Vec<fs::DirEntry>> {
    let io_err = |source| FestError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = fs::read_dir(dir)
        .map_err(io_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"{}").unwrap();
    }

    #[test]
    fn numeric_order_ignores_string_length() {
        let mut names = vec!["10", "9", "2", "100", "010"];
        names.sort_by(|a, b| compare_numeric(a, b));
        assert_eq!(names, vec!["2", "9", "010", "10", "100"]);
    }

    #[test]
    fn numeric_order_handles_names_beyond_u64() {
        let huge = "99999999999999999999999999";
        assert_eq!(compare_numeric("5", huge), Ordering::Less);
        assert_eq!(compare_numeric(huge, "5"), Ordering::Greater);
    }

    #[test]
    fn input_tokens_come_from_the_first_character() {
        assert_eq!(input_token(OsStr::new("1-in.json")), Some('1'));
        assert_eq!(input_token(OsStr::new("3abc-in.json")), Some('3'));
        assert_eq!(input_token(OsStr::new("1-out.json")), None);
        assert_eq!(input_token(OsStr::new("-in.json")), None);
        assert_eq!(input_token(OsStr::new("1-in.json.bak")), None);
    }

    #[test]
    fn milestones_exclude_non_numeric_names_and_files() {
        let tmp = TempDir::new().unwrap();
        for dir in ["10", "9", "2", "Fish", "3a"] {
            fs::create_dir(tmp.path().join(dir)).unwrap();
        }
        fs::write(tmp.path().join("4"), b"not a directory").unwrap();

        let names: Vec<String> = SuiteDiscoverer::discover_milestones(tmp.path())
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["2", "9", "10"]);
    }

    #[test]
    fn executable_must_be_unique() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(SuiteDiscoverer::locate_executable(tmp.path()).unwrap(), None);

        touch(&tmp.path().join("xrun"));
        assert_eq!(
            SuiteDiscoverer::locate_executable(tmp.path()).unwrap(),
            Some(tmp.path().join("xrun"))
        );

        touch(&tmp.path().join("xother"));
        assert_eq!(SuiteDiscoverer::locate_executable(tmp.path()).unwrap(), None);
    }

    #[test]
    fn fixture_set_must_be_a_directory() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("fest"));
        assert_eq!(SuiteDiscoverer::locate_fixture_set(tmp.path()).unwrap(), None);
    }

    #[test]
    fn inspect_reports_the_first_missing_piece() {
        let tmp = TempDir::new().unwrap();
        let milestone = Milestone {
            name: "5".to_string(),
            dir: tmp.path().to_path_buf(),
        };
        assert_eq!(
            SuiteDiscoverer::inspect(&milestone),
            Err(SkipReason::NoFixtureSet)
        );

        fs::create_dir(tmp.path().join("fest")).unwrap();
        assert_eq!(
            SuiteDiscoverer::inspect(&milestone),
            Err(SkipReason::NoExecutable)
        );

        touch(&tmp.path().join("xfive"));
        let runnable = SuiteDiscoverer::inspect(&milestone).unwrap();
        assert_eq!(runnable.fixture_set, tmp.path().join("fest"));
        assert_eq!(runnable.executable, tmp.path().join("xfive"));
    }

    #[test]
    fn fixtures_are_paired_by_token_in_the_same_directory() {
        let tmp = TempDir::new().unwrap();
        let fest = tmp.path().join("fest");
        touch(&fest.join("team-a/Tests/1-in.json"));
        touch(&fest.join("team-a/Tests/1-out.json"));
        touch(&fest.join("team-a/Tests/2-in.json"));
        touch(&fest.join("team-a/2-out.json"));

        let scan = SuiteDiscoverer::enumerate_fixtures(&fest);
        assert!(scan.unreadable.is_empty());
        let fixtures = scan.fixtures;
        assert_eq!(fixtures.len(), 2);

        assert_eq!(fixtures[0].token, '1');
        assert_eq!(fixtures[0].group, "team-a");
        assert_eq!(
            fixtures[0].expected,
            Ok(fest.join("team-a/Tests/1-out.json"))
        );
        assert_eq!(fixtures[0].artifact_name("4"), "team-a_4_1");

        assert!(matches!(
            fixtures[1].expected,
            Err(PairingError::MissingExpected { ref expected_name, .. }) if expected_name == "2-out.json"
        ));
    }

    #[test]
    fn tokens_differing_only_in_case_pair_separately() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("fest/t/Tests");
        for name in ["a-in.json", "a-out.json", "A-in.json", "A-out.json"] {
            touch(&dir.join(name));
        }

        let scan = SuiteDiscoverer::enumerate_fixtures(tmp.path().join("fest"));
        assert_eq!(scan.fixtures.len(), 2);
        for fixture in &scan.fixtures {
            let expected = format!("{}-out.json", fixture.token);
            assert_eq!(fixture.expected, Ok(dir.join(expected)));
        }
    }

    #[test]
    fn expected_output_name_must_match_exactly() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("fest/t/Tests");
        touch(&dir.join("7-in.json"));
        touch(&dir.join("7-OUT.json"));

        let scan = SuiteDiscoverer::enumerate_fixtures(tmp.path().join("fest"));
        assert!(matches!(
            scan.fixtures[0].expected,
            Err(PairingError::MissingExpected { .. })
        ));
    }

    #[test]
    fn unreadable_fixture_set_is_reported_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let scan = SuiteDiscoverer::enumerate_fixtures(tmp.path().join("gone"));
        assert!(scan.fixtures.is_empty());
        assert_eq!(scan.unreadable.len(), 1);
        assert_eq!(scan.unreadable[0].path, tmp.path().join("gone"));
        assert_eq!(scan.len(), 1);
    }

    #[test]
    fn unreadable_milestone_directory_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let milestone = Milestone {
            name: "6".to_string(),
            dir: tmp.path().join("6"),
        };
        assert_eq!(
            SuiteDiscoverer::inspect(&milestone),
            Err(SkipReason::Unreadable)
        );
    }

    #[test]
    fn comparator_is_found_anywhere_under_root() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            SuiteDiscoverer::locate_comparator(tmp.path()),
            Err(FestError::ComparatorNotFound { .. })
        ));

        let cmp = tmp.path().join("Fish/scripts/json-eq/json-eq");
        touch(&cmp);
        touch(&tmp.path().join("Fish/scripts/json-eq/json-eq.ts"));
        assert_eq!(SuiteDiscoverer::locate_comparator(tmp.path()).unwrap(), cmp);

        touch(&tmp.path().join("other/json-eq/json-eq"));
        assert!(matches!(
            SuiteDiscoverer::locate_comparator(tmp.path()),
            Err(FestError::ComparatorAmbiguous { ref candidates, .. }) if candidates.len() == 2
        ));
    }
}
