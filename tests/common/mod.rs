//! Throwaway suite trees for the integration tests.
//!
//! Tested executables and the comparator are symlinks to system tools so no
//! test has to write and then immediately exec a script:
//!
//! - `xecho` -> `cat`: echoes its input document.
//! - `xsh` -> `sh`: runs its input document as a shell script.
//! - `json-eq/json-eq` -> `cmp`: byte equality, prints `... differ ...` on
//!   mismatch and exits nonzero.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

pub const ECHO: &str = "xecho";
pub const SHELL: &str = "xsh";

fn system_tool(candidates: &[&str]) -> Option<PathBuf> {
    candidates.iter().map(PathBuf::from).find(|p| p.exists())
}

pub struct Suite {
    _tmp: TempDir,
    pub root: PathBuf,
    pub scratch: PathBuf,
    cat: PathBuf,
    sh: PathBuf,
}

impl Suite {
    /// A suite root with a comparator installed, or `None` when the system
    /// tools it relies on are missing.
    pub fn new() -> Option<Self> {
        let cat = system_tool(&["/bin/cat", "/usr/bin/cat"])?;
        let sh = system_tool(&["/bin/sh", "/usr/bin/sh"])?;
        let cmp = system_tool(&["/usr/bin/cmp", "/bin/cmp"])?;

        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("suite");
        let scratch = tmp.path().join("scratch");
        let comparator_dir = root.join("Fish").join("json-eq");
        fs::create_dir_all(&comparator_dir).unwrap();
        symlink(cmp, comparator_dir.join("json-eq")).unwrap();

        Some(Self {
            _tmp: tmp,
            root,
            scratch,
            cat,
            sh,
        })
    }

    pub fn milestone(&self, name: &str) -> PathBuf {
        let dir = self.root.join(name);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Milestone whose executable echoes its input.
    pub fn echo_milestone(&self, name: &str) -> PathBuf {
        let dir = self.milestone(name);
        symlink(&self.cat, dir.join(ECHO)).unwrap();
        fs::create_dir_all(dir.join("fest")).unwrap();
        dir
    }

    /// Milestone whose executable runs each input as a shell script.
    pub fn shell_milestone(&self, name: &str) -> PathBuf {
        let dir = self.milestone(name);
        symlink(&self.sh, dir.join(SHELL)).unwrap();
        fs::create_dir_all(dir.join("fest")).unwrap();
        dir
    }

    /// Writes `<milestone>/fest/<group>/Tests/<token>-in.json` and, when
    /// given, its expected output. Returns the input path.
    pub fn fixture(
        &self,
        milestone: &str,
        group: &str,
        token: char,
        input: &str,
        expected: Option<&str>,
    ) -> PathBuf {
        let dir = self.tests_dir(milestone, group);
        fs::create_dir_all(&dir).unwrap();
        let input_path = dir.join(format!("{token}-in.json"));
        fs::write(&input_path, input).unwrap();
        if let Some(expected) = expected {
            fs::write(dir.join(format!("{token}-out.json")), expected).unwrap();
        }
        input_path
    }

    pub fn expected_path(&self, milestone: &str, group: &str, token: char) -> PathBuf {
        self.tests_dir(milestone, group)
            .join(format!("{token}-out.json"))
    }

    pub fn artifact(&self, name: &str) -> PathBuf {
        self.scratch.join(name)
    }

    /// Sorted names of everything in the scratch directory.
    pub fn artifacts(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(&self.scratch)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn tests_dir(&self, milestone: &str, group: &str) -> PathBuf {
        self.root
            .join(milestone)
            .join("fest")
            .join(group)
            .join("Tests")
    }
}

pub fn path_str(path: &Path) -> String {
    path.display().to_string()
}
