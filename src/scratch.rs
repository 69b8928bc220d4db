//! The scratch directory that receives execution artifacts.
//!
//! It is wiped and recreated when acquired, so a fresh run never sees
//! artifacts from a previous one, even if that run died half way. Artifacts
//! stay behind for inspection unless the guard was asked to clean up.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::{FestError, FestResult};

#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    remove_on_drop: bool,
}

impl ScratchDir {
    /// Destroys `path` if present and creates it empty.
    ///
    /// `protect` is a directory that must survive: the scratch directory may
    /// not be it or one of its ancestors.
    pub fn recreate(path: impl Into<PathBuf>, protect: &Path, remove_on_drop: bool) -> FestResult<Self> {
        let path = std::path::absolute(path.into()).map_err(|source| FestError::Scratch {
            path: PathBuf::new(),
            source,
        })?;
        refuse_dangerous(&path, protect)?;

        let scratch_err = |source| FestError::Scratch {
            path: path.clone(),
            source,
        };
        match fs::symlink_metadata(&path) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&path).map_err(scratch_err)?,
            Ok(_) => fs::remove_file(&path).map_err(scratch_err)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(scratch_err(e)),
        }
        fs::create_dir_all(&path).map_err(scratch_err)?;
        debug!(path = %path.display(), "scratch directory recreated");

        Ok(Self {
            path,
            remove_on_drop,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if !self.remove_on_drop {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.path) {
            warn!(path = %self.path.display(), error = %e, "could not remove scratch directory");
        }
    }
}

fn refuse_dangerous(path: &Path, protect: &Path) -> FestResult<()> {
    let refused = |reason: &str| {
        Err(FestError::ScratchRefused {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        })
    };
    if path.parent().is_none() {
        return refused("it is a file system root");
    }
    let protect = std::path::absolute(protect).unwrap_or_else(|_| protect.to_path_buf());
    if protect.starts_with(path) {
        return refused("it contains the suite root");
    }
    Ok(())
}
