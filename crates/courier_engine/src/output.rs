use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use engine_logging::{engine_info, engine_warn};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Files younger than this survive a purge with `keep_recent`.
pub const RECENT_WINDOW: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// The local directory rendered and converted documents are written to.
#[derive(Debug, Clone)]
pub struct OutputDir {
    dir: PathBuf,
}

impl OutputDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Create the directory if missing and check that it accepts files.
    pub fn ensure(&self) -> Result<(), PersistError> {
        if self.dir.exists() {
            let meta = fs::metadata(&self.dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
            if !meta.is_dir() {
                return Err(PersistError::OutputDir(format!(
                    "{} is not a directory",
                    self.dir.display()
                )));
            }
        } else {
            fs::create_dir_all(&self.dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        }
        NamedTempFile::new_in(&self.dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        Ok(())
    }

    /// Write `{dir}/{filename}` through a temp file and a rename, so a reader
    /// never sees a half-written document.
    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        self.ensure()?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        if target.is_file() {
            fs::remove_file(&target)?;
        }
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }

    /// Delete every regular file in the directory. With `keep_recent`, files
    /// modified within [`RECENT_WINDOW`] are kept. Returns the removed count.
    pub fn purge(&self, keep_recent: bool) -> Result<usize, PersistError> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let now = SystemTime::now();
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            let meta = match entry.metadata() {
                Ok(meta) if meta.is_file() => meta,
                _ => continue,
            };
            if keep_recent && is_recent(&meta, now) {
                continue;
            }
            if remove_artifact(&path) {
                removed += 1;
            }
        }
        if removed > 0 {
            engine_info!("Cleaned up {} file(s) from {}", removed, self.dir.display());
        }
        Ok(removed)
    }
}

/// Delete one local artifact. Returns whether something was removed;
/// failures are logged, never raised.
pub fn remove_artifact(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    match fs::remove_file(path) {
        Ok(()) => {
            engine_info!("Cleaned up file: {}", display_name(path));
            true
        }
        Err(err) => {
            engine_warn!("Failed to clean up {}: {}", path.display(), err);
            false
        }
    }
}

fn is_recent(meta: &fs::Metadata, now: SystemTime) -> bool {
    meta.modified()
        .ok()
        .and_then(|modified| now.duration_since(modified).ok())
        .map(|age| age < RECENT_WINDOW)
        // A timestamp in the future counts as recent.
        .unwrap_or(true)
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
