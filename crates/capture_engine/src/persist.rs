use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    NamedTempFile::new_in(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    Ok(())
}

/// A file written under a temporary name in its final directory and moved
/// into place by [`StagedFile::commit`]. Dropping it uncommitted deletes the
/// temporary file, so readers never see a half-written target.
pub struct StagedFile {
    tmp: NamedTempFile,
    target: PathBuf,
}

impl StagedFile {
    /// Stage `{dir}/{stem}.{extension}`. If that name is taken a `_2`, `_3`,
    /// ... suffix is appended to the stem.
    pub fn create(dir: &Path, stem: &str, extension: &str) -> Result<Self, PersistError> {
        ensure_output_dir(dir)?;
        let target = free_target(dir, stem, extension);
        let tmp = tempfile::Builder::new()
            .prefix(".partial-")
            .suffix(&format!(".{extension}"))
            .tempfile_in(dir)?;
        Ok(Self { tmp, target })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn file_mut(&mut self) -> &mut File {
        self.tmp.as_file_mut()
    }

    pub fn commit(mut self) -> Result<PathBuf, PersistError> {
        self.tmp.flush()?;
        self.tmp.as_file_mut().sync_all()?;
        self.tmp
            .persist_noclobber(&self.target)
            .map_err(|e| PersistError::Io(e.error))?;
        Ok(self.target)
    }
}

fn free_target(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let mut target = dir.join(format!("{stem}.{extension}"));
    let mut suffix = 2;
    while target.exists() {
        target = dir.join(format!("{stem}_{suffix}.{extension}"));
        suffix += 1;
    }
    target
}
