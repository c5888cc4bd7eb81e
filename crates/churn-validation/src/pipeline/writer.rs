//! Dataset export.
//!
//! Datasets are written as header CSVs without a row-index column. Every
//! export goes through a temp file in the target directory that is renamed
//! over the destination, so an interrupted write never leaves a truncated
//! dataset behind.

use crate::error::{Result, ValidationError};
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Writes cleaned datasets to disk.
pub struct DatasetWriter;

impl DatasetWriter {
    /// Write `df` to `dir/file_name`, creating `dir` if needed.
    ///
    /// Returns the path of the written file.
    pub fn export(df: &mut DataFrame, file_name: &str, dir: &Path) -> Result<PathBuf> {
        Self::stage(df, file_name, dir)?.commit()
    }

    /// Write `df` next to its destination without replacing it yet.
    ///
    /// Call [`StagedExport::commit`] to move the file into place. Dropping
    /// the stage instead discards the temp file.
    pub fn stage(df: &mut DataFrame, file_name: &str, dir: &Path) -> Result<StagedExport> {
        fs::create_dir_all(dir).map_err(|e| ValidationError::io(dir, e))?;

        let target = dir.join(file_name);
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ValidationError::io(dir, e))?;

        CsvWriter::new(tmp.as_file_mut())
            .include_header(true)
            .with_separator(b',')
            .with_quote_char(b'"')
            .finish(df)?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| ValidationError::io(tmp.path(), e))?;

        debug!(
            "Staged {} rows for {} at {}",
            df.height(),
            target.display(),
            tmp.path().display()
        );
        Ok(StagedExport { tmp, target })
    }
}

/// A dataset written to a temp file, waiting to replace its destination.
#[derive(Debug)]
pub struct StagedExport {
    tmp: NamedTempFile,
    target: PathBuf,
}

impl StagedExport {
    /// Final location of the dataset once committed.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the temp file over the destination.
    pub fn commit(self) -> Result<PathBuf> {
        self.tmp
            .persist(&self.target)
            .map_err(|e| ValidationError::io(&self.target, e.error))?;
        info!("Dataset saved: {}", self.target.display());
        Ok(self.target)
    }

    /// Like [`commit`](Self::commit), but first copies any existing
    /// destination to a backup so the commit can be undone with
    /// [`CommittedExport::roll_back`].
    pub fn commit_keeping_previous(self) -> Result<CommittedExport> {
        let previous = if self.target.is_file() {
            let dir = self.tmp.path().parent().unwrap_or(Path::new("."));
            let backup = NamedTempFile::new_in(dir).map_err(|e| ValidationError::io(dir, e))?;
            fs::copy(&self.target, backup.path())
                .map_err(|e| ValidationError::io(&self.target, e))?;
            Some(backup)
        } else {
            None
        };

        let target = self.commit()?;
        Ok(CommittedExport { target, previous })
    }
}

/// A committed dataset that can still be reverted to what it replaced.
///
/// Dropping it keeps the new dataset and discards the backup.
#[derive(Debug)]
pub struct CommittedExport {
    target: PathBuf,
    previous: Option<NamedTempFile>,
}

impl CommittedExport {
    pub fn path(&self) -> &Path {
        &self.target
    }

    pub fn into_path(self) -> PathBuf {
        self.target
    }

    /// Put back the file that was replaced, or remove the dataset if there
    /// was none. Failures are logged.
    pub fn roll_back(self) {
        let restored = match self.previous {
            Some(backup) => backup.persist(&self.target).map(|_| ()).map_err(|e| e.error),
            None => fs::remove_file(&self.target),
        };
        match restored {
            Ok(()) => info!("Rolled back {}", self.target.display()),
            Err(e) => warn!("Failed to roll back {}: {}", self.target.display(), e),
        }
    }
}
