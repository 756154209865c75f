//! Temporary output paths and atomic publish.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::TranscodeError;

#[derive(Debug)]
struct StagedFile {
    staged: PathBuf,
    target: PathBuf,
}

/// Owns the temporary files of one processing run.
///
/// Every artifact is written to a hidden sibling of its final path and only
/// renamed into place by [`commit`](Self::commit). Until then, dropping the
/// guard (error return, panic, task abort) deletes whatever was written,
/// along with any directory it created that is still empty.
#[derive(Debug, Default)]
pub struct StagingGuard {
    files: Vec<StagedFile>,
    created_dirs: Vec<PathBuf>,
    committed: bool,
}

impl StagingGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `target` and returns the path to write it to instead.
    pub fn stage(&mut self, target: &Path) -> PathBuf {
        let staged = staged_path(target);
        self.files.push(StagedFile {
            staged: staged.clone(),
            target: target.to_path_buf(),
        });
        staged
    }

    /// Creates the missing parent directories of `target`, remembering which ones were new.
    pub async fn create_parent(&mut self, target: &Path) -> Result<(), TranscodeError> {
        let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };

        let mut missing = Vec::new();
        let mut dir = Some(parent);
        while let Some(current) = dir.filter(|d| !d.as_os_str().is_empty()) {
            if tokio::fs::try_exists(current).await.unwrap_or(false) {
                break;
            }
            missing.push(current.to_path_buf());
            dir = current.parent();
        }

        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| TranscodeError::OutputDirectoryFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        self.created_dirs.extend(missing);
        Ok(())
    }

    /// Staged paths in registration order.
    pub fn staged_paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.staged.clone()).collect()
    }

    /// Renames every staged file onto its target.
    ///
    /// If any rename fails, targets already published by this call are
    /// removed again and the remaining temporaries are deleted on drop.
    pub async fn commit(mut self) -> Result<(), TranscodeError> {
        let mut published: Vec<PathBuf> = Vec::new();

        for file in &self.files {
            if let Err(source) = tokio::fs::rename(&file.staged, &file.target).await {
                for target in &published {
                    if let Err(e) = tokio::fs::remove_file(target).await {
                        warn!(path = %target.display(), error = %e, "Failed to roll back published output");
                    }
                }
                return Err(TranscodeError::OutputCommitFailed {
                    path: file.target.clone(),
                    source,
                });
            }
            debug!(
                staged = %file.staged.display(),
                target = %file.target.display(),
                "Published output"
            );
            published.push(file.target.clone());
        }

        self.committed = true;
        Ok(())
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for file in &self.files {
            match std::fs::remove_file(&file.staged) {
                Ok(()) => debug!(path = %file.staged.display(), "Removed staged output"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %file.staged.display(), error = %e, "Failed to remove staged output"),
            }
        }

        // Deepest first, so a parent is empty by the time its turn comes.
        let mut dirs = self.created_dirs.clone();
        dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
        for dir in dirs {
            match std::fs::remove_dir(&dir) {
                Ok(()) => debug!(path = %dir.display(), "Removed output directory"),
                Err(e) => debug!(path = %dir.display(), error = %e, "Kept output directory"),
            }
        }
    }
}

/// `<dir>/.<stem>.<uuid>.partial.<ext>` next to `target`.
///
/// The extension is kept last so the encoder still infers the container.
fn staged_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(target.file_stem().unwrap_or_else(|| OsStr::new("output")));
    name.push(format!(".{}.partial", Uuid::new_v4().simple()));
    if let Some(ext) = target.extension() {
        name.push(".");
        name.push(ext);
    }

    match target.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}
