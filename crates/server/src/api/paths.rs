//! Confines request paths to the configured storage roots.

use axum::http::StatusCode;
use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    #[error("{field} must not contain '..'")]
    ParentComponent { field: &'static str },

    #[error("{field} must be inside {root}")]
    OutsideRoot { field: &'static str, root: String },

    #[error("Storage root {root} is unavailable: {source}")]
    RootUnavailable {
        root: String,
        #[source]
        source: io::Error,
    },
}

impl PathError {
    pub fn status(&self) -> StatusCode {
        match self {
            PathError::RootUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Resolves `requested` against `root` and checks the result stays inside it.
///
/// Relative paths are taken from the root. Symlinks along the existing part of
/// the path are followed, so a link pointing out of the root is rejected too.
/// The returned path is absolute.
pub async fn confine(
    root: &Path,
    requested: &str,
    field: &'static str,
) -> Result<PathBuf, PathError> {
    if requested.trim().is_empty() {
        return Err(PathError::Empty { field });
    }

    let requested = Path::new(requested);
    if requested
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(PathError::ParentComponent { field });
    }

    let root = tokio::fs::canonicalize(root)
        .await
        .map_err(|source| PathError::RootUnavailable {
            root: root.display().to_string(),
            source,
        })?;

    let joined = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        root.join(requested)
    };
    let resolved = resolve_existing(&joined).await;

    if resolved == root || !resolved.starts_with(&root) {
        return Err(PathError::OutsideRoot {
            field,
            root: root.display().to_string(),
        });
    }
    Ok(resolved)
}

/// Canonicalizes the deepest existing ancestor of `path` and re-appends the rest.
async fn resolve_existing(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut missing: Vec<OsString> = Vec::new();
    loop {
        if let Ok(real) = tokio::fs::canonicalize(existing).await {
            return missing.iter().rev().fold(real, |acc, name| acc.join(name));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}
