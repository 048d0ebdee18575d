pub mod git;
pub mod runner;

use std::path::{Component, Path, PathBuf};

use crate::error::{AppError, Result};

pub use git::{DiffProvider, GitDiff};
pub use runner::{CommandRunner, ShellRunner};

/// Resolve `requested` against `workspace_root`, refusing anything that escapes it.
///
/// The target does not need to exist. Absolute paths and `..` components are
/// rejected outright; the nearest existing ancestor is canonicalized so that
/// symlinks pointing outside the root are caught too.
pub fn verify_path(workspace_root: &Path, requested: &str) -> Result<PathBuf> {
    let relative = Path::new(requested);

    if relative.is_absolute() {
        return Err(AppError::Workspace(format!(
            "{requested} is an absolute path, not a relative path"
        )));
    }

    if relative
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    {
        return Err(AppError::Workspace(format!(
            "Path traversal detected: {requested} is outside workspace"
        )));
    }

    if !relative.components().any(|c| matches!(c, Component::Normal(_))) {
        return Err(AppError::Workspace(format!(
            "{requested:?} refers to the workspace root, not a path inside it"
        )));
    }

    let canonical_root = workspace_root
        .canonicalize()
        .map_err(|e| AppError::Workspace(format!("Failed to resolve workspace root: {e}")))?;

    let full_path = canonical_root.join(relative);

    let mut existing = full_path.as_path();
    while !existing.exists() {
        existing = existing
            .parent()
            .ok_or_else(|| AppError::Workspace("Invalid file path".to_string()))?;
    }

    let canonical_existing = existing
        .canonicalize()
        .map_err(|e| AppError::Workspace(format!("Failed to resolve path: {e}")))?;

    if !canonical_existing.starts_with(&canonical_root) {
        return Err(AppError::Workspace(format!(
            "Path traversal detected: {requested} is outside workspace"
        )));
    }

    Ok(full_path)
}
