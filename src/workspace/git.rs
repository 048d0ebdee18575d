use std::path::{Path, PathBuf};

use async_trait::async_trait;
use git2::{DiffFormat, DiffOptions, Repository};

use crate::error::{AppError, Result};

/// Source of the unified diff describing what the edit loop changed.
#[async_trait]
pub trait DiffProvider: Send + Sync {
    async fn diff(&self) -> Result<String>;
}

/// Diffs the working tree of a git checkout (untracked files included) against HEAD.
pub struct GitDiff {
    dir: PathBuf,
}

impl GitDiff {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }
}

#[async_trait]
impl DiffProvider for GitDiff {
    async fn diff(&self) -> Result<String> {
        let dir = self.dir.clone();

        tokio::task::spawn_blocking(move || working_tree_diff(&dir))
            .await
            .map_err(|e| AppError::Git(format!("Diff task panicked: {e}")))?
    }
}

fn working_tree_diff(dir: &Path) -> Result<String> {
    let repo = Repository::open(dir)?;

    // An unborn HEAD diffs against the empty tree.
    let head_tree = match repo.head() {
        Ok(head) => Some(head.peel_to_tree()?),
        Err(_) => None,
    };

    let mut opts = DiffOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .show_untracked_content(true);

    let diff = repo.diff_tree_to_workdir_with_index(head_tree.as_ref(), Some(&mut opts))?;

    let mut patch = String::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        if matches!(line.origin(), '+' | '-' | ' ') {
            patch.push(line.origin());
        }
        patch.push_str(&String::from_utf8_lossy(line.content()));
        true
    })?;

    Ok(patch)
}
