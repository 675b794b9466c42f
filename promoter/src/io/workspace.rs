//! Scratch directory holding every working copy of one promotion run.
//!
//! The directory is removed when the [`Workspace`] is dropped, on success and
//! on every error path. Git writes its object files read-only, so permissions
//! are relaxed before removal.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("promoter-")
            .tempdir()
            .context("create promotion workspace")?;
        debug!(path = %dir.path().display(), "workspace created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path for a named working copy inside the workspace.
    pub fn checkout_dir(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let root = self.dir.path();
        make_writable(root);
        if let Err(err) = fs::remove_dir_all(root) {
            warn!(path = %root.display(), err = %err, "failed to remove workspace");
        } else {
            debug!(path = %root.display(), "workspace removed");
        }
    }
}

fn make_writable(root: &Path) {
    for entry in WalkDir::new(root).into_iter().filter_map(|entry| entry.ok()) {
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let mut permissions = metadata.permissions();
        if !permissions.readonly() {
            continue;
        }
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
        if let Err(err) = fs::set_permissions(entry.path(), permissions) {
            warn!(path = %entry.path().display(), err = %err, "failed to clear read-only flag");
        }
    }
}
