//! Clearing environment overlays on a freshly created release branch.
//!
//! A new release branch starts with no environment values populated; later
//! promotions fill them in. Every overlay directory directly under the charts
//! root (`helm-charts/*-values` by default) is emptied of files. Each directory
//! that held files gets a one-line marker so the directory survives in git.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::io::config::ScrubConfig;

/// What a scrub removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrubReport {
    /// Overlay directories found, relative to the checkout root.
    pub overlays: Vec<PathBuf>,
    /// Directories that received a marker file, relative to the checkout root.
    pub cleared_dirs: Vec<PathBuf>,
    pub removed_files: usize,
}

/// Empty every overlay directory under `checkout/<charts_root>`.
pub fn scrub_overlays(checkout: &Path, cfg: &ScrubConfig) -> Result<ScrubReport> {
    let charts = checkout.join(&cfg.charts_root);
    if !charts.is_dir() {
        warn!(path = %charts.display(), "charts root missing, nothing to scrub");
        return Ok(ScrubReport::default());
    }

    let mut report = ScrubReport::default();
    for overlay in overlay_dirs(&charts, &cfg.overlay_suffix)? {
        let rel_overlay = relative(checkout, &overlay);
        let (cleared, removed) = clear_files(checkout, &overlay, &cfg.marker_file)?;
        debug!(overlay = %rel_overlay.display(), removed, "overlay cleared");
        report.removed_files += removed;
        report.cleared_dirs.extend(cleared);
        report.overlays.push(rel_overlay);
    }

    info!(
        overlays = report.overlays.len(),
        removed_files = report.removed_files,
        "environment overlays scrubbed"
    );
    Ok(report)
}

/// Overlay directories directly under `charts`, sorted by name.
fn overlay_dirs(charts: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(charts).with_context(|| format!("read {}", charts.display()))? {
        let entry = entry.with_context(|| format!("read entry in {}", charts.display()))?;
        let is_dir = entry
            .file_type()
            .with_context(|| format!("stat {}", entry.path().display()))?
            .is_dir();
        if is_dir && entry.file_name().to_string_lossy().ends_with(suffix) {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Delete every file below `overlay`, then drop a marker into each directory
/// that held one. Returns the marked directories and the number removed.
fn clear_files(checkout: &Path, overlay: &Path, marker_file: &str) -> Result<(Vec<PathBuf>, usize)> {
    let mut files = Vec::new();
    for entry in WalkDir::new(overlay).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk {}", overlay.display()))?;
        if !entry.file_type().is_dir() {
            files.push(entry.into_path());
        }
    }

    let mut dirs = BTreeSet::new();
    for file in &files {
        fs::remove_file(file).with_context(|| format!("remove {}", file.display()))?;
        if let Some(parent) = file.parent() {
            dirs.insert(parent.to_path_buf());
        }
    }

    let mut cleared = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let rel_dir = relative(checkout, &dir);
        let marker = dir.join(marker_file);
        let line = format!(
            "The files of {} were cleared when this branch was created.\n",
            rel_dir.display()
        );
        fs::write(&marker, line).with_context(|| format!("write {}", marker.display()))?;
        cleared.push(rel_dir);
    }
    Ok((cleared, files.len()))
}

fn relative(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}
