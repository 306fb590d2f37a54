//! Snapshot preparation and cleanup.
//!
//! A snapshot is a copy of the reference answer file with one placeholder
//! replaced by the user's text. It lives next to the answer file under a
//! name derived from the placeholder index, so checks of different
//! placeholders never share a file.
//!
//! ## Lifecycle
//!
//! ```text
//! Created ──► Verified ──► (dropped)
//! ```
//!
//! [`Snapshot`] owns the snapshot path and every support file written for
//! it. Dropping it deletes them all, whichever way the check ended, and logs
//! the stage it was dropped from.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::checker::CheckRequest;
use crate::config::CheckerConfig;
use crate::course::TaskFile;
use crate::document::{Document, TextDocument, copy_file};
use crate::error::{CheckError, Result};

/// Where a snapshot is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotStage {
    Created,
    Verified,
}

/// A task resource that has to sit next to the snapshot under its name.
///
/// Test harnesses usually import the module under test by file name; the
/// resource copy puts the task's own version of the file into
/// `target_dir` under the snapshot's name so that import resolves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceCopy {
    pub source: PathBuf,
    pub target_dir: PathBuf,
}

/// Scoped owner of a snapshot file and its support files.
#[derive(Debug)]
pub struct Snapshot {
    path: PathBuf,
    support: Vec<PathBuf>,
    stage: SnapshotStage,
}

impl Snapshot {
    fn created(path: PathBuf) -> Self {
        tracing::debug!(snapshot = %path.display(), "snapshot created");
        Self {
            path,
            support: Vec::new(),
            stage: SnapshotStage::Created,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn support_files(&self) -> &[PathBuf] {
        &self.support
    }

    pub fn stage(&self) -> SnapshotStage {
        self.stage
    }

    pub(crate) fn mark_verified(&mut self) {
        debug_assert_eq!(self.stage, SnapshotStage::Created);
        self.stage = SnapshotStage::Verified;
    }

    /// Record a support file before it is written, so a half-written file
    /// is still removed.
    fn track(&mut self, path: PathBuf) {
        self.support.push(path);
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        for path in std::iter::once(&self.path).chain(self.support.iter()) {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "failed to delete");
                }
            }
        }
        tracing::debug!(snapshot = %self.path.display(), from = ?self.stage, "snapshot deleted");
    }
}

/// File name of the snapshot for placeholder `index` of `answer_file`.
///
/// `task.py` with index 2 and postfix `_window` gives `task2_window.py`.
pub fn snapshot_name(answer_file: &Path, index: usize, postfix: &str) -> Result<String> {
    let stem = answer_file.file_stem().ok_or_else(|| {
        CheckError::io(
            answer_file,
            io::Error::new(io::ErrorKind::InvalidInput, "answer path has no file name"),
        )
    })?;
    let mut name = format!("{}{}{}", stem.to_string_lossy(), index, postfix);
    if let Some(ext) = answer_file.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    Ok(name)
}

/// Copy the answer file and substitute the user's placeholder text.
pub fn prepare(request: &CheckRequest<'_>, config: &CheckerConfig) -> Result<Snapshot> {
    let index = request.index;
    let answer_placeholder = request.answer.task_file.placeholder(index)?;
    let user_placeholder = request.user_task_file.placeholder(index)?;

    // Model errors surface before anything touches the disk.
    let user_range = user_placeholder.range_in(request.user_document)?;
    let user_text = request.user_document.slice(user_range)?;

    let dir = request.answer.file.parent().unwrap_or(Path::new(""));
    let name = snapshot_name(request.answer.file, index, &config.window_postfix)?;
    let mut snapshot = Snapshot::created(dir.join(&name));
    copy_file(request.answer.file, dir, &name)?;

    let mut window = TextDocument::open(snapshot.path())?;
    let mut window_task = request.answer.task_file.clone();
    let range = answer_placeholder.range_in(&window)?;
    let before = window.line_index().clone();
    let edit = window.replace(range, user_text)?;
    window_task.track_edit(&before, &edit, window.line_index());
    window.save()?;

    if let Some(resource) = request.answer.resource {
        let target = resource.target_dir.join(&name);
        if target == snapshot.path {
            return Err(CheckError::Config(format!(
                "resource copy would overwrite snapshot {}",
                target.display()
            )));
        }
        snapshot.track(target);
        copy_file(&resource.source, &resource.target_dir, &name)?;
    }

    if config.flush_windows {
        let stem = snapshot_stem(&name);
        let target = dir.join(format!("{}{}", stem, config.windows_postfix));
        snapshot.track(target.clone());
        flush_windows(&window_task, &window, &target)?;
    }

    Ok(snapshot)
}

fn snapshot_stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}

/// Write one `#placeholder = <text>` line per placeholder.
fn flush_windows(task: &TaskFile, doc: &TextDocument, target: &Path) -> Result<()> {
    let mut listing = String::new();
    for placeholder in task.placeholders() {
        let text = doc.slice(placeholder.range_in(doc)?)?;
        let _ = writeln!(listing, "#placeholder = {}", text);
    }
    fs::write(target, listing).map_err(|e| CheckError::io(target, e))
}
