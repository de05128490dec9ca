//! Per-request scratch directories with guaranteed cleanup.

use crate::config::WORKSPACE_PREFIX;
use crate::error::WorkspaceError;
use crate::model::sanitize_filename;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// A uniquely named temporary directory owned by one conversion.
///
/// Every file handed to a pipeline stage is created through the workspace so
/// it can be removed again. [`Workspace::release`] consumes the handle; a
/// handle that is dropped without being released (early return, panic) is
/// released from `Drop`, so cleanup runs exactly once either way.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    root: PathBuf,
    files: Vec<PathBuf>,
}

/// Outcome of releasing a workspace.
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Files and directories removed, the workspace root included.
    pub removed: usize,
    /// Removals that failed. Logged, never propagated.
    pub failures: Vec<WorkspaceError>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, path: &Path, outcome: std::io::Result<()>) {
        match outcome {
            Ok(()) => self.removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                warn!("Failed to remove {}: {}", path.display(), source);
                self.failures.push(WorkspaceError::Remove {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
    }
}

impl Workspace {
    /// Create a workspace under the system temp directory.
    pub fn acquire() -> Result<Self, WorkspaceError> {
        Self::acquire_in(None)
    }

    /// Create a workspace under `parent`, or the system temp directory.
    pub fn acquire_in(parent: Option<&Path>) -> Result<Self, WorkspaceError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);

        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(WorkspaceError::Create)?;

        let root = dir.path().to_path_buf();
        debug!("Acquired workspace {}", root.display());

        Ok(Self {
            dir: Some(dir),
            root,
            files: Vec::new(),
        })
    }

    /// Workspace directory.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Reserve a file path inside the workspace.
    ///
    /// The name is sanitized to a single path component. The file itself is
    /// not created.
    pub fn file(&mut self, name: &str) -> PathBuf {
        let path = self.root.join(sanitize_filename(name));
        if !self.files.contains(&path) {
            self.files.push(path.clone());
        }
        path
    }

    /// Write a file inside the workspace.
    pub fn write(&mut self, name: &str, contents: impl AsRef<[u8]>) -> std::io::Result<PathBuf> {
        let path = self.file(name);
        std::fs::write(&path, contents)?;
        debug!("Wrote {}", path.display());
        Ok(path)
    }

    /// Paths reserved so far, in creation order.
    pub fn tracked_files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Remove every file, then the directory.
    pub fn release(mut self) -> CleanupReport {
        self.cleanup()
    }

    fn cleanup(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();
        let Some(dir) = self.dir.take() else {
            return report;
        };

        // A tracked path that is no longer a plain file is reported even
        // though the sweep below still removes it.
        for path in self.files.drain(..) {
            let outcome = std::fs::remove_file(&path);
            report.record(&path, outcome);
        }

        // Collaborators may leave files we never reserved.
        if let Ok(entries) = std::fs::read_dir(&self.root) {
            for entry in entries.flatten() {
                let path = entry.path();
                let outcome = if path.is_dir() {
                    std::fs::remove_dir_all(&path)
                } else {
                    std::fs::remove_file(&path)
                };
                report.record(&path, outcome);
            }
        }

        let outcome = dir.close();
        report.record(&self.root, outcome);

        debug!(
            "Released workspace {} ({} removed, {} failed)",
            self.root.display(),
            report.removed,
            report.failures.len()
        );
        report
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.dir.is_some() {
            debug!("Workspace {} dropped without release", self.root.display());
            self.cleanup();
        }
    }
}
