//! Undo functionality for reverting an organize run.
//!
//! Operations are replayed newest first. Moves and renames go back to their
//! original path, copies are removed, and deletes are reported since the
//! trash has to be emptied by hand. Every operation is independent: one
//! failure never stops the rest.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{OrganizeError, OrganizeResult};
use crate::executor::{MoveOperation, OperationKind, OperationLog, move_file, two_step_rename};
use crate::naming::{is_case_only_change, is_same_file, unique_path};
use crate::recent::RecentlyOrganized;

/// Represents the result of an undo operation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UndoReport {
    /// Operations successfully reversed.
    pub restored: usize,
    /// Operations that could not be reversed but need no action to retry
    /// (deleted files, files that are already gone).
    pub warnings: Vec<(PathBuf, String)>,
    /// Operations that failed.
    pub errors: Vec<(PathBuf, String)>,
    /// Empty directories removed during cleanup.
    pub removed_dirs: Vec<PathBuf>,
}

impl UndoReport {
    pub fn total_processed(&self) -> usize {
        self.restored + self.warnings.len() + self.errors.len()
    }

    /// True if nothing failed. Warnings do not count.
    pub fn is_complete_success(&self) -> bool {
        self.errors.is_empty()
    }
}

enum Outcome {
    Restored,
    Warning(PathBuf, String),
}

/// Replays operation logs in reverse.
#[derive(Debug, Default, Clone)]
pub struct UndoManager {
    recent: Option<Arc<RecentlyOrganized>>,
}

impl UndoManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks restored paths so a watcher ignores them.
    pub fn with_recent(mut self, recent: Arc<RecentlyOrganized>) -> Self {
        self.recent = Some(recent);
        self
    }

    /// Undoes the run recorded in `base_path`'s history file.
    ///
    /// The history file is removed only when nothing failed, so a partial
    /// undo can be retried after fixing the cause.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tidywatch::undo::UndoManager;
    /// use std::path::Path;
    ///
    /// match UndoManager::new().undo(Path::new("/path/to/directory")) {
    ///     Ok(report) => println!("Restored {} files", report.restored),
    ///     Err(e) => eprintln!("Undo failed: {}", e),
    /// }
    /// ```
    pub fn undo(&self, base_path: &Path) -> OrganizeResult<UndoReport> {
        if !base_path.exists() {
            return Err(OrganizeError::InvalidBasePath {
                path: base_path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "base path does not exist",
                ),
            });
        }

        let log = OperationLog::load(base_path)?.ok_or(OrganizeError::NothingToUndo)?;
        let report = self.replay(&log);

        if report.is_complete_success()
            && let Err(e) = OperationLog::delete(base_path)
        {
            warn!(error = %e, "could not delete history file");
        }
        Ok(report)
    }

    /// Reverses every operation in `log`, newest first, then removes the
    /// directories the run created if they are empty.
    pub fn replay(&self, log: &OperationLog) -> UndoReport {
        let mut report = UndoReport::default();

        for operation in log.operations.iter().rev() {
            match self.reverse(operation) {
                Ok(Outcome::Restored) => report.restored += 1,
                Ok(Outcome::Warning(path, reason)) => {
                    warn!(path = %path.display(), %reason, "undo skipped");
                    report.warnings.push((path, reason));
                }
                Err((path, reason)) => {
                    warn!(path = %path.display(), %reason, "undo failed");
                    report.errors.push((path, reason));
                }
            }
        }

        self.cleanup_dirs(&log.created_dirs, &mut report);
        info!(
            restored = report.restored,
            warnings = report.warnings.len(),
            errors = report.errors.len(),
            "undo finished"
        );
        report
    }

    fn reverse(&self, operation: &MoveOperation) -> Result<Outcome, (PathBuf, String)> {
        match operation.action_type {
            OperationKind::Delete => Ok(Outcome::Warning(
                operation.original_path.clone(),
                "cannot restore a deleted file; recover it from the trash".to_string(),
            )),
            OperationKind::Copy => self.remove_copy(operation),
            OperationKind::Move | OperationKind::Rename => self.restore_file(operation),
        }
    }

    fn remove_copy(&self, operation: &MoveOperation) -> Result<Outcome, (PathBuf, String)> {
        let copy = &operation.new_path;
        if !copy.exists() {
            return Ok(Outcome::Warning(
                copy.clone(),
                "copy not found at expected location".to_string(),
            ));
        }
        fs::remove_file(copy)
            .map_err(|e| (copy.clone(), format!("failed to remove copy: {e}")))?;
        self.mark(copy);
        debug!(path = %copy.display(), "removed copy");
        Ok(Outcome::Restored)
    }

    /// Moves a file back, recreating its parent and backing up any
    /// unrelated file now sitting at the original path.
    fn restore_file(&self, operation: &MoveOperation) -> Result<Outcome, (PathBuf, String)> {
        let current = &operation.new_path;
        let original = &operation.original_path;

        if !current.exists() {
            return Ok(Outcome::Warning(
                current.clone(),
                "file not found at expected location".to_string(),
            ));
        }

        if let Some(parent) = original.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                (
                    parent.to_path_buf(),
                    format!("could not recreate original directory: {e}"),
                )
            })?;
        }

        if original.exists() && !is_same_file(original, current) {
            let backup_path = unique_path(&generate_backup_path(original), None);
            fs::rename(original, &backup_path).map_err(|e| {
                (
                    original.clone(),
                    format!("could not back up conflicting file: {e}"),
                )
            })?;
            info!(path = %original.display(), backup = %backup_path.display(), "backed up conflicting file");
        }

        let moved = if is_case_only_change(current, original) {
            two_step_rename(current, original, self.recent.as_deref())
        } else {
            move_file(current, original)
        };
        moved.map_err(|e| (current.clone(), format!("failed to restore file: {e}")))?;

        self.mark(current);
        self.mark(original);
        debug!(from = %current.display(), to = %original.display(), "restored file");
        Ok(Outcome::Restored)
    }

    /// Removes created directories that ended up empty, innermost first.
    fn cleanup_dirs(&self, created_dirs: &[PathBuf], report: &mut UndoReport) {
        let mut dirs: Vec<&PathBuf> = created_dirs.iter().collect();
        dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));

        for dir in dirs {
            let is_empty = fs::read_dir(dir)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if !is_empty {
                continue;
            }
            match fs::remove_dir(dir) {
                Ok(()) => {
                    self.mark(dir);
                    report.removed_dirs.push(dir.clone());
                }
                Err(e) => warn!(path = %dir.display(), error = %e, "could not remove directory"),
            }
        }
    }

    fn mark(&self, path: &Path) {
        if let Some(recent) = &self.recent {
            recent.mark(path);
        }
    }
}

/// Generates a backup path for a file by appending a timestamp.
///
/// Example: `file.txt` becomes `file.txt.bak.20251109-143052`
fn generate_backup_path(original_path: &Path) -> PathBuf {
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let filename = original_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    original_path.with_file_name(format!("{filename}.bak.{timestamp}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule_engine::TRASH_SENTINEL;
    use tempfile::TempDir;

    fn op(from: PathBuf, to: PathBuf, kind: OperationKind) -> MoveOperation {
        MoveOperation {
            original_path: from,
            new_path: to,
            action_type: kind,
        }
    }

    fn moved(base: &Path, name: &str, dir: &str, content: &str) -> MoveOperation {
        let target_dir = base.join(dir);
        fs::create_dir_all(&target_dir).expect("Failed to create directory");
        let target = target_dir.join(name);
        fs::write(&target, content).expect("Failed to write file");
        op(base.join(name), target, OperationKind::Move)
    }

    #[test]
    fn test_undo_no_history() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let result = UndoManager::new().undo(temp_dir.path());
        assert!(matches!(result, Err(OrganizeError::NothingToUndo)));
    }

    #[test]
    fn test_undo_invalid_base_path() {
        let result = UndoManager::new().undo(Path::new("/non/existent/path"));
        assert!(matches!(result, Err(OrganizeError::InvalidBasePath { .. })));
    }

    #[test]
    fn test_undo_restores_and_removes_history() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let mut log = OperationLog::new(base.to_path_buf());
        log.add_operation(moved(base, "image.png", "Images", "png"));
        log.add_operation(moved(base, "document.pdf", "Documents", "pdf"));
        log.save(base).expect("Failed to save history");

        let report = UndoManager::new().undo(base).expect("Undo failed");
        assert_eq!(report.restored, 2);
        assert!(report.is_complete_success());
        assert!(base.join("image.png").exists());
        assert!(base.join("document.pdf").exists());
        assert!(OperationLog::load(base).expect("load").is_none());
    }

    #[test]
    fn test_undo_with_file_name_conflict() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let operation = moved(base, "test.txt", "Documents", "original content");
        fs::write(base.join("test.txt"), "new content").expect("Failed to create conflict");

        let mut log = OperationLog::new(base.to_path_buf());
        log.add_operation(operation);
        let report = UndoManager::new().replay(&log);

        assert_eq!(report.restored, 1);
        assert_eq!(
            fs::read_to_string(base.join("test.txt")).expect("read"),
            "original content"
        );
        let backups: Vec<_> = fs::read_dir(base)
            .expect("Failed to read dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".bak."))
            .collect();
        assert_eq!(backups.len(), 1);
    }

    #[test]
    fn test_missing_file_is_a_warning() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let mut log = OperationLog::new(base.to_path_buf());
        log.add_operation(op(
            base.join("nonexistent.txt"),
            base.join("Documents").join("nonexistent.txt"),
            OperationKind::Move,
        ));
        let report = UndoManager::new().replay(&log);

        assert_eq!(report.restored, 0);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.is_complete_success());
    }

    #[test]
    fn test_delete_warns_and_does_not_abort() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let mut log = OperationLog::new(base.to_path_buf());
        log.add_operation(moved(base, "a.txt", "Documents", "a"));
        log.add_operation(op(
            base.join("old.log"),
            PathBuf::from(TRASH_SENTINEL),
            OperationKind::Delete,
        ));
        let report = UndoManager::new().replay(&log);

        assert_eq!(report.restored, 1);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].1.contains("cannot restore"));
        assert!(base.join("a.txt").exists());
    }

    #[test]
    fn test_copy_is_removed_and_original_recreated_parent() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let sorted = base.join("2024");
        fs::create_dir_all(&sorted).expect("mkdir");
        fs::write(sorted.join("photo.jpg"), "jpeg").expect("write");
        fs::create_dir_all(base.join("Backup")).expect("mkdir");
        fs::write(base.join("Backup").join("photo.jpg"), "jpeg").expect("write");

        let mut log = OperationLog::new(base.to_path_buf());
        log.add_operation(op(
            base.join("inbox").join("photo.jpg"),
            sorted.join("photo.jpg"),
            OperationKind::Move,
        ));
        log.add_operation(op(
            sorted.join("photo.jpg"),
            base.join("Backup").join("photo.jpg"),
            OperationKind::Copy,
        ));
        log.created_dirs.push(sorted.clone());

        let recent = Arc::new(RecentlyOrganized::default());
        let report = UndoManager::new().with_recent(recent.clone()).replay(&log);

        assert_eq!(report.restored, 2);
        assert!(base.join("inbox").join("photo.jpg").exists());
        assert!(!base.join("Backup").join("photo.jpg").exists());
        assert!(!sorted.exists());
        assert_eq!(report.removed_dirs, vec![sorted]);
        assert!(recent.is_recent(&base.join("inbox").join("photo.jpg")));
    }

    #[test]
    fn test_cleanup_innermost_first_keeps_non_empty() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        let outer = base.join("Sorted");
        let inner = outer.join("Image");
        fs::create_dir_all(&inner).expect("mkdir");

        let mut log = OperationLog::new(base.to_path_buf());
        log.created_dirs = vec![outer.clone(), inner.clone()];
        let report = UndoManager::new().replay(&log);
        assert_eq!(report.removed_dirs, vec![inner.clone(), outer.clone()]);

        fs::create_dir_all(&inner).expect("mkdir");
        fs::write(outer.join("keep.txt"), "user file").expect("write");
        let report = UndoManager::new().replay(&log);
        assert_eq!(report.removed_dirs, vec![inner]);
        assert!(outer.exists());
    }

    #[test]
    fn test_rename_case_only_is_reversed() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("report.pdf"), "pdf").expect("write");

        let mut log = OperationLog::new(base.to_path_buf());
        log.add_operation(op(
            base.join("report.PDF"),
            base.join("report.pdf"),
            OperationKind::Rename,
        ));
        let report = UndoManager::new().replay(&log);
        assert_eq!(report.restored, 1);

        let names: Vec<String> = fs::read_dir(base)
            .expect("read dir")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["report.PDF".to_string()]);
    }
}
