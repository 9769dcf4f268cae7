//! Organization executor.
//!
//! Replays a classified file's action chain against the filesystem, records
//! one [`MoveOperation`] per mutation, and marks every touched path as
//! recently organized so the watcher ignores the echo.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{CompiledFilters, Settings};
use crate::error::{OrganizeError, OrganizeResult};
use crate::metadata::FileMetadata;
use crate::naming::{is_case_only_change, is_same_file, temporary_sibling};
use crate::recent::RecentlyOrganized;
use crate::rule::ActionType;
use crate::rule_engine::{Cursor, FileOrganizeResult, PlanContext, RuleEngine, Step, TRASH_SENTINEL, step};
use crate::trash::TrashService;

/// Undo history written next to the organized files by the CLI.
pub const HISTORY_FILE_NAME: &str = ".tidywatch_history.json";

/// Kind of filesystem mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Move,
    Copy,
    Rename,
    Delete,
}

/// One physical filesystem mutation, enough to reverse it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOperation {
    pub original_path: PathBuf,
    /// `[trash]` for deletes.
    pub new_path: PathBuf,
    pub action_type: OperationKind,
}

/// Everything one organize run changed. This is the unit of undo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationLog {
    pub timestamp: DateTime<Utc>,
    pub base_path: PathBuf,
    pub operations: Vec<MoveOperation>,
    /// Directories created for `SortIntoSubfolder`, outermost first.
    #[serde(default)]
    pub created_dirs: Vec<PathBuf>,
}

impl OperationLog {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            timestamp: Utc::now(),
            base_path,
            operations: Vec::new(),
            created_dirs: Vec::new(),
        }
    }

    pub fn add_operation(&mut self, operation: MoveOperation) {
        self.operations.push(operation);
    }

    /// Appends what a single file's execution did.
    pub fn absorb(&mut self, execution: &FileExecution) {
        self.operations.extend(execution.operations.iter().cloned());
        for dir in &execution.created_dirs {
            if !self.created_dirs.contains(dir) {
                self.created_dirs.push(dir.clone());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn history_file_path(base_path: &Path) -> PathBuf {
        base_path.join(HISTORY_FILE_NAME)
    }

    /// Saves this log to disk in JSON format.
    pub fn save(&self, base_path: &Path) -> OrganizeResult<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| OrganizeError::HistoryWriteFailed(io::Error::other(e)))?;
        fs::write(Self::history_file_path(base_path), json)
            .map_err(OrganizeError::HistoryWriteFailed)
    }

    /// Loads the most recent operation log from disk.
    pub fn load(base_path: &Path) -> OrganizeResult<Option<Self>> {
        let history_path = Self::history_file_path(base_path);
        if !history_path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&history_path).map_err(OrganizeError::HistoryReadFailed)?;
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| OrganizeError::InvalidHistoryFormat(e.to_string()))
    }

    /// Deletes the history file for a given base path.
    pub fn delete(base_path: &Path) -> OrganizeResult<()> {
        let history_path = Self::history_file_path(base_path);
        if history_path.exists() {
            fs::remove_file(&history_path).map_err(OrganizeError::HistoryWriteFailed)?;
        }
        Ok(())
    }
}

/// What executing one file did.
#[derive(Debug)]
pub struct FileExecution {
    pub source_path: PathBuf,
    /// Where the file ended up. `None` if it was deleted.
    pub final_path: Option<PathBuf>,
    pub operations: Vec<MoveOperation>,
    pub created_dirs: Vec<PathBuf>,
    /// The action that stopped the chain, if any.
    pub error: Option<OrganizeError>,
}

impl FileExecution {
    fn new(source_path: &Path) -> Self {
        Self {
            source_path: source_path.to_path_buf(),
            final_path: Some(source_path.to_path_buf()),
            operations: Vec::new(),
            created_dirs: Vec::new(),
            error: None,
        }
    }

    pub fn changed(&self) -> bool {
        !self.operations.is_empty()
    }
}

/// Outcome of organizing (or previewing) a set of files.
#[derive(Debug)]
pub struct OrganizeReport {
    pub preview: bool,
    pub results: Vec<FileOrganizeResult>,
    pub log: OperationLog,
    /// Files changed on disk, or that would be in a preview.
    pub files_moved: usize,
    pub files_skipped: usize,
    pub errors: Vec<(PathBuf, String)>,
}

impl OrganizeReport {
    pub fn new(base_path: &Path, preview: bool) -> Self {
        Self {
            preview,
            results: Vec::new(),
            log: OperationLog::new(base_path.to_path_buf()),
            files_moved: 0,
            files_skipped: 0,
            errors: Vec::new(),
        }
    }

    /// Results that change something.
    pub fn planned(&self) -> impl Iterator<Item = &FileOrganizeResult> {
        self.results
            .iter()
            .filter(|r| r.will_be_organized() && !r.is_unchanged())
    }
}

/// Performs planned actions on disk.
#[derive(Debug, Clone)]
pub struct OrganizationExecutor {
    trash: Arc<dyn TrashService>,
    recent: Arc<RecentlyOrganized>,
}

impl OrganizationExecutor {
    pub fn new(trash: Arc<dyn TrashService>, recent: Arc<RecentlyOrganized>) -> Self {
        Self { trash, recent }
    }

    pub fn recent(&self) -> &Arc<RecentlyOrganized> {
        &self.recent
    }

    /// Executes one classified file.
    ///
    /// Each action's target is recomputed against the live filesystem, so a
    /// name taken since classification still gets a fresh unique name. An
    /// error stops the remaining actions for this file only.
    pub fn execute(
        &self,
        result: &FileOrganizeResult,
        base_path: &Path,
        engine: &RuleEngine,
        settings: &Settings,
    ) -> FileExecution {
        let mut run = FileExecution::new(&result.source_path);
        if !result.will_be_organized() || result.is_unchanged() || result.actions.is_empty() {
            return run;
        }

        let file = match FileMetadata::from_path(&result.source_path, engine.kinds()) {
            Ok(file) => file,
            Err(_) => {
                run.error = Some(OrganizeError::FileNotFound(result.source_path.clone()));
                return run;
            }
        };
        let ctx = PlanContext {
            base_path,
            file: &file,
            categories: engine.categories(),
            now: Local::now(),
        };

        let mut cursor = Cursor::at(&file.path);
        for action in &result.actions {
            let current = cursor.path();
            let outcome = match step(&cursor, action, &ctx) {
                Step::Move(next) => self
                    .relocate(&current, &next.path(), action.action_type, &mut run)
                    .map(|()| Some(next)),
                Step::Copy(target) => self.copy(&current, &target, &mut run).map(|()| None),
                Step::Delete => {
                    if let Err(e) = self.dispose(&current, settings, &mut run) {
                        warn!(path = %current.display(), error = %e, "delete failed");
                        run.error = Some(e);
                    } else {
                        run.final_path = None;
                    }
                    return run;
                }
                Step::Ignore => break,
                Step::Skip => Ok(None),
            };

            match outcome {
                Ok(Some(next)) => cursor = next,
                Ok(None) => {}
                Err(e) => {
                    warn!(path = %current.display(), error = %e, "action failed");
                    run.error = Some(e);
                    break;
                }
            }
        }

        run.final_path = Some(cursor.path());
        run
    }

    /// Classifies and, unless previewing, organizes every file in `files`.
    ///
    /// Per-file failures are collected and never abort the batch.
    pub fn run(
        &self,
        files: &[PathBuf],
        base_path: &Path,
        engine: &RuleEngine,
        settings: &Settings,
        preview: bool,
    ) -> OrganizeReport {
        self.run_with_progress(files, base_path, engine, settings, preview, |_| {})
    }

    /// Like [`run`](Self::run), calling `on_file` before each file is processed.
    pub fn run_with_progress(
        &self,
        files: &[PathBuf],
        base_path: &Path,
        engine: &RuleEngine,
        settings: &Settings,
        preview: bool,
        mut on_file: impl FnMut(&Path),
    ) -> OrganizeReport {
        let mut report = OrganizeReport::new(base_path, preview);

        for path in files {
            on_file(path);
            let result = match engine.classify_path(path, base_path) {
                Ok(result) => result,
                Err(e) => {
                    report.errors.push((path.clone(), e.to_string()));
                    continue;
                }
            };

            let actionable = result.will_be_organized() && !result.is_unchanged();
            if preview || !actionable {
                if actionable {
                    report.files_moved += 1;
                } else {
                    report.files_skipped += 1;
                }
                report.results.push(result);
                continue;
            }

            let execution = self.execute(&result, base_path, engine, settings);
            report.log.absorb(&execution);
            if execution.changed() {
                report.files_moved += 1;
            } else if execution.error.is_none() {
                report.files_skipped += 1;
            }
            if let Some(error) = execution.error {
                report.errors.push((path.clone(), error.to_string()));
            }
            report.results.push(result);
        }

        info!(
            base = %base_path.display(),
            preview,
            moved = report.files_moved,
            skipped = report.files_skipped,
            errors = report.errors.len(),
            "organize run finished"
        );
        report
    }

    fn relocate(
        &self,
        from: &Path,
        to: &Path,
        action: ActionType,
        run: &mut FileExecution,
    ) -> OrganizeResult<()> {
        if from == to {
            return Ok(());
        }
        if let Some(parent) = to.parent() {
            self.ensure_dir(parent, action == ActionType::SortIntoSubfolder, run)?;
        }

        if is_case_only_change(from, to) {
            two_step_rename(from, to, Some(self.recent.as_ref()))?;
        } else {
            move_file(from, to)?;
        }
        self.recent.mark_all([from, to]);

        let action_type = if action == ActionType::Rename {
            OperationKind::Rename
        } else {
            OperationKind::Move
        };
        debug!(from = %from.display(), to = %to.display(), ?action_type, "relocated file");
        run.operations.push(MoveOperation {
            original_path: from.to_path_buf(),
            new_path: to.to_path_buf(),
            action_type,
        });
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path, run: &mut FileExecution) -> OrganizeResult<()> {
        if let Some(parent) = to.parent() {
            self.ensure_dir(parent, false, run)?;
        }
        fs::copy(from, to).map_err(|source| OrganizeError::CopyFailed {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        })?;
        self.recent.mark(to);

        debug!(from = %from.display(), to = %to.display(), "copied file");
        run.operations.push(MoveOperation {
            original_path: from.to_path_buf(),
            new_path: to.to_path_buf(),
            action_type: OperationKind::Copy,
        });
        Ok(())
    }

    fn dispose(&self, path: &Path, settings: &Settings, run: &mut FileExecution) -> OrganizeResult<()> {
        if settings.delete_to_trash {
            self.trash
                .send_to_trash(path)
                .map_err(|reason| OrganizeError::TrashFailed {
                    path: path.to_path_buf(),
                    reason,
                })?;
        } else {
            fs::remove_file(path).map_err(|source| OrganizeError::DeleteFailed {
                path: path.to_path_buf(),
                source,
            })?;
        }
        self.recent.mark(path);

        info!(path = %path.display(), to_trash = settings.delete_to_trash, "deleted file");
        run.operations.push(MoveOperation {
            original_path: path.to_path_buf(),
            new_path: PathBuf::from(TRASH_SENTINEL),
            action_type: OperationKind::Delete,
        });
        Ok(())
    }

    fn ensure_dir(&self, dir: &Path, record: bool, run: &mut FileExecution) -> OrganizeResult<()> {
        if dir.is_dir() {
            return Ok(());
        }
        let missing: Vec<PathBuf> = dir
            .ancestors()
            .take_while(|p| !p.as_os_str().is_empty() && !p.exists())
            .map(Path::to_path_buf)
            .collect();

        fs::create_dir_all(dir).map_err(|source| OrganizeError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source,
        })?;
        self.recent.mark_all(missing.iter().map(PathBuf::as_path));
        if record {
            run.created_dirs.extend(missing.into_iter().rev());
        }
        Ok(())
    }
}

/// Renames, falling back to copy + remove across filesystems.
pub(crate) fn move_file(from: &Path, to: &Path) -> OrganizeResult<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(from = %from.display(), to = %to.display(), "cross-device move, copying");
            fs::copy(from, to).map_err(|source| OrganizeError::CopyFailed {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                source,
            })?;
            fs::remove_file(from).map_err(|source| OrganizeError::DeleteFailed {
                path: from.to_path_buf(),
                source,
            })
        }
        Err(_) if !from.exists() => Err(OrganizeError::FileNotFound(from.to_path_buf())),
        Err(source) => Err(OrganizeError::MoveFailed {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        }),
    }
}

/// Changes only the letter case of a name, via a temporary sibling.
///
/// Refuses to replace `to` when it is a different file. The temporary name is
/// marked in `recent` so watchers ignore it.
pub(crate) fn two_step_rename(
    from: &Path,
    to: &Path,
    recent: Option<&RecentlyOrganized>,
) -> OrganizeResult<()> {
    if to.exists() && !is_same_file(from, to) {
        return Err(OrganizeError::MoveFailed {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source: io::Error::new(io::ErrorKind::AlreadyExists, "target is a different file"),
        });
    }
    let temp = temporary_sibling(from);
    if let Some(recent) = recent {
        recent.mark(&temp);
    }
    fs::rename(from, &temp).map_err(|source| OrganizeError::MoveFailed {
        from: from.to_path_buf(),
        to: temp.clone(),
        source,
    })?;
    if let Err(source) = fs::rename(&temp, to) {
        if let Err(e) = fs::rename(&temp, from) {
            warn!(path = %temp.display(), error = %e, "could not roll back temporary rename");
        }
        return Err(OrganizeError::MoveFailed {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        });
    }
    Ok(())
}

/// Recursively lists regular files under `base_path` that pass the filters.
///
/// Unreadable entries are returned as errors instead of aborting the scan.
pub fn collect_files(
    base_path: &Path,
    filters: &CompiledFilters,
) -> (Vec<PathBuf>, Vec<(PathBuf, String)>) {
    let mut files = Vec::new();
    let mut errors = Vec::new();

    for entry in WalkDir::new(base_path).follow_links(false).sort_by_file_name() {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                let path = entry.into_path();
                if filters.accepts(base_path, &path) {
                    files.push(path);
                }
            }
            Ok(_) => {}
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| base_path.to_path_buf());
                errors.push((path, e.to_string()));
            }
        }
    }
    (files, errors)
}
