//! Command handlers behind the `tidywatch` binary.
//!
//! `organize` and `undo` run synchronously against one directory and persist
//! the undo log next to it. `watch` drives a [`FolderWatchManager`] until
//! Ctrl-C.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::executor::{OrganizationExecutor, OrganizeReport, collect_files};
use crate::folder::WatchedFolder;
use crate::output::OutputFormatter;
use crate::recent::RecentlyOrganized;
use crate::rule_engine::FileOrganizeResult;
use crate::undo::{UndoManager, UndoReport};
use crate::watch_manager::FolderWatchManager;

/// A one-shot command against a single directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganizeCommand {
    Organize {
        /// Classify only, touch nothing.
        dry_run: bool,
    },
    Undo,
}

/// Runs `command` against `dir_path`, loading configuration from `config_path`
/// or the default lookup locations.
pub fn run_cli(command: OrganizeCommand, dir_path: &Path, config_path: Option<&Path>) -> Result<(), String> {
    match command {
        OrganizeCommand::Organize { dry_run } => {
            let config = AppConfig::load(config_path).map_err(|e| format!("Error loading configuration: {e}"))?;
            if dry_run {
                organize_directory_dry_run(dir_path, &config).map(|_| ())
            } else {
                organize_directory(dir_path, &config).map(|_| ())
            }
        }
        OrganizeCommand::Undo => undo_organization(dir_path).map(|_| ()),
    }
}

/// Organizes every file under `base_path` and saves the undo history there.
pub fn organize_directory(base_path: &Path, config: &AppConfig) -> Result<OrganizeReport, String> {
    OutputFormatter::info(&format!("Organizing contents of: {}", base_path.display()));
    let files = scan(base_path, config)?;
    if files.is_empty() {
        OutputFormatter::plain("No files found to organize.");
    }

    let executor = executor_for(config);
    let engine = config.rule_engine();
    let pb = OutputFormatter::create_progress_bar(files.len() as u64);
    let report = executor.run_with_progress(&files, base_path, &engine, &config.settings, false, |path| {
        pb.inc(1);
        if let Some(name) = path.file_name() {
            pb.set_message(name.to_string_lossy().into_owned());
        }
    });
    pb.finish_and_clear();

    print_errors(&report.errors);

    if report.log.is_empty() {
        OutputFormatter::plain("Nothing was changed.");
        return Ok(report);
    }

    // A previous history is replaced; only the latest run is undoable.
    match report.log.save(base_path) {
        Ok(()) => {
            OutputFormatter::success(&format!(
                "Organized {} {}. Run 'tidywatch undo {}' to revert.",
                report.files_moved,
                if report.files_moved == 1 { "file" } else { "files" },
                base_path.display()
            ));
        }
        Err(e) => {
            OutputFormatter::warning(&format!("Could not save history: {e}"));
            if !report.errors.is_empty() {
                OutputFormatter::warning("Undo may not be available. Please verify the results by hand.");
            }
        }
    }
    if !report.errors.is_empty() {
        OutputFormatter::warning("Some files could not be organized. See the errors above.");
    }
    Ok(report)
}

/// Classifies every file under `base_path` and prints where it would go.
pub fn organize_directory_dry_run(base_path: &Path, config: &AppConfig) -> Result<OrganizeReport, String> {
    OutputFormatter::dry_run_notice(&format!("Analyzing contents of: {}", base_path.display()));
    let files = scan(base_path, config)?;
    let report = executor_for(config).run(&files, base_path, &config.rule_engine(), &config.settings, true);

    if report.planned().next().is_none() {
        OutputFormatter::plain("Nothing to organize.");
        print_errors(&report.errors);
        return Ok(report);
    }

    OutputFormatter::header("Files would be organized as follows:");
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for result in report.planned() {
        let destination = destination_label(result, base_path);
        OutputFormatter::plain(&format!(
            " - {}\n   → {}",
            relative(&result.source_path, base_path),
            describe(result, base_path)
        ));
        *counts.entry(destination).or_insert(0) += 1;
    }
    OutputFormatter::summary_table(&counts, report.files_moved);
    print_errors(&report.errors);

    OutputFormatter::success("Dry run complete. No files were modified.");
    Ok(report)
}

/// Replays the history saved by the last `organize` in `base_path`.
pub fn undo_organization(base_path: &Path) -> Result<UndoReport, String> {
    OutputFormatter::info("Undoing previous organization...");
    let report = UndoManager::new().undo(base_path).map_err(|e| format!("Error: {e}"))?;

    OutputFormatter::success(&format!("Restored: {}", report.restored));
    if !report.removed_dirs.is_empty() {
        OutputFormatter::plain(&format!("Removed empty folders: {}", report.removed_dirs.len()));
    }
    for (path, reason) in &report.warnings {
        OutputFormatter::warning(&format!("{}: {}", path.display(), reason));
    }
    if !report.errors.is_empty() {
        print_errors(&report.errors);
        OutputFormatter::warning("History file was NOT deleted due to failures. Fix the issues and try again.");
    }
    Ok(report)
}

/// Watches `dirs` (or the configured folders when empty) until Ctrl-C.
pub async fn run_watch(dirs: &[PathBuf], auto_organize: bool, config_path: Option<&Path>) -> Result<(), String> {
    let config = AppConfig::load(config_path).map_err(|e| format!("Error loading configuration: {e}"))?;

    let folders: Vec<WatchedFolder> = if dirs.is_empty() {
        config.folders.iter().filter(|f| f.is_enabled).cloned().collect()
    } else {
        dirs.iter()
            .map(|dir| {
                let path = fs::canonicalize(dir).map_err(|e| format!("Cannot watch {}: {e}", dir.display()))?;
                Ok(WatchedFolder::new(path).with_auto_organize(auto_organize))
            })
            .collect::<Result<Vec<_>, String>>()?
    };
    if folders.is_empty() {
        return Err("No folders to watch. Pass directories or configure [[folders]].".to_string());
    }

    let (manager, mut events) = FolderWatchManager::new(&config, config.settings.trash_service())
        .map_err(|e| format!("Error compiling configuration: {e}"))?;

    let paths: HashMap<String, PathBuf> = folders
        .iter()
        .map(|f| (f.id.clone(), f.folder_path.clone()))
        .collect();
    let mut watching = 0;
    for folder in folders {
        let path = folder.folder_path.clone();
        match manager.start_watching(folder).await {
            Ok(()) => watching += 1,
            Err(e) => OutputFormatter::error(&format!("{}: {e}", path.display())),
        }
    }
    if watching == 0 {
        return Err("None of the folders could be watched.".to_string());
    }
    OutputFormatter::info(&format!("Watching {watching} folder(s). Press Ctrl-C to stop."));

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    let path = paths.get(event.folder_id()).map(PathBuf::as_path);
                    OutputFormatter::folder_event(&event, path);
                }
                None => break,
            },
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "cannot listen for Ctrl-C");
                }
                break;
            }
        }
    }

    manager.shutdown().await;
    OutputFormatter::plain("Stopped watching.");
    Ok(())
}

fn scan(base_path: &Path, config: &AppConfig) -> Result<Vec<PathBuf>, String> {
    if !base_path.is_dir() {
        return Err(format!("Not a directory: {}", base_path.display()));
    }
    let filters = config
        .compile_filters()
        .map_err(|e| format!("Error compiling filters: {e}"))?;
    let (files, errors) = collect_files(base_path, &filters);
    debug!(files = files.len(), base = %base_path.display(), "scanned directory");
    print_errors(&errors);
    Ok(files)
}

fn executor_for(config: &AppConfig) -> OrganizationExecutor {
    OrganizationExecutor::new(
        config.settings.trash_service(),
        Arc::new(RecentlyOrganized::default()),
    )
}

fn print_errors(errors: &[(PathBuf, String)]) {
    for (path, message) in errors {
        OutputFormatter::error(&format!("{}: {}", path.display(), message));
    }
}

fn relative(path: &Path, base_path: &Path) -> String {
    path.strip_prefix(base_path).unwrap_or(path).display().to_string()
}

/// Summary key: the destination directory, or "Trash".
fn destination_label(result: &FileOrganizeResult, base_path: &Path) -> String {
    if result.is_delete() {
        return "Trash".to_string();
    }
    match result.destination_path.as_deref().and_then(Path::parent) {
        Some(dir) if dir == base_path => ".".to_string(),
        Some(dir) => format!("{}/", relative(dir, base_path)),
        None => "?".to_string(),
    }
}

fn describe(result: &FileOrganizeResult, base_path: &Path) -> String {
    if result.is_delete() {
        return "trash".to_string();
    }
    let mut line = result
        .destinations()
        .iter()
        .map(|d| relative(d, base_path))
        .collect::<Vec<_>>()
        .join(", ");
    if let Some(name) = &result.matched_rule_name {
        line.push_str(&format!("  (rule: {name})"));
    } else if let Some(category) = &result.category {
        line.push_str(&format!("  (category: {category})"));
    }
    line
}
