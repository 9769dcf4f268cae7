//! Terminal output for the command-line front end.
//!
//! Everything the CLI prints goes through [`OutputFormatter`] so styling stays
//! consistent. Diagnostics go through `tracing` instead.

use std::collections::BTreeMap;
use std::path::Path;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::event::FolderEvent;

pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// ```no_run
    /// use tidywatch::output::OutputFormatter;
    /// OutputFormatter::success("Folder organized");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Progress bar for per-file work. Falls back to the default style if the
    /// template is rejected.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb
    }

    /// Prints file counts per destination, sorted by destination.
    pub fn summary_table(counts: &BTreeMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let width = counts
            .keys()
            .map(|name| name.chars().count())
            .max()
            .unwrap_or(0)
            .max("Destination".len());

        println!("{:<width$} | {}", "Destination".bold(), "Files".bold());
        println!("{}", "-".repeat(width + 10));
        for (destination, count) in counts {
            println!(
                "{:<width$} | {} {}",
                destination,
                count.to_string().green(),
                plural(*count)
            );
        }
        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural(total_files)
        );
    }

    /// One line per folder event, as printed by `tidywatch watch`.
    pub fn folder_event(event: &FolderEvent, folder_path: Option<&Path>) {
        let folder = folder_path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| event.folder_id().to_string());

        match event {
            FolderEvent::StatusChanged {
                old_status,
                new_status,
                error,
                ..
            } => match error {
                Some(error) => Self::error(&format!("{folder}: {old_status} → {new_status} ({error})")),
                None => Self::info(&format!("{folder}: {old_status} → {new_status}")),
            },
            FolderEvent::OrganizationCompleted {
                files_moved,
                files_skipped,
                errors,
                ..
            } => {
                Self::success(&format!(
                    "{folder}: organized {files_moved} {}, skipped {files_skipped}",
                    plural(*files_moved)
                ));
                for (path, message) in errors {
                    Self::error(&format!("  {}: {}", path.display(), message));
                }
            }
            FolderEvent::FolderChanged {
                change_kind,
                affected_paths,
                ..
            } => {
                Self::plain(&format!(
                    "{folder}: {} {:?}",
                    affected_paths.len(),
                    change_kind
                ));
            }
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}
