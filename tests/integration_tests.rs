//! End-to-end tests for the one-shot `organize` / `undo` workflow.
//!
//! Each test builds a throwaway directory, organizes it through the CLI
//! handlers and checks what ended up on disk.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{Local, TimeZone};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tidywatch::cli::{
    OrganizeCommand, organize_directory, organize_directory_dry_run, run_cli, undo_organization,
};
use tidywatch::{
    AppConfig, Attribute, Condition, ConditionGroup, OperationKind, OperationLog, Operator, Rule,
    RuleAction,
};

// ============================================================================
// Test Utilities
// ============================================================================

struct TestFixture {
    temp_dir: TempDir,
    trash_dir: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        TestFixture {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
            trash_dir: TempDir::new().expect("Failed to create trash directory"),
        }
    }

    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Config with a private trash and the given rules.
    fn config(&self, rules: Vec<Rule>) -> AppConfig {
        let mut config = AppConfig::default();
        config.settings.trash_dir = Some(self.trash_dir.path().to_path_buf());
        config.rules = rules;
        config
    }

    fn create_file(&self, rel_path: &str, content: &str) -> PathBuf {
        let path = self.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    fn set_modified(&self, rel_path: &str, year: i32, month: u32, day: u32) {
        let when = Local
            .with_ymd_and_hms(year, month, day, 12, 0, 0)
            .single()
            .expect("valid date");
        File::options()
            .write(true)
            .open(self.path().join(rel_path))
            .expect("open")
            .set_modified(SystemTime::from(when))
            .expect("set mtime");
    }

    fn assert_file_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    fn assert_file_not_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(!path.exists(), "File should not exist: {}", path.display());
    }

    fn entries(&self, rel_dir: &str) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.path().join(rel_dir))
            .expect("read_dir")
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn history_exists(&self) -> bool {
        OperationLog::history_file_path(self.path()).exists()
    }
}

fn extension_is(ext: &str) -> ConditionGroup {
    ConditionGroup::all(vec![Condition::new(Attribute::Extension, Operator::Is, ext)])
}

// ============================================================================
// Rule scenarios
// ============================================================================

#[test]
fn test_pdf_rule_moves_and_rerun_is_noop() {
    let fixture = TestFixture::new();
    fixture.create_file("report.pdf", "%PDF-1.4");
    let config = fixture.config(vec![
        Rule::new("PDFs", 0)
            .with_conditions(extension_is("pdf"))
            .with_action(RuleAction::move_to("PDFs")),
    ]);

    let report = organize_directory(fixture.path(), &config).expect("organize");
    assert_eq!(report.files_moved, 1);
    assert_eq!(
        report.results[0].destination_path,
        Some(fixture.path().join("PDFs").join("report.pdf"))
    );
    fixture.assert_file_exists("PDFs/report.pdf");
    fixture.assert_file_not_exists("report.pdf");

    let again = organize_directory(fixture.path(), &config).expect("organize again");
    assert_eq!(again.files_moved, 0);
    assert!(again.log.is_empty());
    fixture.assert_file_exists("PDFs/report.pdf");
    fixture.assert_file_not_exists("PDFs/report (1).pdf");
}

#[test]
fn test_continue_chain_sorts_then_copies() {
    let fixture = TestFixture::new();
    fixture.create_file("photo.jpg", "jpeg bytes");
    fixture.set_modified("photo.jpg", 2024, 6, 15);
    let config = fixture.config(vec![
        Rule::new("By year", 0)
            .with_conditions(extension_is("jpg"))
            .with_action(RuleAction::sort_into("{Year}"))
            .with_action(RuleAction::continue_matching()),
        Rule::new("Backup", 1)
            .with_conditions(extension_is("jpg"))
            .with_action(RuleAction::copy_to("Backup")),
    ]);

    let report = organize_directory(fixture.path(), &config).expect("organize");
    let result = &report.results[0];
    assert_eq!(
        result.destination_path,
        Some(fixture.path().join("2024").join("photo.jpg"))
    );
    assert_eq!(
        result.additional_destinations,
        vec![fixture.path().join("Backup").join("photo.jpg")]
    );

    let kinds: Vec<_> = report.log.operations.iter().map(|op| op.action_type).collect();
    assert_eq!(kinds, vec![OperationKind::Move, OperationKind::Copy]);
    fixture.assert_file_exists("2024/photo.jpg");
    fixture.assert_file_exists("Backup/photo.jpg");
    fixture.assert_file_not_exists("photo.jpg");
}

#[test]
fn test_delete_is_recorded_and_undo_only_warns() {
    let fixture = TestFixture::new();
    fixture.create_file("old.log", "stale");
    let config = fixture.config(vec![
        Rule::new("Drop logs", 0)
            .with_conditions(extension_is("log"))
            .with_action(RuleAction::delete()),
    ]);

    let report = organize_directory(fixture.path(), &config).expect("organize");
    assert_eq!(report.log.operations.len(), 1);
    let op = &report.log.operations[0];
    assert_eq!(op.original_path, fixture.path().join("old.log"));
    assert_eq!(op.new_path, PathBuf::from("[trash]"));
    assert_eq!(op.action_type, OperationKind::Delete);
    fixture.assert_file_not_exists("old.log");
    assert!(fixture.trash_dir.path().join("old.log").exists());

    let undo = undo_organization(fixture.path()).expect("undo");
    assert_eq!(undo.restored, 0);
    assert_eq!(undo.warnings.len(), 1);
    assert!(undo.warnings[0].1.contains("cannot restore"));
    assert!(undo.errors.is_empty());
    fixture.assert_file_not_exists("old.log");
}

#[test]
fn test_case_only_rename() {
    let fixture = TestFixture::new();
    fixture.create_file("report.PDF", "%PDF-1.4");
    let config = fixture.config(vec![
        Rule::new("Lowercase", 0)
            .with_conditions(extension_is("pdf"))
            .with_action(RuleAction::rename("{Name}.pdf")),
    ]);

    let report = organize_directory(fixture.path(), &config).expect("organize");
    assert_eq!(report.files_moved, 1);
    assert_eq!(report.log.operations[0].action_type, OperationKind::Rename);

    let names = fixture.entries(".");
    assert!(names.contains(&"report.pdf".to_string()), "got {names:?}");
    assert!(!names.contains(&"report.PDF".to_string()), "got {names:?}");
}

#[test]
fn test_collision_gets_numbered_name() {
    let fixture = TestFixture::new();
    fixture.create_file("PDFs/report.pdf", "already here");
    fixture.create_file("incoming/report.pdf", "new");
    let config = fixture.config(vec![
        Rule::new("PDFs", 0)
            .with_conditions(extension_is("pdf"))
            .with_action(RuleAction::move_to("PDFs")),
    ]);

    organize_directory(fixture.path(), &config).expect("organize");
    assert_eq!(
        fs::read_to_string(fixture.path().join("PDFs/report.pdf")).expect("read"),
        "already here"
    );
    assert_eq!(
        fs::read_to_string(fixture.path().join("PDFs/report (1).pdf")).expect("read"),
        "new"
    );
}

// ============================================================================
// Category fallback, undo round trip
// ============================================================================

#[test]
fn test_category_fallback_and_undo_round_trip() {
    let fixture = TestFixture::new();
    fixture.create_file("notes.txt", "notes");
    fixture.create_file("image.png", "not really a png");
    fixture.create_file("nested/deep/song.mp3", "la la");
    let config = fixture.config(Vec::new());

    let report = organize_directory(fixture.path(), &config).expect("organize");
    assert_eq!(report.files_moved, 3);
    fixture.assert_file_exists("Documents/notes.txt");
    fixture.assert_file_exists("Images/image.png");
    fixture.assert_file_exists("Music/song.mp3");
    assert!(fixture.history_exists());

    let undo = undo_organization(fixture.path()).expect("undo");
    assert_eq!(undo.restored, 3);
    assert!(undo.is_complete_success());
    fixture.assert_file_exists("notes.txt");
    fixture.assert_file_exists("image.png");
    fixture.assert_file_exists("nested/deep/song.mp3");
    assert!(!fixture.history_exists());
}

#[test]
fn test_sort_folders_removed_on_undo_when_empty() {
    let fixture = TestFixture::new();
    fixture.create_file("photo.jpg", "jpeg bytes");
    fixture.set_modified("photo.jpg", 2023, 1, 2);
    let config = fixture.config(vec![
        Rule::new("By month", 0)
            .with_conditions(extension_is("jpg"))
            .with_action(RuleAction::sort_into("Photos/{Year}/{Month}")),
    ]);

    organize_directory(fixture.path(), &config).expect("organize");
    fixture.assert_file_exists("Photos/2023/01/photo.jpg");

    let undo = undo_organization(fixture.path()).expect("undo");
    assert!(undo.is_complete_success());
    fixture.assert_file_exists("photo.jpg");
    assert!(!fixture.path().join("Photos").exists());
}

#[test]
fn test_undo_backs_up_conflicting_file() {
    let fixture = TestFixture::new();
    fixture.create_file("notes.txt", "original");
    let config = fixture.config(Vec::new());

    organize_directory(fixture.path(), &config).expect("organize");
    fixture.create_file("notes.txt", "newcomer");

    let undo = undo_organization(fixture.path()).expect("undo");
    assert_eq!(undo.restored, 1);
    assert_eq!(
        fs::read_to_string(fixture.path().join("notes.txt")).expect("read"),
        "original"
    );
    let backups: Vec<_> = fixture
        .entries(".")
        .into_iter()
        .filter(|name| name.starts_with("notes.txt.bak."))
        .collect();
    assert_eq!(backups.len(), 1);
}

#[test]
fn test_undo_without_history_fails() {
    let fixture = TestFixture::new();
    assert!(undo_organization(fixture.path()).is_err());
}

// ============================================================================
// Dry run, filters, configuration
// ============================================================================

#[test]
fn test_dry_run_touches_nothing() {
    let fixture = TestFixture::new();
    fixture.create_file("notes.txt", "notes");
    fixture.create_file("archive.zip", "PK");
    let config = fixture.config(Vec::new());

    let report = organize_directory_dry_run(fixture.path(), &config).expect("dry run");
    assert!(report.preview);
    assert_eq!(report.planned().count(), 2);
    assert!(report.log.is_empty());
    fixture.assert_file_exists("notes.txt");
    fixture.assert_file_exists("archive.zip");
    assert!(!fixture.history_exists());
}

#[test]
fn test_filters_leave_excluded_files_alone() {
    let fixture = TestFixture::new();
    fixture.create_file("movie.mp4.part", "partial");
    fixture.create_file(".secret.txt", "hidden");
    fixture.create_file("keep/Thumbs.db", "thumbs");
    fixture.create_file("notes.txt", "notes");
    let mut config = fixture.config(Vec::new());
    config.filters.exclude.extensions = vec!["part".to_string()];
    config.filters.exclude.filenames = vec!["Thumbs.db".to_string()];

    let report = organize_directory(fixture.path(), &config).expect("organize");
    assert_eq!(report.files_moved, 1);
    fixture.assert_file_exists("movie.mp4.part");
    fixture.assert_file_exists(".secret.txt");
    fixture.assert_file_exists("keep/Thumbs.db");
    fixture.assert_file_exists("Documents/notes.txt");
}

#[test]
fn test_run_cli_reads_toml_config() {
    let fixture = TestFixture::new();
    let config_dir = TempDir::new().expect("Failed to create config directory");
    fixture.create_file("invoice.pdf", "%PDF");
    let config = fixture.config(vec![
        Rule::new("Invoices", 0)
            .with_conditions(ConditionGroup::all(vec![Condition::new(
                Attribute::Name,
                Operator::StartsWith,
                "invoice",
            )]))
            .with_action(RuleAction::move_to("Finance/Invoices")),
    ]);
    let config_path = config_dir.path().join("tidywatch.toml");
    fs::write(&config_path, config.to_toml().expect("serialize")).expect("write config");

    run_cli(
        OrganizeCommand::Organize { dry_run: false },
        fixture.path(),
        Some(&config_path),
    )
    .expect("organize");
    fixture.assert_file_exists("Finance/Invoices/invoice.pdf");

    run_cli(OrganizeCommand::Undo, fixture.path(), None).expect("undo");
    fixture.assert_file_exists("invoice.pdf");
}

#[test]
fn test_run_cli_rejects_missing_directory() {
    let fixture = TestFixture::new();
    let missing = fixture.path().join("nope");
    let config_path = fixture.path().join("missing.toml");
    assert!(run_cli(OrganizeCommand::Organize { dry_run: true }, &missing, Some(&config_path)).is_err());

    let config = fixture.config(Vec::new());
    assert!(organize_directory(&missing, &config).is_err());
}
