//! Point-in-time snapshot of the file attributes rules are evaluated against.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::file_kind::{FileKind, KindMapper};

/// File attributes captured once per evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetadata {
    /// Full path to the file.
    pub path: PathBuf,
    /// File name without extension.
    pub name: String,
    /// Extension without the leading dot, as written on disk.
    pub extension: String,
    /// File name including extension.
    pub full_name: String,
    pub kind: FileKind,
    pub size: u64,
    pub created: Option<DateTime<Local>>,
    pub modified: Option<DateTime<Local>>,
    pub accessed: Option<DateTime<Local>>,
}

impl FileMetadata {
    /// Reads metadata from disk.
    pub fn from_path(path: &Path, kinds: &KindMapper) -> std::io::Result<Self> {
        let meta = fs::metadata(path)?;
        let mut snapshot = Self::from_parts(path, meta.len(), kinds.detect(path));
        snapshot.created = meta.created().ok().map(DateTime::<Local>::from);
        snapshot.modified = meta.modified().ok().map(DateTime::<Local>::from);
        snapshot.accessed = meta.accessed().ok().map(DateTime::<Local>::from);
        Ok(snapshot)
    }

    /// Builds a snapshot without touching the filesystem. Timestamps are unset.
    pub fn from_parts(path: &Path, size: u64, kind: FileKind) -> Self {
        let full_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (name, extension) = split_name(&full_name);

        Self {
            path: path.to_path_buf(),
            name,
            extension,
            full_name,
            kind,
            size,
            created: None,
            modified: None,
            accessed: None,
        }
    }

    pub fn with_modified(mut self, modified: DateTime<Local>) -> Self {
        self.modified = Some(modified);
        self
    }

    pub fn with_created(mut self, created: DateTime<Local>) -> Self {
        self.created = Some(created);
        self
    }

    pub fn with_accessed(mut self, accessed: DateTime<Local>) -> Self {
        self.accessed = Some(accessed);
        self
    }

    /// Name of the directory containing the file.
    pub fn folder(&self) -> String {
        self.path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Full path of the directory containing the file.
    pub fn folder_path(&self) -> String {
        self.path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Modified time, falling back to created time.
    pub fn modified_or_created(&self) -> Option<DateTime<Local>> {
        self.modified.or(self.created)
    }

    /// Created time, falling back to modified time.
    pub fn created_or_modified(&self) -> Option<DateTime<Local>> {
        self.created.or(self.modified)
    }
}

/// Splits a file name into stem and extension.
///
/// Dotfiles such as `.bashrc` have no extension.
pub fn split_name(full_name: &str) -> (String, String) {
    match full_name.rfind('.') {
        Some(idx) if idx > 0 => (
            full_name[..idx].to_string(),
            full_name[idx + 1..].to_string(),
        ),
        _ => (full_name.to_string(), String::new()),
    }
}
