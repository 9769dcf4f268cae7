//! Watched folders and their status state machine.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{WatchError, WatchResult};

/// Lifecycle state of a watched folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FolderStatus {
    #[default]
    Idle,
    Watching,
    Organizing,
    Error,
}

impl FolderStatus {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: FolderStatus) -> bool {
        use FolderStatus::*;
        match (self, next) {
            (a, b) if a == b => false,
            (_, Error) => true,
            (Idle, Watching) | (Idle, Organizing) => true,
            (Watching, Organizing) | (Watching, Idle) => true,
            (Organizing, Watching) | (Organizing, Idle) => true,
            (Error, Idle) => true,
            _ => false,
        }
    }
}

impl fmt::Display for FolderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FolderStatus::Idle => "idle",
            FolderStatus::Watching => "watching",
            FolderStatus::Organizing => "organizing",
            FolderStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// A folder registered with the watch manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedFolder {
    pub id: String,
    pub folder_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<String>,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    #[serde(default)]
    pub auto_organize: bool,
    #[serde(default)]
    pub status: FolderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_organized_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub file_count: usize,
}

fn default_true() -> bool {
    true
}

impl WatchedFolder {
    pub fn new(folder_path: impl Into<PathBuf>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            folder_path: folder_path.into(),
            profile_id: None,
            is_enabled: true,
            auto_organize: false,
            status: FolderStatus::Idle,
            last_error: None,
            last_organized_at: None,
            file_count: 0,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_auto_organize(mut self, auto_organize: bool) -> Self {
        self.auto_organize = auto_organize;
        self
    }

    pub fn with_profile(mut self, profile_id: impl Into<String>) -> Self {
        self.profile_id = Some(profile_id.into());
        self
    }

    /// Clears state that cannot survive a restart.
    pub fn reset_transient(&mut self) {
        if self.status == FolderStatus::Organizing {
            self.status = FolderStatus::Idle;
        }
    }

    /// Checks that the folder path is usable for watching or organizing.
    pub fn validate(&self) -> WatchResult<()> {
        validate_folder_path(&self.folder_path)
    }
}

/// Absolute, existing, a directory, and listable.
pub fn validate_folder_path(path: &Path) -> WatchResult<()> {
    if !path.is_absolute() {
        return Err(WatchError::NotAbsolute(path.to_path_buf()));
    }
    if !path.exists() {
        return Err(WatchError::DirectoryNotFound(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(WatchError::NotADirectory(path.to_path_buf()));
    }
    fs::read_dir(path).map_err(|source| WatchError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}
