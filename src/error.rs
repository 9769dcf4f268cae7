//! Error types shared across the organizer, the executor and the watch manager.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for file organization operations.
pub type OrganizeResult<T> = std::result::Result<T, OrganizeError>;

/// Result type for watch manager commands.
pub type WatchResult<T> = std::result::Result<T, WatchError>;

/// Errors that can occur while organizing a single file or replaying undo.
#[derive(Error, Debug)]
pub enum OrganizeError {
    /// Failed to create a destination directory.
    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to move or rename a file.
    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    /// Failed to copy a file.
    #[error("failed to copy {} to {}: {source}", from.display(), to.display())]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    /// The trash service refused the file.
    #[error("failed to send {} to trash: {reason}", path.display())]
    TrashFailed { path: PathBuf, reason: String },

    /// Failed to permanently remove a file.
    #[error("failed to delete {}: {source}", path.display())]
    DeleteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file disappeared before it could be organized.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A path has no usable file name component.
    #[error("path has no file name: {}", .0.display())]
    InvalidFileName(PathBuf),

    /// The base directory path is invalid or doesn't exist.
    #[error("invalid base path {}: {source}", path.display())]
    InvalidBasePath {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write the history file.
    #[error("failed to write history file: {0}")]
    HistoryWriteFailed(#[source] std::io::Error),

    /// Failed to read the history file.
    #[error("failed to read history file: {0}")]
    HistoryReadFailed(#[source] std::io::Error),

    /// History file has invalid format.
    #[error("invalid history file format: {0}")]
    InvalidHistoryFormat(String),

    /// There is nothing recorded to undo.
    #[error("no previous organization found to undo")]
    NothingToUndo,
}

/// Errors returned by the folder watch manager.
#[derive(Error, Debug)]
pub enum WatchError {
    /// Watched folder paths must be absolute.
    #[error("folder path is not absolute: {}", .0.display())]
    NotAbsolute(PathBuf),

    /// Folder does not exist.
    #[error("directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// Path exists but is not a directory.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Folder exists but cannot be listed.
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No folder with this id is known to the manager.
    #[error("unknown folder: {0}")]
    UnknownFolder(String),

    /// A subscription already exists for this folder.
    #[error("watcher already running for: {0}")]
    AlreadyWatching(String),

    /// An organize or undo run is already in flight for this folder.
    #[error("folder is already being organized: {0}")]
    AlreadyOrganizing(String),

    /// Notify error.
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// Organizer failure surfaced to a command.
    #[error(transparent)]
    Organize(#[from] OrganizeError),

    /// A background task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for WatchError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

/// Errors that can occur during configuration loading and filtering.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// Invalid TOML syntax or structure.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Invalid glob pattern provided.
    #[error("invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),

    /// Invalid regex pattern provided with the actual error reason.
    #[error("invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },

    /// IO error while reading or writing configuration.
    #[error("io error accessing configuration: {0}")]
    IoError(String),
}
