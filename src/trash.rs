//! Trash / recycle bin services used by `Delete` actions.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::naming::unique_path;

/// Sends files to a recoverable location.
pub trait TrashService: Send + Sync + fmt::Debug {
    /// Moves `path` into the trash.
    fn send_to_trash(&self, path: &Path) -> Result<(), String>;
}

/// The operating system trash via the `trash` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTrash;

impl TrashService for SystemTrash {
    fn send_to_trash(&self, path: &Path) -> Result<(), String> {
        trash::delete(path).map_err(|e| e.to_string())
    }
}

/// A plain directory acting as the trash.
///
/// Useful on headless systems without a desktop trash, and in tests.
#[derive(Debug, Clone)]
pub struct DirectoryTrash {
    root: PathBuf,
}

impl DirectoryTrash {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TrashService for DirectoryTrash {
    fn send_to_trash(&self, path: &Path) -> Result<(), String> {
        fs::create_dir_all(&self.root).map_err(|e| e.to_string())?;
        let name = path
            .file_name()
            .ok_or_else(|| format!("path has no file name: {}", path.display()))?;
        let target = unique_path(&self.root.join(name), None);
        debug!(from = %path.display(), to = %target.display(), "moving file to trash directory");
        fs::rename(path, &target).map_err(|e| e.to_string())
    }
}
