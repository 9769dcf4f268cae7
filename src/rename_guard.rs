//! Holds back freshly created files that are probably about to be renamed.
//!
//! Explorer-style "New Text Document.txt" files, and anything very young or
//! very small, sit in a pending table until either a rename for that path
//! arrives or the timeout expires.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::metadata::split_name;

/// Template names the desktop gives new files, in a few languages.
const TEMPLATE_NAMES: &[&str] = &[
    "new text document",
    "new document",
    "new file",
    "new microsoft word document",
    "new microsoft excel worksheet",
    "new microsoft powerpoint presentation",
    "new rich text document",
    "new bitmap image",
    "new compressed (zipped) folder",
    "untitled",
    "untitled document",
    "neues textdokument",
    "neues dokument",
    "neues microsoft word-dokument",
    "neues microsoft excel-arbeitsblatt",
    "neue bitmap",
    "nouveau document texte",
    "nouveau document",
    "nouveau document microsoft word",
    "nouvelle feuille de calcul microsoft excel",
    "nuevo documento de texto",
    "nuevo documento de microsoft word",
    "nueva hoja de cálculo de microsoft excel",
    "nuovo documento di testo",
    "nuovo documento di microsoft word",
    "novo documento de texto",
    "novo documento do microsoft word",
    "nieuw tekstdocument",
    "nytt textdokument",
];

/// Matches `" (2)"` and `" 2"` numbering after a template name.
static NUMBERING: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(.*?)(?: \(\d+\)| \d+)$").ok());

/// Thresholds for deciding a file is still being named.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenameHeuristics {
    pub fresh_age_ms: u64,
    pub empty_age_ms: u64,
    pub small_age_ms: u64,
    pub small_size: u64,
}

impl Default for RenameHeuristics {
    fn default() -> Self {
        Self {
            fresh_age_ms: 2_000,
            empty_age_ms: 10_000,
            small_age_ms: 5_000,
            small_size: 1024,
        }
    }
}

impl RenameHeuristics {
    /// Decides from already-known attributes.
    pub fn should_hold(&self, file_name: &str, size: u64, age: Duration) -> bool {
        let age_ms = age.as_millis();
        age_ms < u128::from(self.fresh_age_ms)
            || (size == 0 && age_ms < u128::from(self.empty_age_ms))
            || (size < self.small_size && age_ms < u128::from(self.small_age_ms))
            || is_template_name(file_name)
    }

    /// Reads the file's size and age and decides. Unreadable files are not held.
    pub fn inspect(&self, path: &Path) -> bool {
        let Ok(meta) = fs::metadata(path) else {
            return false;
        };
        if !meta.is_file() {
            return false;
        }
        let born = meta.created().or_else(|_| meta.modified());
        let age = born
            .ok()
            .and_then(|t| SystemTime::now().duration_since(t).ok())
            .unwrap_or_default();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.should_hold(&name, meta.len(), age)
    }
}

/// True for "New Text Document.txt", "Untitled (3).docx" and friends.
pub fn is_template_name(file_name: &str) -> bool {
    let (stem, _) = split_name(file_name);
    let stem = stem.trim().to_lowercase();
    let base = NUMBERING
        .as_ref()
        .and_then(|re| re.captures(&stem))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| stem.clone());
    TEMPLATE_NAMES.contains(&stem.as_str()) || TEMPLATE_NAMES.contains(&base.as_str())
}

/// Files waiting for a rename, each tagged with the token of its timeout.
#[derive(Debug, Default)]
pub struct PendingRenames {
    entries: Mutex<HashMap<PathBuf, u64>>,
    next_token: AtomicU64,
}

impl PendingRenames {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PathBuf, u64>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts holding `path`. Returns the token the timeout must present.
    pub fn hold(&self, path: &Path) -> u64 {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        self.entries().insert(path.to_path_buf(), token);
        token
    }

    /// A rename arrived for `path`. Returns true if it was being held.
    pub fn release(&self, path: &Path) -> bool {
        self.entries().remove(path).is_some()
    }

    /// The timeout for `token` fired. Returns true if it still owned the entry.
    pub fn expire(&self, path: &Path, token: u64) -> bool {
        let mut entries = self.entries();
        if entries.get(path) == Some(&token) {
            entries.remove(path);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries().contains_key(path)
    }

    pub fn clear(&self) {
        self.entries().clear();
    }
}
