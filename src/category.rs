//! Extension based categories and the resolver that picks one for a file.
//!
//! Precedence is custom categories first, then the built-in defaults, then
//! the single fallback category that catches every other extension.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::file_kind::{FileKind, KIND_EXTENSIONS};

/// An extension based category with a destination folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub color: String,
    /// Lowercase extensions without the leading dot.
    #[serde(default)]
    pub extensions: BTreeSet<String>,
    /// Destination folder. Relative paths resolve against the organized folder.
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    #[serde(default)]
    pub is_fallback: bool,
}

fn default_true() -> bool {
    true
}

impl Category {
    /// Creates an enabled custom category.
    pub fn new(name: impl Into<String>, extensions: &[&str]) -> Self {
        let name = name.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            destination: name.clone(),
            name,
            icon: String::new(),
            color: String::new(),
            extensions: extensions.iter().map(|e| normalize_extension(e)).collect(),
            is_default: false,
            is_enabled: true,
            is_fallback: false,
        }
    }

    /// Sets the destination folder.
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    /// Returns true if this category lists the extension.
    pub fn covers(&self, extension: &str) -> bool {
        self.extensions.contains(&normalize_extension(extension))
    }

    /// Resolves the destination directory for a file organized under `base_path`.
    pub fn destination_dir(&self, base_path: &Path) -> PathBuf {
        let dest = self.destination.trim();
        if dest.is_empty() {
            return base_path.join(&self.name);
        }
        let dest = Path::new(dest);
        if dest.is_absolute() {
            dest.to_path_buf()
        } else {
            base_path.join(dest)
        }
    }

    /// The built-in category set: one default per file kind plus the fallback.
    pub fn defaults() -> Vec<Category> {
        let mut categories: Vec<Category> = KIND_EXTENSIONS
            .iter()
            .map(|(kind, extensions)| {
                let name = default_category_name(*kind);
                Category {
                    id: format!("default-{}", name.to_lowercase()),
                    name: name.to_string(),
                    icon: String::new(),
                    color: String::new(),
                    extensions: extensions.iter().map(|e| e.to_string()).collect(),
                    destination: name.to_string(),
                    is_default: true,
                    is_enabled: true,
                    is_fallback: false,
                }
            })
            .collect();

        categories.push(Category {
            id: "default-other".to_string(),
            name: "Other".to_string(),
            icon: String::new(),
            color: String::new(),
            extensions: BTreeSet::new(),
            destination: "Other".to_string(),
            is_default: true,
            is_enabled: true,
            is_fallback: true,
        });
        categories
    }
}

fn default_category_name(kind: FileKind) -> &'static str {
    match kind {
        FileKind::Image => "Images",
        FileKind::Audio => "Music",
        FileKind::Video => "Videos",
        FileKind::Document => "Documents",
        FileKind::Archive => "Archives",
        FileKind::Code => "Code",
        FileKind::Spreadsheet => "Spreadsheets",
        FileKind::Presentation => "Presentations",
        FileKind::Font => "Fonts",
        FileKind::Other => "Other",
    }
}

/// Lowercases an extension and strips any leading dot.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Picks the category for an extension.
#[derive(Debug, Clone)]
pub struct CategoryResolver {
    categories: Vec<Category>,
}

impl CategoryResolver {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Resolves the category for an extension.
    ///
    /// Returns `None` only when nothing matches and no enabled fallback exists.
    pub fn resolve(&self, extension: &str) -> Option<&Category> {
        let enabled = || self.categories.iter().filter(|c| c.is_enabled);

        enabled()
            .find(|c| !c.is_default && !c.is_fallback && c.covers(extension))
            .or_else(|| enabled().find(|c| c.is_default && !c.is_fallback && c.covers(extension)))
            .or_else(|| enabled().find(|c| c.is_fallback))
    }

    /// Looks a category up by name, case-insensitively.
    pub fn by_name(&self, name: &str) -> Option<&Category> {
        self.categories
            .iter()
            .find(|c| c.is_enabled && c.name.eq_ignore_ascii_case(name.trim()))
    }
}

impl Default for CategoryResolver {
    fn default() -> Self {
        Self::new(Category::defaults())
    }
}
