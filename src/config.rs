//! Application configuration: settings, file filters, rules, categories and
//! watched folders, persisted as TOML.
//!
//! # Configuration File Format
//!
//! ```toml
//! [settings]
//! use_categories_as_fallback = true
//! delete_to_trash = true
//!
//! [settings.timings]
//! debounce_ms = 1000
//!
//! [filters]
//! enable_hidden_files = false
//!
//! [filters.exclude]
//! filenames = [".DS_Store", "Thumbs.db"]
//! patterns = ["*.tmp", "node_modules/**"]
//! extensions = ["part", "crdownload"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//!
//! [[rules]]
//! id = "pdfs"
//! name = "PDFs"
//! priority = 0
//!
//! [[rules.conditions.conditions]]
//! attribute = "Extension"
//! operator = "Is"
//! value = "pdf"
//!
//! [[rules.actions]]
//! type = "MoveToFolder"
//! value = "PDFs"
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::category::{Category, CategoryResolver};
use crate::error::ConfigError;
use crate::executor::HISTORY_FILE_NAME;
use crate::folder::WatchedFolder;
use crate::rename_guard::RenameHeuristics;
use crate::rule::{Rule, normalize_priorities};
use crate::rule_engine::RuleEngine;
use crate::trash::{DirectoryTrash, SystemTrash, TrashService};

/// Config file looked up in the current directory.
pub const LOCAL_CONFIG_FILE: &str = ".tidywatchrc.toml";

/// Everything the core needs, as loaded from the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub settings: Settings,
    pub filters: FilterRules,
    pub rules: Vec<Rule>,
    /// Empty means the built-in defaults.
    pub categories: Vec<Category>,
    pub folders: Vec<WatchedFolder>,
}

impl AppConfig {
    /// Load configuration, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.tidywatchrc.toml` in the current directory
    /// 3. Look for `~/.config/tidywatch/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(home_config) = home_config_path()
            && home_config.exists()
        {
            return Self::load_from_file(&home_config);
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if file does not exist.
    /// Returns `ConfigError::ConfigInvalid` if TOML parsing fails.
    /// Returns `ConfigError::IoError` if file cannot be read.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }
        debug!(path = %path.display(), "loading configuration");
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: AppConfig =
            toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))?;
        config.normalize();
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Resets transient folder state and renumbers rule priorities.
    pub fn normalize(&mut self) {
        for folder in &mut self.folders {
            folder.reset_transient();
        }
        normalize_priorities(&mut self.rules);
    }

    /// Configured categories, or the built-in set when none are configured.
    pub fn category_resolver(&self) -> CategoryResolver {
        if self.categories.is_empty() {
            CategoryResolver::default()
        } else {
            CategoryResolver::new(self.categories.clone())
        }
    }

    pub fn rule_engine(&self) -> RuleEngine {
        RuleEngine::new(self.rules.clone(), self.category_resolver())
            .with_category_fallback(self.settings.use_categories_as_fallback)
    }

    /// Compile the filter section.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.filters)
    }
}

fn home_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("tidywatch")
            .join("config.toml"),
    )
}

/// Global organizer switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Use categories when no rule claims a file.
    pub use_categories_as_fallback: bool,
    /// Send deleted files to the trash instead of removing them.
    pub delete_to_trash: bool,
    /// Use this directory as the trash instead of the system one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trash_dir: Option<PathBuf>,
    pub timings: WatchTimings,
    pub rename_heuristics: RenameHeuristics,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            use_categories_as_fallback: true,
            delete_to_trash: true,
            trash_dir: None,
            timings: WatchTimings::default(),
            rename_heuristics: RenameHeuristics::default(),
        }
    }
}

impl Settings {
    pub fn trash_service(&self) -> Arc<dyn TrashService> {
        match &self.trash_dir {
            Some(dir) => Arc::new(DirectoryTrash::new(dir.clone())),
            None => Arc::new(SystemTrash),
        }
    }
}

/// Timer lengths used by the watch manager, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchTimings {
    pub debounce_ms: u64,
    pub rename_timeout_ms: u64,
    pub recent_window_ms: u64,
    pub recent_purge_ms: u64,
}

impl Default for WatchTimings {
    fn default() -> Self {
        Self {
            debounce_ms: 1_000,
            rename_timeout_ms: 5_000,
            recent_window_ms: 5_000,
            recent_purge_ms: 10_000,
        }
    }
}

impl WatchTimings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn rename_timeout(&self) -> Duration {
        Duration::from_millis(self.rename_timeout_ms)
    }

    pub fn recent_window(&self) -> Duration {
        Duration::from_millis(self.recent_window_ms)
    }

    pub fn recent_purge(&self) -> Duration {
        Duration::from_millis(self.recent_purge_ms)
    }
}

/// Root-level filter rules configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether to include hidden files (starting with "."). Defaults to false.
    #[serde(default)]
    pub enable_hidden_files: bool,

    /// Rules for excluding files.
    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Rules for including files (whitelist, overrides exclude rules).
    #[serde(default)]
    pub include: IncludeRules,
}

/// Rules for excluding files from organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames to exclude (e.g., ".DS_Store", "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns to exclude, matched against the path relative to the folder.
    #[serde(default)]
    pub patterns: Vec<String>,

    /// File extensions to exclude (e.g., "part", "crdownload").
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regex patterns matched against the file name.
    #[serde(default)]
    pub regex: Vec<String>,
}

/// Rules for including files, overriding exclude rules (whitelist).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeRules {
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Filter rules with patterns compiled once up front.
#[derive(Debug, Clone)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
        })
        .collect()
}

impl CompiledFilters {
    /// # Errors
    ///
    /// Returns an error if any glob or regex patterns are invalid.
    pub fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns: compile_globs(&rules.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&rules.include.patterns)?,
        })
    }

    /// Check if a file should be organized.
    ///
    /// Checks are performed in this order, with early termination:
    /// 1. The undo history file is never organized
    /// 2. Include patterns (whitelist) - if matched, always include
    /// 3. Hidden file filter - if hidden and disabled, exclude
    /// 4. Exact filename match - if matched, exclude
    /// 5. File extension match - if matched, exclude
    /// 6. Glob pattern match - if matched, exclude
    /// 7. Regex pattern match - if matched, exclude
    /// 8. Default: include
    pub fn should_include(&self, file_path: &Path) -> bool {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if file_name == HISTORY_FILE_NAME {
            return false;
        }

        if self.include_patterns.iter().any(|p| p.matches_path(file_path)) {
            return true;
        }

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = file_path.extension()
            && self
                .exclude_extensions
                .contains(&ext.to_string_lossy().to_lowercase())
        {
            return false;
        }

        if self.exclude_patterns.iter().any(|p| p.matches_path(file_path)) {
            return false;
        }

        !self.exclude_regexes.iter().any(|re| re.is_match(&file_name))
    }

    /// Like [`should_include`](Self::should_include), with globs seen relative to `base`.
    ///
    /// Files inside hidden directories under `base` are skipped unless hidden
    /// files are enabled.
    pub fn accepts(&self, base: &Path, file_path: &Path) -> bool {
        let relative = file_path.strip_prefix(base).unwrap_or(file_path);
        if !self.enable_hidden_files
            && relative
                .parent()
                .is_some_and(|p| p.iter().any(|c| c.to_string_lossy().starts_with('.')))
        {
            return false;
        }
        self.should_include(relative)
    }
}

impl Default for CompiledFilters {
    fn default() -> Self {
        Self {
            enable_hidden_files: false,
            exclude_filenames: HashSet::new(),
            exclude_extensions: HashSet::new(),
            exclude_patterns: Vec::new(),
            exclude_regexes: Vec::new(),
            include_patterns: Vec::new(),
        }
    }
}

/// Where the core reads and writes its configuration.
pub trait ConfigStore: Send + Sync {
    fn load(&self) -> Result<AppConfig, ConfigError>;
    fn save(&self, config: &AppConfig) -> Result<(), ConfigError>;
}

/// A TOML file on disk. A missing file loads as the default configuration.
#[derive(Debug, Clone)]
pub struct TomlConfigStore {
    path: PathBuf,
}

impl TomlConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for TomlConfigStore {
    fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.path.exists() {
            return Ok(AppConfig::default());
        }
        AppConfig::load_from_file(&self.path)
    }

    fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }
        fs::write(&self.path, config.to_toml()?).map_err(|e| ConfigError::IoError(e.to_string()))
    }
}

/// Keeps the configuration in memory.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    config: Mutex<AppConfig>,
}

impl MemoryConfigStore {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Mutex::new(config),
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = self
            .config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        config.normalize();
        Ok(config)
    }

    fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        *self.config.lock().unwrap_or_else(PoisonError::into_inner) = config.clone();
        Ok(())
    }
}
