//! tidywatch - keep folders tidy.
//!
//! A rule engine decides where each file belongs (first matching rule by
//! priority, falling back to file-type categories), an executor carries the
//! plan out and records an undo log, and a watch manager applies the same
//! pipeline to folders as they change.

pub mod category;
pub mod cli;
pub mod condition;
pub mod config;
pub mod debounce;
pub mod error;
pub mod event;
pub mod executor;
pub mod file_kind;
pub mod folder;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod pattern;
pub mod recent;
pub mod rename_guard;
pub mod rule;
pub mod rule_engine;
pub mod trash;
pub mod undo;
pub mod watch_manager;

pub use category::{Category, CategoryResolver};
pub use condition::{Attribute, Condition, ConditionGroup, MatchType, Operator};
pub use config::{AppConfig, CompiledFilters, ConfigStore, FilterRules, Settings, TomlConfigStore};
pub use error::{ConfigError, OrganizeError, OrganizeResult, WatchError, WatchResult};
pub use event::{ChangeKind, FileChange, FolderEvent};
pub use executor::{MoveOperation, OperationKind, OperationLog, OrganizationExecutor, OrganizeReport};
pub use file_kind::FileKind;
pub use folder::{FolderStatus, WatchedFolder};
pub use metadata::FileMetadata;
pub use rule::{ActionType, Rule, RuleAction};
pub use rule_engine::{FileOrganizeResult, MatchedBy, Plan, RuleEngine};
pub use trash::{DirectoryTrash, SystemTrash, TrashService};
pub use undo::{UndoManager, UndoReport};
pub use watch_manager::FolderWatchManager;

pub use cli::{OrganizeCommand, run_cli};
