//! Raw change notifications and the events the watch manager emits upward.

use std::path::PathBuf;
use std::time::Instant;

use notify::event::{ModifyKind, RenameMode};
use serde::{Deserialize, Serialize};

use crate::folder::FolderStatus;

/// Kind of filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Renamed,
    Other,
}

impl ChangeKind {
    /// Changes that can leave a file worth organizing.
    pub fn is_organizable(self) -> bool {
        matches!(
            self,
            ChangeKind::Created | ChangeKind::Modified | ChangeKind::Renamed
        )
    }
}

impl From<notify::EventKind> for ChangeKind {
    fn from(kind: notify::EventKind) -> Self {
        match kind {
            notify::EventKind::Create(_) => Self::Created,
            notify::EventKind::Modify(ModifyKind::Name(_)) => Self::Renamed,
            notify::EventKind::Modify(_) => Self::Modified,
            notify::EventKind::Remove(_) => Self::Deleted,
            _ => Self::Other,
        }
    }
}

/// One entry of a folder's pending buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub timestamp: Instant,
}

impl FileChange {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            timestamp: Instant::now(),
        }
    }
}

/// A notify event flattened into what the manager acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawChange {
    Changed(PathBuf, ChangeKind),
    /// The old name, when the backend reports it on its own.
    RenamedFrom(PathBuf),
    RenamedTo(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
}

impl RawChange {
    /// Flattens a notify event. Access and metadata-only events are dropped.
    pub fn from_event(event: &notify::Event) -> Vec<RawChange> {
        use notify::EventKind;

        match event.kind {
            EventKind::Access(_) | EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
                vec![RawChange::Renamed {
                    from: event.paths[0].clone(),
                    to: event.paths[1].clone(),
                }]
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
                .paths
                .iter()
                .cloned()
                .map(RawChange::RenamedFrom)
                .collect(),
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
                .paths
                .iter()
                .cloned()
                .map(RawChange::RenamedTo)
                .collect(),
            kind => {
                let change = ChangeKind::from(kind);
                event
                    .paths
                    .iter()
                    .map(|p| RawChange::Changed(p.clone(), change))
                    .collect()
            }
        }
    }
}

/// Events delivered to the owner of a `FolderWatchManager`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FolderEvent {
    StatusChanged {
        folder_id: String,
        old_status: FolderStatus,
        new_status: FolderStatus,
        error: Option<String>,
    },
    OrganizationCompleted {
        folder_id: String,
        files_moved: usize,
        files_skipped: usize,
        errors: Vec<(PathBuf, String)>,
    },
    FolderChanged {
        folder_id: String,
        change_kind: ChangeKind,
        affected_paths: Vec<PathBuf>,
    },
}

impl FolderEvent {
    pub fn folder_id(&self) -> &str {
        match self {
            FolderEvent::StatusChanged { folder_id, .. }
            | FolderEvent::OrganizationCompleted { folder_id, .. }
            | FolderEvent::FolderChanged { folder_id, .. } => folder_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};
    use notify::{Event, EventKind};

    #[test]
    fn test_change_kind_from_notify() {
        assert_eq!(
            ChangeKind::from(EventKind::Create(CreateKind::File)),
            ChangeKind::Created
        );
        assert_eq!(
            ChangeKind::from(EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            ChangeKind::Modified
        );
        assert_eq!(
            ChangeKind::from(EventKind::Remove(RemoveKind::File)),
            ChangeKind::Deleted
        );
        assert!(!ChangeKind::Deleted.is_organizable());
    }

    #[test]
    fn test_rename_both_is_paired() {
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/w/New Document.txt"))
            .add_path(PathBuf::from("/w/notes.txt"));

        assert_eq!(
            RawChange::from_event(&event),
            vec![RawChange::Renamed {
                from: PathBuf::from("/w/New Document.txt"),
                to: PathBuf::from("/w/notes.txt"),
            }]
        );
    }

    #[test]
    fn test_access_events_are_dropped() {
        let event = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/w/a.txt"));
        assert!(RawChange::from_event(&event).is_empty());
    }
}
