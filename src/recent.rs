//! Process-wide record of paths the executor just wrote.
//!
//! Events for these paths are our own echo and are dropped by the watch
//! manager for a short window.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::trace;

#[derive(Debug)]
pub struct RecentlyOrganized {
    entries: Mutex<HashMap<PathBuf, Instant>>,
    window: Duration,
    purge_age: Duration,
}

impl RecentlyOrganized {
    pub fn new(window: Duration, purge_age: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            window,
            purge_age,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PathBuf, Instant>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mark(&self, path: &Path) {
        trace!(path = %path.display(), "marking recently organized");
        self.entries().insert(path.to_path_buf(), Instant::now());
    }

    pub fn mark_all<'a>(&self, paths: impl IntoIterator<Item = &'a Path>) {
        let now = Instant::now();
        let mut entries = self.entries();
        for path in paths {
            entries.insert(path.to_path_buf(), now);
        }
    }

    /// True if `path` was marked within the suppression window.
    pub fn is_recent(&self, path: &Path) -> bool {
        self.entries()
            .get(path)
            .is_some_and(|at| at.elapsed() < self.window)
    }

    /// Drops entries older than the purge age. Returns how many were removed.
    pub fn purge(&self) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, at| at.elapsed() < self.purge_age);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RecentlyOrganized {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(10))
    }
}
