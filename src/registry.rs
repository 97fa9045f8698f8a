//! Registry of files under watch
//!
//! Watched files live in an arena addressed by a stable `FileId`. A rearm
//! swaps the low-level watch handle in place, so nothing else in the
//! system ever holds a raw OS identifier that could go stale.

use std::collections::HashSet;
use std::fs::File;
use std::path::PathBuf;

/// Stable index of a `WatchedFile` in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(usize);

/// Opaque watch identity assigned by the active event source.
/// The value may change across a rearm; only the `FileId` is stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Handle is valid and events for it resolve here
    Active,
    /// Between losing a watch and re-establishing it
    PendingRearm,
    /// Retry budget exhausted; terminal
    Failed,
}

/// One path under observation
#[derive(Debug)]
pub struct WatchedFile {
    /// Immutable for the file's lifetime; also what stream mode reports
    pub path: PathBuf,
    /// Open descriptor backing the watch, where the strategy needs one.
    /// Dropping it releases any kernel-side watch state tied to it.
    pub file: Option<File>,
    pub handle: Option<WatchHandle>,
    pub state: WatchState,
}

impl WatchedFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            file: None,
            handle: None,
            state: WatchState::PendingRearm,
        }
    }
}

/// Arena of watched files, created once at startup
#[derive(Debug, Default)]
pub struct Registry {
    files: Vec<WatchedFile>,
}

impl Registry {
    /// Build the registry from the input path list. Exactly one entry
    /// exists per distinct path: duplicates keep their first occurrence.
    pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut seen = HashSet::new();
        let files = paths
            .into_iter()
            .filter(|path| seen.insert(path.clone()))
            .map(WatchedFile::new)
            .collect();
        Self { files }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = FileId> + '_ {
        (0..self.files.len()).map(FileId)
    }

    pub fn get(&self, id: FileId) -> &WatchedFile {
        &self.files[id.0]
    }

    pub fn get_mut(&mut self, id: FileId) -> &mut WatchedFile {
        &mut self.files[id.0]
    }
}
