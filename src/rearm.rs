//! (Re)arming watches across delete/replace races
//!
//! Editors and build tools commonly replace a file by writing a temporary
//! and renaming it over the original, so a DELETE on a watched path
//! usually means a new inode is about to appear. The same open-with-retry
//! sequence also covers initial registration, since a file may not be
//! available the instant watching begins.

use std::fs::File;
use std::path::Path;

use crate::error::{WatchError, WatchResult};
use crate::registry::{FileId, Registry, WatchState};
use crate::retry::{Clock, RetryPolicy};
use crate::source::EventSource;

/// Open `path` for read, tolerating the window between unlink and recreate
pub fn open_with_retry(
    path: &Path,
    policy: &RetryPolicy,
    clock: &dyn Clock,
) -> WatchResult<File> {
    policy
        .run(clock, || File::open(path))
        .map_err(|source| WatchError::Open { path: path.to_path_buf(), source })
}

/// Establish the watch for one registry entry. Failure is terminal for
/// the entry and fatal for the run: there is no partial-coverage mode.
pub fn arm(
    source: &mut dyn EventSource,
    registry: &mut Registry,
    id: FileId,
    policy: &RetryPolicy,
    clock: &dyn Clock,
) -> WatchResult<()> {
    let file = registry.get_mut(id);
    let opened = match open_with_retry(&file.path, policy, clock) {
        Ok(opened) => opened,
        Err(err) => {
            file.state = WatchState::Failed;
            return Err(err);
        }
    };
    file.file = Some(opened);
    if let Err(err) = source.register(id, file) {
        file.state = WatchState::Failed;
        return Err(err);
    }
    file.state = WatchState::Active;
    Ok(())
}

/// Re-establish a watch whose path was deleted or replaced, preserving
/// the entry's place in the registry
pub fn rearm(
    source: &mut dyn EventSource,
    registry: &mut Registry,
    id: FileId,
    policy: &RetryPolicy,
    clock: &dyn Clock,
) -> WatchResult<()> {
    let file = registry.get_mut(id);
    file.state = WatchState::PendingRearm;
    source.unregister(id, file);
    // dropping the descriptor releases any remaining kernel-side state
    file.file = None;
    arm(source, registry, id, policy, clock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventBatch;
    use crate::registry::{WatchHandle, WatchedFile};
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    struct FakeClock;

    impl Clock for FakeClock {
        fn sleep(&self, _duration: Duration) {}
    }

    #[derive(Default)]
    struct FakeSource {
        next_handle: u64,
        registered: Vec<FileId>,
        unregistered: Vec<FileId>,
    }

    impl EventSource for FakeSource {
        fn register(&mut self, id: FileId, file: &mut WatchedFile) -> WatchResult<()> {
            self.next_handle += 1;
            file.handle = Some(WatchHandle(self.next_handle));
            self.registered.push(id);
            Ok(())
        }

        fn unregister(&mut self, id: FileId, file: &mut WatchedFile) {
            file.handle = None;
            self.unregistered.push(id);
        }

        fn wait(&mut self, _timeout: Option<Duration>) -> WatchResult<EventBatch> {
            Ok(EventBatch::default())
        }
    }

    fn quick_policy() -> RetryPolicy {
        RetryPolicy { attempts: 3, delay: Duration::ZERO }
    }

    #[test]
    fn test_arm_opens_registers_and_activates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "content").unwrap();

        let mut source = FakeSource::default();
        let mut registry = Registry::from_paths(vec![path]);
        let id = registry.ids().next().unwrap();
        arm(&mut source, &mut registry, id, &quick_policy(), &FakeClock).unwrap();

        let file = registry.get(id);
        assert_eq!(file.state, WatchState::Active);
        assert_eq!(file.handle, Some(WatchHandle(1)));
        assert!(file.file.is_some());
        assert_eq!(source.registered, vec![id]);
    }

    #[test]
    fn test_arm_missing_file_fails_terminally() {
        let dir = tempdir().unwrap();
        let mut source = FakeSource::default();
        let mut registry = Registry::from_paths(vec![dir.path().join("missing.txt")]);
        let id = registry.ids().next().unwrap();

        let err = arm(&mut source, &mut registry, id, &quick_policy(), &FakeClock)
            .unwrap_err();
        assert!(matches!(err, WatchError::Open { .. }));
        assert_eq!(registry.get(id).state, WatchState::Failed);
        assert!(source.registered.is_empty());
    }

    #[test]
    fn test_rearm_swaps_handle_in_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "v1").unwrap();

        let mut source = FakeSource::default();
        let mut registry = Registry::from_paths(vec![path.clone()]);
        let id = registry.ids().next().unwrap();
        arm(&mut source, &mut registry, id, &quick_policy(), &FakeClock).unwrap();
        let first = registry.get(id).handle;

        // delete and recreate, the editor save pattern
        fs::remove_file(&path).unwrap();
        fs::write(&path, "v2").unwrap();
        rearm(&mut source, &mut registry, id, &quick_policy(), &FakeClock).unwrap();

        let file = registry.get(id);
        assert_eq!(file.state, WatchState::Active);
        assert_ne!(file.handle, first);
        assert_eq!(source.unregistered, vec![id]);
        assert_eq!(source.registered, vec![id, id]);
    }

    #[test]
    fn test_rearm_gives_up_when_file_never_returns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "v1").unwrap();

        let mut source = FakeSource::default();
        let mut registry = Registry::from_paths(vec![path.clone()]);
        let id = registry.ids().next().unwrap();
        arm(&mut source, &mut registry, id, &quick_policy(), &FakeClock).unwrap();

        fs::remove_file(&path).unwrap();
        let err = rearm(&mut source, &mut registry, id, &quick_policy(), &FakeClock)
            .unwrap_err();
        assert!(matches!(err, WatchError::Open { .. }));
        assert_eq!(registry.get(id).state, WatchState::Failed);
    }
}
