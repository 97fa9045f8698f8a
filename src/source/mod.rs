//! Event-source strategies over the native notification facilities
//!
//! Exactly one strategy is active per process, selected by platform at
//! startup: kqueue registers each file's open descriptor directly, while
//! the inotify compatibility strategy watches paths and translates a
//! different flag vocabulary into the same normalized model. Call sites
//! only ever see the `EventSource` trait.

use std::time::Duration;

use crate::error::WatchResult;
use crate::event::EventBatch;
use crate::registry::{FileId, WatchedFile};

#[cfg(any(target_os = "linux", target_os = "android"))]
mod inotify;
#[cfg(any(
    target_os = "macos",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
mod kqueue;

#[cfg(any(target_os = "linux", target_os = "android"))]
pub use self::inotify::InotifySource;
#[cfg(any(
    target_os = "macos",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
pub use self::kqueue::KqueueSource;

/// One registration facility, two interchangeable implementations.
///
/// Once `register` succeeds, every subsequent change to the path produces
/// at least one event until `unregister` (or a close of the backing
/// descriptor) releases the watch, barring queue overflow.
pub trait EventSource {
    /// Establish a watch for `file` and assign its handle
    fn register(&mut self, id: FileId, file: &mut WatchedFile) -> WatchResult<()>;

    /// Release the watch. Best-effort on the kernel side: a watch whose
    /// file was already deleted (or whose descriptor is closed) is gone
    /// regardless.
    fn unregister(&mut self, id: FileId, file: &mut WatchedFile);

    /// Block until at least one event is available or the timeout elapses.
    /// `None` blocks indefinitely; `Some(Duration::ZERO)` is a
    /// non-blocking drain. Timeouts and interrupted reads return an empty
    /// batch.
    fn wait(&mut self, timeout: Option<Duration>) -> WatchResult<EventBatch>;
}

/// Build the notification strategy for this platform.
///
/// `track_input` asks the compatibility strategy to fold stdin readiness
/// into its poll set as a shutdown signal; the kqueue strategy has no use
/// for it.
pub fn platform_source(track_input: bool) -> WatchResult<Box<dyn EventSource>> {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        Ok(Box::new(InotifySource::new(track_input)?))
    }
    #[cfg(any(
        target_os = "macos",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    ))]
    {
        let _ = track_input;
        Ok(Box::new(KqueueSource::new()?))
    }
}
