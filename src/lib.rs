//! Run arbitrary commands when files change.
//!
//! The crate watches an explicit set of regular files through the
//! platform's kernel notification facility (inotify on Linux, kqueue on
//! the BSDs and macOS) and reacts to changes in one of two ways: execute
//! a command once per batch of changes, or stream the changed paths one
//! per line. Directories are never watched; deleted files are re-armed
//! by path so editors that replace-on-save keep working.
//!
//! The pieces compose through two traits. [`source::EventSource`] hides
//! the OS facility behind a normalized event model, and
//! [`sink::ActionSink`] hides what happens on a change. [`dispatch::run`]
//! wires them together with the [`registry::Registry`] of watched files.

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly",
)))]
compile_error!("this crate requires inotify or kqueue support");

pub mod dispatch;
pub mod error;
pub mod event;
pub mod input;
pub mod rearm;
pub mod registry;
pub mod report;
pub mod retry;
pub mod sink;
pub mod source;

pub use error::{WatchError, WatchResult};
pub use event::{EventBatch, EventKind, NormalizedEvent};
pub use registry::{FileId, Registry, WatchState, WatchedFile};
pub use report::Notice;
pub use retry::{Clock, RetryPolicy, SystemClock};
