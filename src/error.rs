//! Error types for onchange
//!
//! Uses `thiserror` for library errors. Setup and watch errors are fatal;
//! transient conditions (a file briefly missing during a save, an
//! interrupted blocking read) are handled where they occur and never
//! surface here.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for watch operations
pub type WatchResult<T> = Result<T, WatchError>;

/// Main error type for watch operations
#[derive(Error, Debug)]
pub enum WatchError {
    /// A watched path could not be opened, even after the retry budget
    #[error("cannot open '{}': {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    /// The notification facility rejected a watch registration
    #[error("failed to register watch for '{}': {source}", .path.display())]
    Register { path: PathBuf, source: io::Error },

    /// The stream-mode fifo could not be created or opened
    #[error("cannot set up fifo '{}': {source}", .path.display())]
    Fifo { path: PathBuf, source: io::Error },

    /// RLIMIT_NOFILE could not be queried or raised
    #[error("failed to adjust the open-file limit: {0}")]
    ResourceLimit(io::Error),

    /// Event source failure (facility init, blocking read)
    #[error("event source error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_open() {
        let err = WatchError::Open {
            path: PathBuf::from("a.txt"),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        };
        assert_eq!(
            err.to_string(),
            "cannot open 'a.txt': No such file or directory"
        );
    }

    #[test]
    fn test_error_display_fifo() {
        let err = WatchError::Fifo {
            path: PathBuf::from("/tmp/events"),
            source: io::Error::new(io::ErrorKind::AlreadyExists, "File exists"),
        };
        assert_eq!(
            err.to_string(),
            "cannot set up fifo '/tmp/events': File exists"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let err: WatchError = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(matches!(err, WatchError::Io(_)));
    }
}
