//! Action sinks: run a command or stream change records
//!
//! The sink is chosen once at startup and fixed for the process lifetime.
//! Exec mode runs the configured command synchronously and ignores its
//! exit status; stream mode writes one `<path>\n` record per changed file
//! to a fifo that exists for exactly as long as the watcher does.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use nix::sys::stat::Mode;
use nix::unistd::mkfifo;

use crate::error::{WatchError, WatchResult};

/// Where change batches go once the dispatch loop decides to act
pub trait ActionSink {
    /// Deliver one batch of changed paths, in batch order
    fn fire(&mut self, changed: &[&Path]) -> io::Result<()>;

    /// Whether a single firing covers the whole batch. When set, the
    /// dispatch loop drains queued events after firing so a burst of
    /// near-simultaneous edits cannot cascade into reruns.
    fn coalesces(&self) -> bool;
}

/// Runs the configured command once per batch and waits for it
#[derive(Debug, Clone)]
pub struct CommandSink {
    program: String,
    args: Vec<String>,
}

impl CommandSink {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }
}

impl ActionSink for CommandSink {
    fn fire(&mut self, _changed: &[&Path]) -> io::Result<()> {
        // the exit status is the command's business, not the watcher's
        let _status = Command::new(&self.program).args(&self.args).status()?;
        Ok(())
    }

    fn coalesces(&self) -> bool {
        true
    }
}

/// Writes one `<path>\n` record per changed file and flushes the batch
#[derive(Debug)]
pub struct StreamSink<W: Write> {
    out: W,
}

impl<W: Write> StreamSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> ActionSink for StreamSink<W> {
    fn fire(&mut self, changed: &[&Path]) -> io::Result<()> {
        for path in changed {
            self.out.write_all(path.as_os_str().as_bytes())?;
            self.out.write_all(b"\n")?;
        }
        self.out.flush()
    }

    fn coalesces(&self) -> bool {
        false
    }
}

/// Owns the fifo path: created with owner-only permissions, removed on drop
#[derive(Debug)]
pub struct FifoGuard {
    path: PathBuf,
}

impl FifoGuard {
    pub fn create(path: PathBuf) -> WatchResult<Self> {
        mkfifo(&path, Mode::S_IRUSR | Mode::S_IWUSR).map_err(|errno| WatchError::Fifo {
            path: path.clone(),
            source: io::Error::from_raw_os_error(errno as i32),
        })?;
        Ok(Self { path })
    }

    /// Open the write side. Blocks until a reader opens the other end.
    pub fn open_writer(&self) -> WatchResult<File> {
        OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|source| WatchError::Fifo { path: self.path.clone(), source })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FifoGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
