//! Input-list reading and resource-limit sizing
//!
//! The file list arrives one path per line on stdin. The open-file limit
//! is raised to its hard ceiling first and then only caps how many lines
//! are read; no structure in the watcher is sized from it.

use std::io::{self, BufRead};
use std::path::PathBuf;

use nix::sys::resource::{getrlimit, setrlimit, Resource};

use crate::error::{WatchError, WatchResult};

/// Read one path per line. Blank lines are skipped, the trailing newline
/// is stripped, and at most `max_files` entries are taken.
pub fn read_paths(input: &mut impl BufRead, max_files: usize) -> io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let trimmed = line.strip_suffix('\n').unwrap_or(line.as_str());
        let trimmed = trimmed.strip_suffix('\r').unwrap_or(trimmed);
        if trimmed.is_empty() {
            continue;
        }
        paths.push(PathBuf::from(trimmed));
        if paths.len() >= max_files {
            break;
        }
    }
    Ok(paths)
}

/// Raise the soft open-file limit to the hard limit and return the result
/// as an advisory cap on how many files can be watched.
pub fn raise_fd_limit() -> WatchResult<usize> {
    let (_soft, hard) = getrlimit(Resource::RLIMIT_NOFILE)
        .map_err(|errno| WatchError::ResourceLimit(io::Error::from_raw_os_error(errno as i32)))?;
    setrlimit(Resource::RLIMIT_NOFILE, hard, hard)
        .map_err(|errno| WatchError::ResourceLimit(io::Error::from_raw_os_error(errno as i32)))?;
    Ok(usize::try_from(hard).unwrap_or(usize::MAX))
}
