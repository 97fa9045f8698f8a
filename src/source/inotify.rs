//! Compatibility strategy over Linux inotify
//!
//! inotify reports records per watch descriptor with its own vocabulary,
//! and can deliver several records for one descriptor in a single read
//! where kqueue would have reported them pre-merged. This adapter
//! translates the vocabulary, merges per-descriptor records, and folds
//! stdin readiness into the same poll set as an out-of-band shutdown
//! signal.

use std::collections::HashMap;
use std::io::{self, Read};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::io::AsRawFd;
use std::time::Duration;

use inotify::{EventMask, Inotify, WatchDescriptor, WatchMask};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use super::EventSource;
use crate::error::{WatchError, WatchResult};
use crate::event::{coalesce, EventBatch, EventKind, NormalizedEvent};
use crate::registry::{FileId, WatchHandle, WatchedFile};

/// Compatibility event source backed by inotify
pub struct InotifySource {
    inotify: Inotify,
    /// Watch-descriptor id to registry entry. Entries removed here stop
    /// resolving, so late records for superseded watches are dropped.
    watches: HashMap<u64, (FileId, WatchDescriptor)>,
    track_input: bool,
}

impl InotifySource {
    pub fn new(track_input: bool) -> WatchResult<Self> {
        Ok(Self {
            inotify: Inotify::init().map_err(WatchError::Io)?,
            watches: HashMap::new(),
            track_input,
        })
    }

    /// Translate one raw record's mask into the normalized kind-set.
    ///
    /// CLOSE_WRITE stands in for a completed save where MODIFY would fire
    /// once per write(2) chunk, so MODIFY is not subscribed at all. CREATE
    /// covers editors that recreate the path rather than writing in place.
    fn translate(mask: EventMask) -> EventKind {
        let mut kinds = EventKind::empty();
        if mask.contains(EventMask::CLOSE_WRITE) {
            kinds |= EventKind::WRITE;
        }
        if mask.contains(EventMask::CREATE) {
            kinds |= EventKind::WRITE;
        }
        if mask.contains(EventMask::DELETE_SELF) {
            kinds |= EventKind::DELETE;
        }
        if mask.contains(EventMask::MOVE_SELF) {
            kinds |= EventKind::RENAME;
        }
        if mask.contains(EventMask::ATTRIB) {
            kinds |= EventKind::ATTRIB;
        }
        kinds
    }

    fn watch_mask() -> WatchMask {
        WatchMask::CLOSE_WRITE
            | WatchMask::CREATE
            | WatchMask::DELETE_SELF
            | WatchMask::MOVE_SELF
            | WatchMask::ATTRIB
    }

    /// Read everything currently queued and fold it into `batch`,
    /// unioning kind-sets for records that share a watch descriptor
    fn read_batch(&mut self, batch: &mut EventBatch) -> WatchResult<()> {
        let mut buffer = [0u8; 4096];
        let mut raw: Vec<NormalizedEvent> = Vec::new();
        loop {
            match self.inotify.read_events(&mut buffer) {
                Ok(events) => {
                    let mut saw_any = false;
                    for event in events {
                        saw_any = true;
                        if event.mask.contains(EventMask::Q_OVERFLOW) {
                            batch.overflowed = true;
                            continue;
                        }
                        if event.mask.contains(EventMask::IGNORED) {
                            continue;
                        }
                        let key = event.wd.get_watch_descriptor_id() as u64;
                        let target = match self.watches.get(&key) {
                            Some((id, _)) => *id,
                            // superseded watch, nothing to resolve to
                            None => continue,
                        };
                        raw.push(NormalizedEvent {
                            target,
                            kinds: Self::translate(event.mask),
                        });
                    }
                    if !saw_any {
                        break;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => return Err(WatchError::Io(err)),
            }
        }
        batch.events = coalesce(raw);
        Ok(())
    }
}

impl EventSource for InotifySource {
    fn register(&mut self, id: FileId, file: &mut WatchedFile) -> WatchResult<()> {
        let wd = self
            .inotify
            .watches()
            .add(&file.path, Self::watch_mask())
            .map_err(|source| WatchError::Register { path: file.path.clone(), source })?;
        let key = wd.get_watch_descriptor_id() as u64;
        self.watches.insert(key, (id, wd));
        file.handle = Some(WatchHandle(key));
        // the watch follows the inode via the path; holding the descriptor
        // open would defer DELETE_SELF until we closed it
        file.file = None;
        Ok(())
    }

    fn unregister(&mut self, _id: FileId, file: &mut WatchedFile) {
        if let Some(WatchHandle(key)) = file.handle.take() {
            if let Some((_, wd)) = self.watches.remove(&key) {
                // EINVAL here means the kernel already dropped the watch
                // along with the deleted file; both outcomes are fine
                let _ = self.inotify.watches().remove(wd);
            }
        }
    }

    fn wait(&mut self, timeout: Option<Duration>) -> WatchResult<EventBatch> {
        let mut batch = EventBatch::default();

        let inotify_fd = unsafe { BorrowedFd::borrow_raw(self.inotify.as_raw_fd()) };
        let stdin = io::stdin();
        let mut fds = Vec::with_capacity(2);
        fds.push(PollFd::new(inotify_fd, PollFlags::POLLIN));
        if self.track_input {
            fds.push(PollFd::new(stdin.as_fd(), PollFlags::POLLIN));
        }

        let poll_timeout = match timeout {
            None => PollTimeout::NONE,
            Some(duration) => PollTimeout::try_from(duration).unwrap_or(PollTimeout::MAX),
        };
        let ready = match poll(&mut fds, poll_timeout) {
            Ok(n) => n,
            // interrupted waits are transient; the loop just re-enters
            Err(nix::errno::Errno::EINTR) => return Ok(batch),
            Err(errno) => {
                return Err(WatchError::Io(io::Error::from_raw_os_error(errno as i32)))
            }
        };
        if ready == 0 {
            return Ok(batch);
        }

        let readable = PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR;
        let events_ready = fds[0]
            .revents()
            .map_or(false, |revents| revents.intersects(readable));
        let input_ready = fds
            .get(1)
            .and_then(|fd| fd.revents())
            .map_or(false, |revents| revents.intersects(readable));
        drop(fds);

        if events_ready {
            self.read_batch(&mut batch)?;
        }
        if input_ready {
            batch.input_ready = consume_input();
        }
        Ok(batch)
    }
}

/// Consume whatever made stdin readable. Only EOF (the terminal went
/// away) or a literal `q` request shutdown; other keystrokes are noise.
fn consume_input() -> bool {
    let mut buf = [0u8; 64];
    match io::stdin().read(&mut buf) {
        Ok(0) => true,
        Ok(n) => buf[..n].contains(&b'q'),
        Err(_) => false,
    }
}
