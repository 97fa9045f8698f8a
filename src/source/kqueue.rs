//! Native strategy over kqueue EVFILT_VNODE
//!
//! Each watched file's open descriptor is registered directly; the kernel
//! reports per-descriptor vnode flags that map 1:1 onto the normalized
//! kind-set. Closing the descriptor clears the kernel-side event, which
//! is what makes the delete/rearm dance safe.

use std::collections::HashMap;
use std::io;
use std::os::unix::io::AsRawFd;
use std::time::Duration;

use kqueue::{EventData, EventFilter, FilterFlag, Ident, Vnode, Watcher};

use super::EventSource;
use crate::error::{WatchError, WatchResult};
use crate::event::{coalesce, EventBatch, EventKind, NormalizedEvent};
use crate::registry::{FileId, WatchHandle, WatchedFile};

/// Native event source backed by kqueue
pub struct KqueueSource {
    watcher: Watcher,
    /// Descriptor to registry entry; descriptors of superseded watches are
    /// removed here first, so their late events stop resolving
    watches: HashMap<u64, FileId>,
}

impl KqueueSource {
    pub fn new() -> WatchResult<Self> {
        Ok(Self {
            watcher: Watcher::new().map_err(WatchError::Io)?,
            watches: HashMap::new(),
        })
    }

    fn note_flags() -> FilterFlag {
        FilterFlag::NOTE_DELETE
            | FilterFlag::NOTE_WRITE
            | FilterFlag::NOTE_EXTEND
            | FilterFlag::NOTE_RENAME
            | FilterFlag::NOTE_ATTRIB
    }

    /// 1:1 translation of the vnode flag vocabulary
    fn translate(data: &Vnode) -> EventKind {
        match data {
            Vnode::Delete | Vnode::Revoke => EventKind::DELETE,
            Vnode::Write => EventKind::WRITE,
            Vnode::Extend => EventKind::EXTEND,
            Vnode::Rename => EventKind::RENAME,
            Vnode::Attrib | Vnode::Link => EventKind::ATTRIB,
            _ => EventKind::empty(),
        }
    }

    fn push_event(&self, raw: &mut Vec<NormalizedEvent>, event: kqueue::Event) {
        if let kqueue::Event { data: EventData::Vnode(data), ident: Ident::Fd(fd), .. } = event {
            if let Some(&target) = self.watches.get(&(fd as u64)) {
                raw.push(NormalizedEvent { target, kinds: Self::translate(&data) });
            }
        }
    }
}

impl EventSource for KqueueSource {
    fn register(&mut self, id: FileId, file: &mut WatchedFile) -> WatchResult<()> {
        let fd = match &file.file {
            Some(open) => open.as_raw_fd(),
            None => {
                return Err(WatchError::Register {
                    path: file.path.clone(),
                    source: io::Error::new(
                        io::ErrorKind::NotFound,
                        "no open descriptor to watch",
                    ),
                })
            }
        };
        self.watcher
            .add_fd(fd, EventFilter::EVFILT_VNODE, Self::note_flags())
            .map_err(|source| WatchError::Register { path: file.path.clone(), source })?;
        self.watcher.watch().map_err(WatchError::Io)?;
        self.watches.insert(fd as u64, id);
        file.handle = Some(WatchHandle(fd as u64));
        Ok(())
    }

    fn unregister(&mut self, _id: FileId, file: &mut WatchedFile) {
        if let Some(WatchHandle(key)) = file.handle.take() {
            self.watches.remove(&key);
            // closing the descriptor clears the kernel-side event; an
            // explicit removal only matters while it is still open
            if file.file.is_some() {
                let _ = self
                    .watcher
                    .remove_fd(key as i32, EventFilter::EVFILT_VNODE);
            }
        }
    }

    fn wait(&mut self, timeout: Option<Duration>) -> WatchResult<EventBatch> {
        let mut batch = EventBatch::default();
        let first = match timeout {
            None => self.watcher.iter().next(),
            Some(duration) => self.watcher.poll(Some(duration)),
        };
        let Some(first) = first else {
            return Ok(batch);
        };

        let mut raw = Vec::new();
        self.push_event(&mut raw, first);
        // pick up whatever else is already queued so one burst of edits
        // lands in one batch
        while let Some(event) = self.watcher.poll(None) {
            self.push_event(&mut raw, event);
        }
        batch.events = coalesce(raw);
        Ok(batch)
    }
}
