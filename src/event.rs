//! Normalized change events
//!
//! Both notification strategies translate their native vocabularies into
//! this one small model before anything else sees them. Events refer to
//! files only through a registry `FileId`; raw OS identifiers never leave
//! the adapter that produced them.

use bitflags::bitflags;

use crate::registry::FileId;

bitflags! {
    /// Kinds of change a single event can carry
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventKind: u8 {
        const WRITE = 0b0000_0001;
        const EXTEND = 0b0000_0010;
        const DELETE = 0b0000_0100;
        const RENAME = 0b0000_1000;
        const ATTRIB = 0b0001_0000;
    }
}

impl EventKind {
    /// Whether this kind-set warrants firing the action sink.
    /// RENAME/ATTRIB alone are observed but never trigger.
    pub fn is_change_worthy(self) -> bool {
        self.intersects(EventKind::WRITE | EventKind::EXTEND | EventKind::DELETE)
    }
}

/// One unit of change information after adapter translation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedEvent {
    /// The watched file this event refers to
    pub target: FileId,
    /// Non-empty set of change kinds
    pub kinds: EventKind,
}

/// Events produced by one blocking call to an event source.
///
/// Ordering reflects discovery order, nothing more: all members of a batch
/// are considered simultaneous.
#[derive(Debug, Default)]
pub struct EventBatch {
    pub events: Vec<NormalizedEvent>,
    /// Out-of-band liveness signal from the compatibility strategy:
    /// standard input asked for shutdown. Never a file event.
    pub input_ready: bool,
    /// The facility's internal queue overflowed; events were lost.
    /// A known-loss condition, not a failure.
    pub overflowed: bool,
}

/// Merge events that refer to the same file by unioning their kind-sets,
/// preserving first-seen order. Empty kind-sets are dropped.
pub fn coalesce(events: Vec<NormalizedEvent>) -> Vec<NormalizedEvent> {
    let mut merged: Vec<NormalizedEvent> = Vec::with_capacity(events.len());
    for event in events {
        if event.kinds.is_empty() {
            continue;
        }
        match merged.iter_mut().find(|m| m.target == event.target) {
            Some(m) => m.kinds |= event.kinds,
            None => merged.push(event),
        }
    }
    merged
}
