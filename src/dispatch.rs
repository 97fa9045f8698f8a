//! The dispatch loop
//!
//! Two states, looping until canceled: WAITING (blocked in the event
//! source) and ACTING (coalescing a batch, rearming deleted files, firing
//! the sink). Blocking happens in short ticks so cancellation and tests
//! can stop the loop through a shared flag.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::WatchResult;
use crate::event::{coalesce, EventKind, NormalizedEvent};
use crate::rearm;
use crate::registry::Registry;
use crate::report::Notice;
use crate::retry::{Clock, RetryPolicy};
use crate::sink::ActionSink;
use crate::source::EventSource;

/// How long one blocking wait lasts before the loop rechecks `running`
pub const WAIT_TICK_MS: u64 = 100;

/// Run the watch loop until `running` clears, the input signal asks for
/// shutdown, or a watch becomes unrecoverable.
pub fn run<F: FnMut(Notice)>(
    source: &mut dyn EventSource,
    registry: &mut Registry,
    sink: &mut dyn ActionSink,
    policy: &RetryPolicy,
    clock: &dyn Clock,
    running: &AtomicBool,
    mut notify: F,
) -> WatchResult<()> {
    notify(Notice::WatchStarted { files: registry.len() });

    while running.load(Ordering::SeqCst) {
        let batch = source.wait(Some(Duration::from_millis(WAIT_TICK_MS)))?;
        if batch.overflowed {
            // the facility dropped events; keep going with what we have
            notify(Notice::QueueOverflow);
        }
        if batch.input_ready {
            notify(Notice::Shutdown);
            return Ok(());
        }
        if batch.events.is_empty() {
            continue;
        }

        let merged = coalesce(batch.events);
        for event in &merged {
            if event.kinds.contains(EventKind::DELETE) {
                rearm_one(source, registry, event, policy, clock, &mut notify)?;
            }
        }

        let changed: Vec<PathBuf> = merged
            .iter()
            .filter(|event| event.kinds.is_change_worthy())
            .map(|event| registry.get(event.target).path.clone())
            .collect();
        if changed.is_empty() {
            continue;
        }

        for path in &changed {
            notify(Notice::FileChanged { path: path.display().to_string() });
        }
        let paths: Vec<&Path> = changed.iter().map(PathBuf::as_path).collect();
        if let Err(err) = sink.fire(&paths) {
            // the action's failure is its own business; keep watching
            notify(Notice::ActionFailed { message: err.to_string() });
        }

        if sink.coalesces() {
            drain(source, registry, policy, clock)?;
        }
    }

    notify(Notice::Shutdown);
    Ok(())
}

/// Discard events that arrived while the action ran. This single
/// non-blocking read is the entire debounce mechanism. Deletes found here
/// are still rearmed so handles stay valid, but nothing is reported and
/// nothing fires.
fn drain(
    source: &mut dyn EventSource,
    registry: &mut Registry,
    policy: &RetryPolicy,
    clock: &dyn Clock,
) -> WatchResult<()> {
    let batch = source.wait(Some(Duration::ZERO))?;
    for event in coalesce(batch.events) {
        if event.kinds.contains(EventKind::DELETE) {
            rearm::rearm(source, registry, event.target, policy, clock)?;
        }
    }
    Ok(())
}

fn rearm_one<F: FnMut(Notice)>(
    source: &mut dyn EventSource,
    registry: &mut Registry,
    event: &NormalizedEvent,
    policy: &RetryPolicy,
    clock: &dyn Clock,
    notify: &mut F,
) -> WatchResult<()> {
    rearm::rearm(source, registry, event.target, policy, clock)?;
    notify(Notice::Rearmed {
        path: registry.get(event.target).path.display().to_string(),
    });
    Ok(())
}
