//! Watch progress notices
//!
//! Diagnostics are delivered through a callback so the dispatch loop never
//! decides how (or whether) they are rendered. `--json` prints them as
//! NDJSON on stderr for CI; `--verbose` prints human lines; the default is
//! silence, stdout stays reserved for the invoked command.

use serde::Serialize;

/// Watch progress notices for NDJSON output
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notice {
    WatchStarted { files: usize },
    FileChanged { path: String },
    Rearmed { path: String },
    ActionFailed { message: String },
    QueueOverflow,
    Shutdown,
}

impl Notice {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
