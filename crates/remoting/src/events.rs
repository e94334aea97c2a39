//! Log and progress events streamed while a job executes
//!
//! Delivery is fire-and-forget from the producing side: observers must not
//! block. Log events preserve order within one job; progress events are
//! last-write-wins and readers only ever see the most recent snapshot.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Severity of a remote log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// The matching level on the `log` facade
    pub fn to_log(self) -> log::Level {
        match self {
            Self::Debug => log::Level::Debug,
            Self::Info => log::Level::Info,
            Self::Warn => log::Level::Warn,
            Self::Error => log::Level::Error,
        }
    }
}

/// One log line emitted during a job's execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub level: LogLevel,
    pub message: String,
}

impl LogEvent {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Progress snapshot; each event replaces the prior one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Percent complete, 0-100
    pub percent: Option<u8>,
    /// What the job is currently doing
    pub activity: Option<String>,
}

/// Per-job event observer, registered before submission and valid only for
/// that job's lifetime. Callbacks must return quickly.
pub trait JobObserver: Send + Sync {
    fn on_log(&self, _event: LogEvent) {}
    fn on_progress(&self, _event: ProgressEvent) {}
}

/// No-op observer
pub struct NullObserver;

impl JobObserver for NullObserver {}

/// Single-slot holder for the latest progress event.
///
/// Writes replace the previous value atomically; concurrent overwrites are
/// resolved by the replace itself, never accumulated.
#[derive(Debug, Default)]
pub struct ProgressSlot {
    latest: Mutex<Option<ProgressEvent>>,
}

impl ProgressSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held event; last write wins
    pub fn replace(&self, event: ProgressEvent) {
        if let Ok(mut slot) = self.latest.lock() {
            *slot = Some(event);
        }
    }

    /// Snapshot of the most recent event
    pub fn latest(&self) -> Option<ProgressEvent> {
        self.latest.lock().ok().and_then(|slot| slot.clone())
    }
}

/// Observer that forwards log events to the `log` facade and tracks the
/// latest progress event in a [`ProgressSlot`].
pub struct LogObserver {
    label: String,
    progress: ProgressSlot,
}

impl LogObserver {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            progress: ProgressSlot::new(),
        }
    }

    /// The most recent progress event seen for this job
    pub fn progress(&self) -> Option<ProgressEvent> {
        self.progress.latest()
    }
}

impl JobObserver for LogObserver {
    fn on_log(&self, event: LogEvent) {
        log::log!(event.level.to_log(), "[{}] {}", self.label, event.message);
    }

    fn on_progress(&self, event: ProgressEvent) {
        self.progress.replace(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_slot_is_last_write_wins() {
        let slot = ProgressSlot::new();
        for (percent, activity) in [(10, "a"), (55, "b"), (90, "c")] {
            slot.replace(ProgressEvent {
                percent: Some(percent),
                activity: Some(activity.to_string()),
            });
        }
        let latest = slot.latest().unwrap();
        assert_eq!(latest.percent, Some(90));
        assert_eq!(latest.activity.as_deref(), Some("c"));
    }

    #[test]
    fn progress_slot_starts_empty() {
        assert!(ProgressSlot::new().latest().is_none());
    }
}
