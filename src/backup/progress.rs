//! Progress reporting for backup operations.
//!
//! Engines report through a [`ProgressSink`]. Sinks are notified on the
//! engine's own task and must not block; any closure
//! `Fn(ProgressEvent) + Send + Sync` is a sink, and [`channel`] adapts an
//! unbounded tokio channel for callers that consume events elsewhere.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

/// A progress notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Export is about to copy images totalling `total_bytes`.
    Started { total_bytes: u64 },
    /// Emitted after every copied chunk during export.
    Progress { written_bytes: u64, total_bytes: u64 },
    /// Export completed.
    Finished,
    /// The operation failed and stopped.
    Error { message: String },
    /// Merge is working on record `current` of `total`.
    Merging { current: usize, total: usize },
}

/// Receiver of progress notifications.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Sink that forwards events into an unbounded channel.
///
/// Events sent after the receiver is dropped are discarded.
pub fn channel(tx: UnboundedSender<ProgressEvent>) -> impl ProgressSink {
    move |event| {
        let _ = tx.send(event);
    }
}

/// Sink that ignores every event.
pub fn discard(_event: ProgressEvent) {}
