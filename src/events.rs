//! Diagnostic events emitted while splitting a message.
//!
//! The extractor and rebuilder never log directly; they report to an
//! [`EventSink`] handed in by the caller. [`TracingSink`] forwards events to
//! `tracing`, [`MemorySink`] keeps them for inspection.

use std::path::PathBuf;
use std::sync::Mutex;

use crate::model::message::PartPath;

/// Something noteworthy that happened to one part.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SplitEvent {
    /// An attachment was decoded and written to disk.
    AttachmentSaved {
        part: PartPath,
        path: PathBuf,
        size: u64,
    },

    /// The extractor skipped a part with an unparseable `Content-Disposition`.
    DispositionInvalid { part: PartPath, error: String },

    /// A `multipart/*` part could not be split and is treated as opaque.
    NestedMultipartUnreadable { part: PartPath, error: String },

    /// The rebuilder dropped an attachment part.
    PartRemoved { part: PartPath, filename: String },

    /// The rebuilder copied a part into the new message.
    PartRetained { part: PartPath },
}

/// Receiver for [`SplitEvent`]s.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SplitEvent);
}

/// Forwards every event to `tracing` with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: SplitEvent) {
        match event {
            SplitEvent::AttachmentSaved { part, path, size } => {
                tracing::info!(part = %part, path = %path.display(), size, "Saved attachment");
            }
            SplitEvent::DispositionInvalid { part, error } => {
                tracing::warn!(part = %part, error = %error, "Failed to parse Content-Disposition, skipping part");
            }
            SplitEvent::NestedMultipartUnreadable { part, error } => {
                tracing::warn!(part = %part, error = %error, "Unreadable nested multipart, keeping it as is");
            }
            SplitEvent::PartRemoved { part, filename } => {
                tracing::debug!(part = %part, filename = %filename, "Removed attachment part");
            }
            SplitEvent::PartRetained { part } => {
                tracing::trace!(part = %part, "Retained part");
            }
        }
    }
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SplitEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far.
    pub fn events(&self) -> Vec<SplitEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: SplitEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
