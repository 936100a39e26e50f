// src/core/pipeline.rs
//! Burst coalescing and ingestion guards in front of the history store
//!
//! Clipboard owners routinely fire several change notifications for one
//! logical copy. The `Debouncer` collapses such bursts into a single deferred
//! read, and the `IngestionPipeline` applies the size and identity guards
//! before anything touches the store.

use std::time::Duration;

use tokio::time::Instant;

use crate::core::history::HistoryStore;

/// Quiet interval a burst must respect before the payload is read once.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(125);

/// Payloads above this UTF-8 byte length are dropped without ingestion.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 500 * 1024;

/// Explicit deadline state for coalescing change notifications.
///
/// Every `signal` unconditionally restarts the quiet period; the owner polls
/// `deadline` from its event loop and fires at most once per quiescent burst.
/// Scheduling, restart and firing all happen on that one owning task.
#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            deadline: None,
        }
    }

    /// Restart the quiet period, cancelling any pending fire.
    pub fn signal(&mut self) {
        self.deadline = Some(Instant::now() + self.quiet);
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Clear the pending deadline; true when one was armed.
    pub fn disarm(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

/// What the pipeline decided about one observed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The store accepted the payload as its newest entry.
    Added,
    /// Payload exceeded the byte limit and was dropped untouched.
    Oversized(usize),
    /// Byte-identical to the previously read payload; skipped.
    UnchangedPayload,
    /// The store declined it (blank after trim, or a suppressed echo).
    RejectedByStore,
}

/// Size and identity guards applied before `HistoryStore::add`.
pub struct IngestionPipeline {
    max_payload_bytes: usize,
    last_seen: Option<String>,
}

impl IngestionPipeline {
    pub fn new(max_payload_bytes: usize) -> Self {
        Self {
            max_payload_bytes,
            last_seen: None,
        }
    }

    /// Run one payload through the guards and, when they pass, the store.
    ///
    /// The identity cache records every size-accepted payload that differs
    /// from its predecessor, independent of what the store then decides; the
    /// oversized drop leaves it untouched.
    pub fn ingest(&mut self, store: &mut HistoryStore, payload: &str) -> IngestOutcome {
        if payload.len() > self.max_payload_bytes {
            return IngestOutcome::Oversized(payload.len());
        }
        if self.last_seen.as_deref() == Some(payload) {
            return IngestOutcome::UnchangedPayload;
        }
        self.last_seen = Some(payload.to_string());

        if store.add(payload) {
            IngestOutcome::Added
        } else {
            IngestOutcome::RejectedByStore
        }
    }
}

impl Default for IngestionPipeline {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD_BYTES)
    }
}
