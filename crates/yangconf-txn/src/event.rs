//! Structured warning events raised while driving a transaction.
//!
//! Every event is logged at `warn` level under the `txn` target and kept in
//! the report handed back to the caller. Events never change the control
//! flow: the engine always has a defined next action when one is raised.
//!
//! | Kind | Raised when |
//! |------|-------------|
//! | `SILENT_FAILURE` | a callback failed without a category |
//! | `REVERT_FAILED` | a revert callback failed (sweep continues) |
//! | `ABORT_FAILED` | an abort callback failed (sweep continues) |
//! | `COMMIT_DONE_FAILED` | a commit-done callback failed (commit stands) |
//! | `END_FAILED` | an end callback failed (commit stands) |
//! | `MONITOR_FAULT` | the resource monitor flagged an invocation |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ErrorCategory, PhaseError};
use crate::monitor::Checkpoint;
use crate::phase::Phase;
use crate::transaction::TxnId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxnEventKind {
    SilentFailure,
    RevertFailed,
    AbortFailed,
    CommitDoneFailed,
    EndFailed,
    MonitorFault,
}

impl TxnEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnEventKind::SilentFailure => "SILENT_FAILURE",
            TxnEventKind::RevertFailed => "REVERT_FAILED",
            TxnEventKind::AbortFailed => "ABORT_FAILED",
            TxnEventKind::CommitDoneFailed => "COMMIT_DONE_FAILED",
            TxnEventKind::EndFailed => "END_FAILED",
            TxnEventKind::MonitorFault => "MONITOR_FAULT",
        }
    }

    /// Event kind for a failure inside a best-effort or post-commit phase.
    pub(crate) fn for_sweep(phase: Phase) -> Self {
        match phase {
            Phase::Revert => TxnEventKind::RevertFailed,
            Phase::Abort => TxnEventKind::AbortFailed,
            Phase::CommitDone => TxnEventKind::CommitDoneFailed,
            _ => TxnEventKind::EndFailed,
        }
    }
}

impl fmt::Display for TxnEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One warning-level occurrence during a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxnEvent {
    pub timestamp: DateTime<Utc>,
    pub txn_id: TxnId,
    pub kind: TxnEventKind,
    pub phase: Phase,
    /// Registration index of the subscriber
    pub index: usize,
    /// Display name of the subscriber
    pub subscriber: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ErrorCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<Checkpoint>,
}

impl TxnEvent {
    pub fn new(
        kind: TxnEventKind,
        txn_id: TxnId,
        phase: Phase,
        index: usize,
        subscriber: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            txn_id,
            kind,
            phase,
            index,
            subscriber: subscriber.into(),
            reason: reason.into(),
            category: None,
            checkpoint: None,
        }
    }

    /// Builds the event for a failed callback, taking reason and category
    /// from the error.
    pub(crate) fn from_error(
        kind: TxnEventKind,
        txn_id: TxnId,
        phase: Phase,
        index: usize,
        subscriber: &str,
        error: &PhaseError,
    ) -> Self {
        let mut event = Self::new(kind, txn_id, phase, index, subscriber, error.to_string());
        event.category = error.category();
        event
    }

    pub fn with_checkpoint(mut self, checkpoint: Checkpoint) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization_failed","message":"{}"}}"#, e))
    }
}

/// Logs a [`TxnEvent`] at warning level with its JSON rendering attached.
///
/// # Usage
/// ```ignore
/// let event = TxnEvent::new(TxnEventKind::AbortFailed, txn.id(), Phase::Abort, 1, "acl", "busy");
/// txn_event!(event);
/// ```
#[macro_export]
macro_rules! txn_event {
    ($event:expr) => {{
        let event: &$crate::TxnEvent = &$event;
        tracing::warn!(
            target: "txn",
            txn_id = %event.txn_id,
            kind = %event.kind,
            phase = %event.phase,
            subscriber = %event.subscriber,
            reason = %event.reason,
            event_json = %event.to_json(),
            "TXN {}: subscriber '{}' in {} ({})",
            event.kind,
            event.subscriber,
            event.phase,
            event.reason
        );
    }};
}

/// Warning events accumulated over one engine operation.
#[derive(Debug)]
pub(crate) struct EventLog {
    txn_id: TxnId,
    events: Vec<TxnEvent>,
}

impl EventLog {
    pub(crate) fn new(txn_id: TxnId) -> Self {
        Self {
            txn_id,
            events: Vec::new(),
        }
    }

    pub(crate) fn txn_id(&self) -> TxnId {
        self.txn_id
    }

    pub(crate) fn record(&mut self, event: TxnEvent) {
        txn_event!(event);
        self.events.push(event);
    }

    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }

    pub(crate) fn into_events(self) -> Vec<TxnEvent> {
        self.events
    }
}
