//! Error types for the transaction engine.
//!
//! Two layers of errors exist:
//!
//! - [`PhaseError`]: what a subscriber callback returns when it fails.
//! - [`TxnError`]: what the engine returns to its caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use yangconf_tree::TreeError;

use crate::event::TxnEvent;
use crate::phase::{Phase, TxnState};
use crate::transaction::TxnId;

/// Result type for engine operations.
pub type TxnResult<T> = Result<T, TxnError>;

/// Result type for subscriber callbacks.
pub type PhaseResult = Result<(), PhaseError>;

/// Classification a subscriber attaches to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration content rejected
    Config,
    /// Backing store failure
    Database,
    /// Protocol-level failure towards a peer or device
    Protocol,
    /// Subscriber-internal failure
    Plugin,
    /// Resource leak or exhaustion
    Resource,
    /// Data does not match the schema
    Schema,
    /// Operating system call failed
    System,
    /// Unexpected internal state
    Internal,
    /// Unrecoverable condition
    Fatal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Config => "config",
            ErrorCategory::Database => "database",
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Plugin => "plugin",
            ErrorCategory::Resource => "resource",
            ErrorCategory::Schema => "schema",
            ErrorCategory::System => "system",
            ErrorCategory::Internal => "internal",
            ErrorCategory::Fatal => "fatal",
        }
    }

    /// Returns true for categories that indicate the subscriber is unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorCategory::Fatal | ErrorCategory::Internal)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure returned by a subscriber callback.
///
/// A failure without a category is a *silent* failure: the subscriber
/// signalled failure but did not describe it. The engine treats it like any
/// other failure and additionally warns about the offending subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseError {
    category: Option<ErrorCategory>,
    reason: Option<String>,
}

impl PhaseError {
    /// Creates a described failure.
    pub fn new(category: ErrorCategory, reason: impl Into<String>) -> Self {
        Self {
            category: Some(category),
            reason: Some(reason.into()),
        }
    }

    /// Creates a failure that carries no description.
    pub fn silent() -> Self {
        Self {
            category: None,
            reason: None,
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Config, reason)
    }

    pub fn plugin(reason: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Plugin, reason)
    }

    pub fn resource(reason: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Resource, reason)
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Internal, reason)
    }

    pub fn category(&self) -> Option<ErrorCategory> {
        self.category
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Returns true if the failure was signalled without a category.
    pub fn is_silent(&self) -> bool {
        self.category.is_none()
    }

    pub fn is_fatal(&self) -> bool {
        self.category.is_some_and(|c| c.is_fatal())
    }
}

impl fmt::Display for PhaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.category, &self.reason) {
            (Some(category), Some(reason)) => write!(f, "{category}: {reason}"),
            (Some(category), None) => write!(f, "{category} error"),
            (None, Some(reason)) => write!(f, "{reason}"),
            (None, None) => f.write_str("failed without a reason"),
        }
    }
}

impl std::error::Error for PhaseError {}

/// A phase stopped because one subscriber failed.
#[derive(Debug, Clone)]
pub struct PhaseFailure {
    /// Phase that failed
    pub phase: Phase,
    /// Registration index of the failing subscriber
    pub index: usize,
    /// Display name of the failing subscriber
    pub subscriber: String,
    /// The subscriber's (or the monitor's) error
    pub error: PhaseError,
    /// Warning events recorded during the whole attempt, recovery included
    pub events: Vec<TxnEvent>,
}

impl PhaseFailure {
    pub(crate) fn new(
        phase: Phase,
        index: usize,
        subscriber: impl Into<String>,
        error: PhaseError,
    ) -> Self {
        Self {
            phase,
            index,
            subscriber: subscriber.into(),
            error,
            events: Vec::new(),
        }
    }
}

/// Errors returned by the transaction engine.
#[derive(Debug, Error)]
pub enum TxnError {
    /// The trees could not be diffed (schema inconsistency).
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// A fail-fast phase failed; recovery (revert/abort) has already run.
    #[error(
        "{} phase failed at subscriber {} ('{}'): {}",
        .0.phase, .0.index, .0.subscriber, .0.error
    )]
    PhaseFailed(Box<PhaseFailure>),

    /// The transaction is not in a state that allows the operation.
    #[error("transaction {txn_id} cannot {operation} from state {state}")]
    InvalidState {
        txn_id: TxnId,
        state: TxnState,
        operation: &'static str,
    },

    #[error("subscriber '{name}' is already registered")]
    DuplicateSubscriber { name: String },

    #[error("engine configuration error: {message}")]
    Config { message: String },

    /// A supplied diff does not describe the transaction trees.
    #[error("invalid diff: {reason}")]
    InvalidDiff { reason: String },
}

impl TxnError {
    pub fn config(message: impl Into<String>) -> Self {
        TxnError::Config {
            message: message.into(),
        }
    }

    pub fn invalid_diff(reason: impl Into<String>) -> Self {
        TxnError::InvalidDiff {
            reason: reason.into(),
        }
    }

    pub fn invalid_state(txn_id: TxnId, state: TxnState, operation: &'static str) -> Self {
        TxnError::InvalidState {
            txn_id,
            state,
            operation,
        }
    }

    /// Returns the phase failure, if this error is one.
    pub fn phase_failure(&self) -> Option<&PhaseFailure> {
        match self {
            TxnError::PhaseFailed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn is_schema_inconsistency(&self) -> bool {
        matches!(self, TxnError::Tree(e) if e.is_schema_inconsistency())
    }
}

impl From<PhaseFailure> for TxnError {
    fn from(failure: PhaseFailure) -> Self {
        TxnError::PhaseFailed(Box::new(failure))
    }
}
