//! Transaction phases and states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named point in the transaction lifecycle where subscribers are called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Begin,
    Validate,
    Complete,
    Commit,
    CommitDone,
    End,
    Revert,
    Abort,
}

impl Phase {
    /// Phases of a successful commit, in order.
    pub const COMMIT_SEQUENCE: [Phase; 6] = [
        Phase::Begin,
        Phase::Validate,
        Phase::Complete,
        Phase::Commit,
        Phase::CommitDone,
        Phase::End,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Begin => "begin",
            Phase::Validate => "validate",
            Phase::Complete => "complete",
            Phase::Commit => "commit",
            Phase::CommitDone => "commit_done",
            Phase::End => "end",
            Phase::Revert => "revert",
            Phase::Abort => "abort",
        }
    }

    /// Name of the subscriber extension point invoked for this phase.
    pub fn hook_name(&self) -> &'static str {
        match self {
            Phase::Begin => "transaction_begin",
            Phase::Validate => "transaction_validate",
            Phase::Complete => "transaction_complete",
            Phase::Commit => "transaction_commit",
            Phase::CommitDone => "transaction_commit_done",
            Phase::End => "transaction_end",
            Phase::Revert => "transaction_revert",
            Phase::Abort => "transaction_abort",
        }
    }

    /// Returns true if the first subscriber failure stops the phase.
    ///
    /// Revert, abort and commit-done are sweeps: every subscriber is called.
    pub fn is_fail_fast(&self) -> bool {
        !matches!(self, Phase::CommitDone | Phase::Revert | Phase::Abort)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a [`Transaction`](crate::Transaction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnState {
    /// Created, diff computed, no subscriber called yet.
    Init,
    Begin,
    Validate,
    Complete,
    Commit,
    CommitDone,
    /// Terminal: the end phase has run.
    End,
    /// Terminal: the abort sweep has run.
    Aborted,
}

impl TxnState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxnState::End | TxnState::Aborted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TxnState::Init => "init",
            TxnState::Begin => "begin",
            TxnState::Validate => "validate",
            TxnState::Complete => "complete",
            TxnState::Commit => "commit",
            TxnState::CommitDone => "commit_done",
            TxnState::End => "end",
            TxnState::Aborted => "aborted",
        }
    }
}

impl From<Phase> for TxnState {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Begin => TxnState::Begin,
            Phase::Validate => TxnState::Validate,
            Phase::Complete => TxnState::Complete,
            Phase::Commit | Phase::Revert => TxnState::Commit,
            Phase::CommitDone => TxnState::CommitDone,
            Phase::End => TxnState::End,
            Phase::Abort => TxnState::Aborted,
        }
    }
}

impl fmt::Display for TxnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
