//! Verification helpers for transaction tests
//!
//! Each helper returns a [`VerificationError`] describing the first
//! mismatch instead of panicking, so tests can `unwrap()` with a readable
//! message.

use std::collections::HashSet;
use thiserror::Error;
use yangconf_tree::NodeId;
use yangconf_txn::{Phase, TreeDiff, TxnEvent, TxnEventKind};

use crate::recorder::CallLog;

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Expected call sequence {expected:?}, got {actual:?}")]
    SequenceMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Node {node} of the {side} tree appears in both {first} and {second}")]
    OverlappingDiff {
        side: &'static str,
        node: NodeId,
        first: &'static str,
        second: &'static str,
    },

    #[error("Node {node} appears more than once in {vector}")]
    DuplicateDiffEntry { vector: &'static str, node: NodeId },

    #[error("Diff is not symmetric: {0}")]
    Asymmetric(String),

    #[error("Expected {expected} {kind} event(s), found {actual}")]
    EventCountMismatch {
        kind: TxnEventKind,
        expected: usize,
        actual: usize,
    },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Verifies the complete call history, rendered as `phase(subscriber)`.
pub fn verify_sequence(log: &CallLog, expected: &[&str]) -> VerifyResult<()> {
    let actual = log.rendered();
    if actual != expected {
        return Err(VerificationError::SequenceMismatch {
            expected: expected.iter().map(|s| s.to_string()).collect(),
            actual,
        });
    }
    Ok(())
}

/// Verifies the subscribers called in one phase, in order.
pub fn verify_phase_calls(log: &CallLog, phase: Phase, expected: &[&str]) -> VerifyResult<()> {
    let actual = log.subscribers_in(phase);
    if actual != expected {
        return Err(VerificationError::SequenceMismatch {
            expected: expected.iter().map(|s| format!("{}({})", phase, s)).collect(),
            actual: actual.iter().map(|s| format!("{}({})", phase, s)).collect(),
        });
    }
    Ok(())
}

/// Verifies that no node appears twice in one vector or in more than one
/// of deleted/added/changed.
pub fn verify_exclusive(diff: &TreeDiff) -> VerifyResult<()> {
    let vectors: [(&'static str, &[NodeId]); 4] = [
        ("deleted", diff.deleted()),
        ("added", diff.added()),
        ("changed_source", diff.changed_source()),
        ("changed_target", diff.changed_target()),
    ];
    for (vector, ids) in vectors {
        let mut seen = HashSet::new();
        if let Some(node) = ids.iter().find(|id| !seen.insert(**id)) {
            return Err(VerificationError::DuplicateDiffEntry { vector, node: *node });
        }
    }

    let overlap = |side, first, a: &[NodeId], second, b: &[NodeId]| {
        let a: HashSet<_> = a.iter().collect();
        match b.iter().find(|id| a.contains(id)) {
            Some(node) => Err(VerificationError::OverlappingDiff {
                side,
                node: *node,
                first,
                second,
            }),
            None => Ok(()),
        }
    };
    overlap("source", "deleted", diff.deleted(), "changed", diff.changed_source())?;
    overlap("target", "added", diff.added(), "changed", diff.changed_target())
}

/// Verifies that `backward` (B to A) mirrors `forward` (A to B).
///
/// Deleted and added swap roles exactly, in order. Changed pairs swap
/// sides; their order may differ when list entries were reordered.
pub fn verify_symmetric(forward: &TreeDiff, backward: &TreeDiff) -> VerifyResult<()> {
    if forward.deleted() != backward.added() {
        return Err(VerificationError::Asymmetric(format!(
            "deleted {:?} != reverse added {:?}",
            forward.deleted(),
            backward.added()
        )));
    }
    if forward.added() != backward.deleted() {
        return Err(VerificationError::Asymmetric(format!(
            "added {:?} != reverse deleted {:?}",
            forward.added(),
            backward.deleted()
        )));
    }
    let mut pairs: Vec<(NodeId, NodeId)> = forward.changed_pairs().collect();
    let mut mirrored: Vec<(NodeId, NodeId)> =
        backward.changed_pairs().map(|(s, t)| (t, s)).collect();
    pairs.sort();
    mirrored.sort();
    if pairs != mirrored {
        return Err(VerificationError::Asymmetric(format!(
            "changed {:?} != reverse changed {:?}",
            pairs, mirrored
        )));
    }
    Ok(())
}

/// Verifies the number of events of one kind.
pub fn verify_event_count(
    events: &[TxnEvent],
    kind: TxnEventKind,
    expected: usize,
) -> VerifyResult<()> {
    let actual = events.iter().filter(|e| e.kind == kind).count();
    if actual != expected {
        return Err(VerificationError::EventCountMismatch {
            kind,
            expected,
            actual,
        });
    }
    Ok(())
}
