//! Subscriber trait.

use crate::error::PhaseResult;
use crate::phase::Phase;
use crate::transaction::Transaction;

/// An independently registered unit of logic called at each transaction
/// phase.
///
/// Every phase method has a default that succeeds without doing anything, so
/// a subscriber overrides only the phases it cares about. A subscriber that
/// also overrides [`handles`](Self::handles) lets the engine skip the other
/// hooks entirely, resource monitoring included.
///
/// # Lifecycle
///
/// 1. `begin`, `validate`, `complete`: inspect the diff, reject bad
///    configuration. Nothing durable may change here.
/// 2. `commit`: apply the change. The only phase with durable effects.
/// 3. `commit_done`: post-commit notification; failure cannot undo the commit.
/// 4. `end` on success, or `revert` (only if this subscriber committed and a
///    later one failed) followed by `abort` on failure.
///
/// The transaction trees are shared and read-only in every phase.
///
/// # Example
///
/// ```
/// use yangconf_txn::{PhaseError, PhaseResult, Subscriber, Transaction};
///
/// struct MtuGuard;
///
/// impl Subscriber for MtuGuard {
///     fn name(&self) -> &str {
///         "mtu-guard"
///     }
///
///     fn validate(&mut self, txn: &Transaction) -> PhaseResult {
///         for id in txn.changed_target() {
///             let tree = txn.target();
///             if tree.name(*id) == "mtu" && tree.value(*id) == Some("0") {
///                 return Err(PhaseError::config("mtu must be positive"));
///             }
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Subscriber: Send {
    /// Returns the display name used in logs and failure reports.
    fn name(&self) -> &str;

    /// Returns false for phases this subscriber has no hook for.
    ///
    /// The engine neither calls nor monitors an unhandled phase.
    fn handles(&self, _phase: Phase) -> bool {
        true
    }

    fn begin(&mut self, _txn: &Transaction) -> PhaseResult {
        Ok(())
    }

    fn validate(&mut self, _txn: &Transaction) -> PhaseResult {
        Ok(())
    }

    fn complete(&mut self, _txn: &Transaction) -> PhaseResult {
        Ok(())
    }

    fn commit(&mut self, _txn: &Transaction) -> PhaseResult {
        Ok(())
    }

    fn commit_done(&mut self, _txn: &Transaction) -> PhaseResult {
        Ok(())
    }

    fn end(&mut self, _txn: &Transaction) -> PhaseResult {
        Ok(())
    }

    /// Undoes a successful `commit` after a later subscriber failed to commit.
    fn revert(&mut self, _txn: &Transaction) -> PhaseResult {
        Ok(())
    }

    fn abort(&mut self, _txn: &Transaction) -> PhaseResult {
        Ok(())
    }
}

/// Calls the method of `subscriber` that handles `phase`.
pub(crate) fn dispatch(
    subscriber: &mut dyn Subscriber,
    phase: Phase,
    txn: &Transaction,
) -> PhaseResult {
    match phase {
        Phase::Begin => subscriber.begin(txn),
        Phase::Validate => subscriber.validate(txn),
        Phase::Complete => subscriber.complete(txn),
        Phase::Commit => subscriber.commit(txn),
        Phase::CommitDone => subscriber.commit_done(txn),
        Phase::End => subscriber.end(txn),
        Phase::Revert => subscriber.revert(txn),
        Phase::Abort => subscriber.abort(txn),
    }
}
