//! Transaction record.
//!
//! A [`Transaction`] owns the source and target trees of one commit or
//! validate attempt together with their diff. It is created fresh for every
//! attempt, driven once by the engine, and dropped afterwards; dropping it
//! releases both tree arenas at once.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use yangconf_tree::{keyed_path, ConfigTree, NodeId, Schema};

use crate::diff::{diff_trees, TreeDiff};
use crate::error::{TxnError, TxnResult};
use crate::phase::TxnState;

/// Process-unique transaction identifier, used for log correlation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxnId(u64);

impl TxnId {
    pub const fn from_raw(id: u64) -> Self {
        TxnId(id)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic source of [`TxnId`]s, starting at 0.
#[derive(Debug, Default)]
pub struct TxnIdAllocator {
    next: AtomicU64,
}

impl TxnIdAllocator {
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    /// The process-wide allocator used by [`Transaction::create`].
    pub fn global() -> &'static TxnIdAllocator {
        static GLOBAL: TxnIdAllocator = TxnIdAllocator::new();
        &GLOBAL
    }

    /// Returns the next id. Ids are never reused.
    pub fn allocate(&self) -> TxnId {
        TxnId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Which tree of a transaction a node id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Source,
    Target,
}

/// How a node takes part in the diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Deleted,
    Added,
    Changed,
}

/// Diff sizes of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnSummary {
    pub txn_id: TxnId,
    pub deleted: usize,
    pub added: usize,
    pub changed: usize,
}

impl fmt::Display for TxnSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "transaction {}: {} deleted, {} added, {} changed",
            self.txn_id, self.deleted, self.added, self.changed
        )
    }
}

/// One commit/validate attempt: two trees, their diff and an opaque
/// caller argument handed to every subscriber.
pub struct Transaction {
    id: TxnId,
    state: TxnState,
    source: ConfigTree,
    target: ConfigTree,
    diff: TreeDiff,
    argument: Option<Box<dyn Any + Send + Sync>>,
}

impl Transaction {
    /// Creates a transaction with an id from the process-wide allocator.
    ///
    /// The diff starts empty; populate it with [`compute_diff`](Self::compute_diff)
    /// or [`set_diff`](Self::set_diff).
    pub fn create(source: ConfigTree, target: ConfigTree) -> Self {
        Self::create_with(TxnIdAllocator::global(), source, target)
    }

    /// Creates a transaction with an id from `ids`.
    pub fn create_with(ids: &TxnIdAllocator, source: ConfigTree, target: ConfigTree) -> Self {
        Self {
            id: ids.allocate(),
            state: TxnState::Init,
            source,
            target,
            diff: TreeDiff::new(),
            argument: None,
        }
    }

    /// Attaches the caller argument passed through to subscribers.
    pub fn with_argument<T: Any + Send + Sync>(mut self, argument: T) -> Self {
        self.argument = Some(Box::new(argument));
        self
    }

    /// Returns the caller argument if it has type `T`.
    pub fn argument<T: Any>(&self) -> Option<&T> {
        self.argument.as_deref()?.downcast_ref::<T>()
    }

    /// Diffs the owned trees and stores the result.
    ///
    /// Only allowed before any phase has run.
    pub fn compute_diff(&mut self, schema: &dyn Schema) -> TxnResult<()> {
        self.ensure_init("compute diff")?;
        self.diff = diff_trees(schema, &self.source, &self.target)?;
        Ok(())
    }

    /// Stores an externally computed diff.
    ///
    /// Only allowed before any phase has run. The diff must refer to nodes of
    /// this transaction's trees; see [`TreeDiff::validate`].
    pub fn set_diff(&mut self, diff: TreeDiff) -> TxnResult<()> {
        self.ensure_init("set diff")?;
        diff.validate(&self.source, &self.target)?;
        self.diff = diff;
        Ok(())
    }

    fn ensure_init(&self, operation: &'static str) -> TxnResult<()> {
        if self.state != TxnState::Init {
            return Err(TxnError::invalid_state(self.id, self.state, operation));
        }
        Ok(())
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn state(&self) -> TxnState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: TxnState) {
        self.state = state;
    }

    pub fn source(&self) -> &ConfigTree {
        &self.source
    }

    pub fn target(&self) -> &ConfigTree {
        &self.target
    }

    pub fn diff(&self) -> &TreeDiff {
        &self.diff
    }

    /// Source nodes absent from the target.
    pub fn deleted(&self) -> &[NodeId] {
        self.diff.deleted()
    }

    /// Target nodes absent from the source.
    pub fn added(&self) -> &[NodeId] {
        self.diff.added()
    }

    pub fn changed_source(&self) -> &[NodeId] {
        self.diff.changed_source()
    }

    pub fn changed_target(&self) -> &[NodeId] {
        self.diff.changed_target()
    }

    /// Classifies a node of one of the two trees.
    ///
    /// Only the reported positions are classified; descendants of an added
    /// or deleted subtree root return `None`.
    pub fn change_kind(&self, side: Side, node: NodeId) -> Option<ChangeKind> {
        let (removed_or_added, changed, kind) = match side {
            Side::Source => (self.diff.deleted(), self.diff.changed_source(), ChangeKind::Deleted),
            Side::Target => (self.diff.added(), self.diff.changed_target(), ChangeKind::Added),
        };
        if removed_or_added.contains(&node) {
            Some(kind)
        } else if changed.contains(&node) {
            Some(ChangeKind::Changed)
        } else {
            None
        }
    }

    pub fn summary(&self) -> TxnSummary {
        TxnSummary {
            txn_id: self.id,
            deleted: self.diff.deleted().len(),
            added: self.diff.added().len(),
            changed: self.diff.changed_source().len(),
        }
    }

    /// Renders the diff one change per line:
    /// `- path` (deleted), `+ path` (added), `~ path: old -> new` (changed).
    pub fn describe(&self, schema: &dyn Schema) -> String {
        let mut lines = vec![self.summary().to_string()];
        for id in self.diff.deleted() {
            lines.push(format!("- {}", keyed_path(schema, &self.source, *id)));
        }
        for id in self.diff.added() {
            lines.push(format!("+ {}", keyed_path(schema, &self.target, *id)));
        }
        for (s, t) in self.diff.changed_pairs() {
            lines.push(format!(
                "~ {}: {} -> {}",
                keyed_path(schema, &self.source, s),
                self.source.value(s).unwrap_or("<none>"),
                self.target.value(t).unwrap_or("<none>"),
            ));
        }
        lines.join("\n")
    }

    /// Releases the transaction, handing back `(source, target)`.
    pub fn into_trees(self) -> (ConfigTree, ConfigTree) {
        (self.source, self.target)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("diff", &self.diff)
            .field("has_argument", &self.argument.is_some())
            .finish_non_exhaustive()
    }
}
