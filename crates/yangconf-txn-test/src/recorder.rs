//! Recording subscribers
//!
//! Every [`RecordingSubscriber`] appends to a shared [`CallLog`] so a test
//! can assert the exact cross-subscriber call order.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use yangconf_txn::{Phase, PhaseError, PhaseResult, Subscriber, Transaction, TxnSummary};

/// One subscriber callback invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub phase: Phase,
    pub subscriber: String,
    /// Diff counts the subscriber saw
    pub summary: TxnSummary,
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.phase, self.subscriber)
    }
}

/// Call history shared by a group of subscribers.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Call>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, call: Call) {
        self.lock().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().clone()
    }

    /// Calls rendered as `phase(subscriber)`.
    pub fn rendered(&self) -> Vec<String> {
        self.lock().iter().map(ToString::to_string).collect()
    }

    /// Subscribers called in `phase`, in call order.
    pub fn subscribers_in(&self, phase: Phase) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|c| c.phase == phase)
            .map(|c| c.subscriber.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

/// Subscriber that records every callback and fails where scripted.
///
/// By default it implements every phase. [`only`](Self::only) narrows it to
/// a subset; the other phases then behave like absent callbacks: they are
/// not recorded and the engine does not monitor them.
pub struct RecordingSubscriber {
    name: String,
    log: CallLog,
    failures: HashMap<Phase, PhaseError>,
    phases: Option<HashSet<Phase>>,
}

impl RecordingSubscriber {
    pub fn new(name: impl Into<String>, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            failures: HashMap::new(),
            phases: None,
        }
    }

    /// Fails `phase` with a plugin-category error.
    pub fn fail_on(self, phase: Phase, reason: impl Into<String>) -> Self {
        self.fail_with(phase, PhaseError::plugin(reason))
    }

    /// Fails `phase` without describing the error.
    pub fn fail_silently_on(self, phase: Phase) -> Self {
        self.fail_with(phase, PhaseError::silent())
    }

    pub fn fail_with(mut self, phase: Phase, error: PhaseError) -> Self {
        self.failures.insert(phase, error);
        self
    }

    /// Implements only the given phases.
    pub fn only(mut self, phases: impl IntoIterator<Item = Phase>) -> Self {
        self.phases = Some(phases.into_iter().collect());
        self
    }

    fn record(&self, phase: Phase, txn: &Transaction) -> PhaseResult {
        if !self.handles(phase) {
            return Ok(());
        }
        self.log.push(Call {
            phase,
            subscriber: self.name.clone(),
            summary: txn.summary(),
        });
        match self.failures.get(&phase) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl Subscriber for RecordingSubscriber {
    fn name(&self) -> &str {
        &self.name
    }

    fn handles(&self, phase: Phase) -> bool {
        self.phases.as_ref().map_or(true, |phases| phases.contains(&phase))
    }

    fn begin(&mut self, txn: &Transaction) -> PhaseResult {
        self.record(Phase::Begin, txn)
    }

    fn validate(&mut self, txn: &Transaction) -> PhaseResult {
        self.record(Phase::Validate, txn)
    }

    fn complete(&mut self, txn: &Transaction) -> PhaseResult {
        self.record(Phase::Complete, txn)
    }

    fn commit(&mut self, txn: &Transaction) -> PhaseResult {
        self.record(Phase::Commit, txn)
    }

    fn commit_done(&mut self, txn: &Transaction) -> PhaseResult {
        self.record(Phase::CommitDone, txn)
    }

    fn end(&mut self, txn: &Transaction) -> PhaseResult {
        self.record(Phase::End, txn)
    }

    fn revert(&mut self, txn: &Transaction) -> PhaseResult {
        self.record(Phase::Revert, txn)
    }

    fn abort(&mut self, txn: &Transaction) -> PhaseResult {
        self.record(Phase::Abort, txn)
    }
}
