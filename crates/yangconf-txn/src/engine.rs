//! Phase driver.
//!
//! [`TxnEngine`] owns the subscriber registry and the resource monitor and
//! drives transactions through the phase state machine:
//!
//! ```text
//! INIT -> BEGIN -> VALIDATE -> COMPLETE -> COMMIT -> COMMIT_DONE -> END
//! begin/validate/complete failure        -> ABORT
//! commit failure at k -> REVERT(k-1..0)  -> ABORT
//! commit_done failure -> warning, continue to END
//! ```

use serde::Serialize;
use tracing::{debug, info, trace, warn};
use yangconf_tree::{ConfigTree, Schema};

use crate::config::EngineConfig;
use crate::error::{ErrorCategory, PhaseError, PhaseFailure, PhaseResult, TxnError, TxnResult};
use crate::event::{EventLog, TxnEvent, TxnEventKind};
use crate::monitor::{Checkpoint, Fault, ResourceMonitor};
use crate::phase::{Phase, TxnState};
use crate::registry::SubscriberRegistry;
use crate::subscriber::{dispatch, Subscriber};
use crate::transaction::{Transaction, TxnId, TxnIdAllocator, TxnSummary};

const VALIDATE_SEQUENCE: [Phase; 3] = [Phase::Begin, Phase::Validate, Phase::Complete];

/// Outcome of a top-level engine operation that succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct TxnReport {
    pub txn_id: TxnId,
    /// State the transaction was left in
    pub state: TxnState,
    pub summary: TxnSummary,
    /// Warning events raised along the way; none of them changed the outcome
    pub events: Vec<TxnEvent>,
}

impl TxnReport {
    pub fn has_warnings(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn events_of(&self, kind: TxnEventKind) -> impl Iterator<Item = &TxnEvent> + '_ {
        self.events.iter().filter(move |e| e.kind == kind)
    }
}

/// Drives transactions over an ordered set of subscribers.
pub struct TxnEngine {
    config: EngineConfig,
    registry: SubscriberRegistry,
    monitor: Box<dyn ResourceMonitor>,
    ids: TxnIdAllocator,
}

impl TxnEngine {
    /// Creates an engine with the default configuration (no monitoring).
    pub fn new() -> Self {
        Self::from_config(EngineConfig::default())
    }

    pub fn from_config(config: EngineConfig) -> Self {
        let monitor = config.build_monitor();
        debug!(monitor = ?config.monitor, "Creating transaction engine");
        Self {
            config,
            registry: SubscriberRegistry::new(),
            monitor,
            ids: TxnIdAllocator::new(),
        }
    }

    /// Replaces the configured resource monitor.
    pub fn with_monitor(mut self, monitor: impl ResourceMonitor + 'static) -> Self {
        self.monitor = Box::new(monitor);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Registers a subscriber at the end of the call order.
    pub fn register(&mut self, subscriber: impl Subscriber + 'static) -> TxnResult<usize> {
        self.registry.register(Box::new(subscriber))
    }

    /// Creates a transaction over `source` and `target` and computes its diff.
    ///
    /// A schema-inconsistent tree fails here, before any subscriber runs.
    pub fn create_transaction(
        &self,
        source: ConfigTree,
        target: ConfigTree,
        schema: &dyn Schema,
    ) -> TxnResult<Transaction> {
        let mut txn = Transaction::create_with(&self.ids, source, target);
        if let Err(e) = txn.compute_diff(schema) {
            warn!(txn_id = %txn.id(), error = %e, "Cannot diff configuration trees");
            return Err(e);
        }
        info!(txn_id = %txn.id(), "Created {}", txn.summary());
        if self.config.log_diff {
            debug!(txn_id = %txn.id(), "Changes:\n{}", txn.describe(schema));
        }
        Ok(txn)
    }

    /// Runs begin, validate and complete, then end on success or abort on
    /// failure. Nothing is committed.
    pub fn validate(&mut self, txn: &mut Transaction) -> TxnResult<TxnReport> {
        ensure_init(txn, "validate")?;
        info!(txn_id = %txn.id(), subscribers = self.registry.len(), "Validating transaction");
        let mut log = EventLog::new(txn.id());

        for phase in VALIDATE_SEQUENCE {
            if let Err(failure) = self.drive_phase(phase, txn, &mut log) {
                return Err(self.fail(txn, failure, log));
            }
            txn.set_state(phase.into());
        }
        self.finish(txn, &mut log);
        Ok(self.report(txn, log))
    }

    /// Runs the full commit sequence.
    ///
    /// A commit failure at subscriber `k` reverts subscribers `k-1..0` in
    /// reverse order, then aborts every subscriber. Failures in commit_done
    /// and end are reported as warning events; the commit still succeeds.
    pub fn commit(&mut self, txn: &mut Transaction) -> TxnResult<TxnReport> {
        ensure_init(txn, "commit")?;
        info!(txn_id = %txn.id(), subscribers = self.registry.len(), "Committing transaction");
        let mut log = EventLog::new(txn.id());

        for phase in VALIDATE_SEQUENCE {
            if let Err(failure) = self.drive_phase(phase, txn, &mut log) {
                return Err(self.fail(txn, failure, log));
            }
            txn.set_state(phase.into());
        }

        if let Err(failure) = self.drive_phase(Phase::Commit, txn, &mut log) {
            self.revert_into(txn, failure.index, &mut log);
            return Err(self.fail(txn, failure, log));
        }
        txn.set_state(TxnState::Commit);

        self.sweep_into(Phase::CommitDone, txn, &mut log);
        txn.set_state(TxnState::CommitDone);

        self.finish(txn, &mut log);
        Ok(self.report(txn, log))
    }

    /// Discards a transaction that has not run, calling abort on every
    /// subscriber.
    pub fn abort(&mut self, txn: &mut Transaction) -> TxnResult<TxnReport> {
        if txn.state().is_terminal() {
            return Err(TxnError::invalid_state(txn.id(), txn.state(), "abort"));
        }
        info!(txn_id = %txn.id(), "Aborting transaction");
        let mut log = EventLog::new(txn.id());
        self.sweep_into(Phase::Abort, txn, &mut log);
        txn.set_state(TxnState::Aborted);
        Ok(self.report(txn, log))
    }

    /// Runs one phase over all subscribers without touching the
    /// transaction state.
    ///
    /// Fail-fast phases stop at the first failing subscriber. The other
    /// phases are swept and always succeed.
    pub fn run_phase(
        &mut self,
        phase: Phase,
        txn: &Transaction,
    ) -> Result<Vec<TxnEvent>, PhaseFailure> {
        let mut log = EventLog::new(txn.id());
        if !phase.is_fail_fast() {
            self.sweep_into(phase, txn, &mut log);
            return Ok(log.into_events());
        }
        match self.drive_phase(phase, txn, &mut log) {
            Ok(()) => Ok(log.into_events()),
            Err(mut failure) => {
                failure.events = log.into_events();
                Err(failure)
            }
        }
    }

    /// Reverts the subscribers that committed before `failed_index`, last
    /// one first. Every revert is attempted.
    pub fn revert_committed(&mut self, txn: &Transaction, failed_index: usize) -> Vec<TxnEvent> {
        let mut log = EventLog::new(txn.id());
        self.revert_into(txn, failed_index, &mut log);
        log.into_events()
    }

    /// Calls `phase` on every subscriber in order, recording failures
    /// instead of stopping.
    pub fn sweep(&mut self, phase: Phase, txn: &Transaction) -> Vec<TxnEvent> {
        let mut log = EventLog::new(txn.id());
        self.sweep_into(phase, txn, &mut log);
        log.into_events()
    }

    fn drive_phase(
        &mut self,
        phase: Phase,
        txn: &Transaction,
        log: &mut EventLog,
    ) -> Result<(), PhaseFailure> {
        debug!(txn_id = %txn.id(), phase = %phase, "Starting phase");
        let mut cursor = self.registry.next(None);
        while let Some(index) = cursor {
            if let Err(error) = self.invoke(index, phase, txn, log) {
                let subscriber = self.subscriber_name(index);
                if error.is_silent() {
                    log.record(TxnEvent::new(
                        TxnEventKind::SilentFailure,
                        txn.id(),
                        phase,
                        index,
                        subscriber.clone(),
                        "callback failed without describing the error",
                    ));
                }
                info!(
                    txn_id = %txn.id(),
                    phase = %phase,
                    subscriber = %subscriber,
                    index,
                    reason = %error,
                    "Phase failed"
                );
                return Err(PhaseFailure::new(phase, index, subscriber, error));
            }
            cursor = self.registry.next(Some(index));
        }
        debug!(txn_id = %txn.id(), phase = %phase, "Phase complete");
        Ok(())
    }

    fn revert_into(&mut self, txn: &Transaction, failed_index: usize, log: &mut EventLog) {
        debug!(txn_id = %txn.id(), failed_index, "Reverting committed subscribers");
        for index in self.registry.reverse_from(failed_index) {
            if let Err(error) = self.invoke(index, Phase::Revert, txn, log) {
                self.record_sweep_failure(Phase::Revert, index, &error, log);
            }
        }
    }

    fn sweep_into(&mut self, phase: Phase, txn: &Transaction, log: &mut EventLog) {
        debug!(txn_id = %txn.id(), phase = %phase, "Sweeping phase");
        for index in 0..self.registry.len() {
            if let Err(error) = self.invoke(index, phase, txn, log) {
                self.record_sweep_failure(phase, index, &error, log);
            }
        }
    }

    /// Runs end over all subscribers. The first failure stops the phase and
    /// becomes a warning; the transaction still ends.
    fn finish(&mut self, txn: &mut Transaction, log: &mut EventLog) {
        let mut cursor = self.registry.next(None);
        while let Some(index) = cursor {
            if let Err(error) = self.invoke(index, Phase::End, txn, log) {
                self.record_sweep_failure(Phase::End, index, &error, log);
                break;
            }
            cursor = self.registry.next(Some(index));
        }
        txn.set_state(TxnState::End);
        info!(txn_id = %txn.id(), warnings = log.len(), "Transaction ended");
    }

    fn fail(
        &mut self,
        txn: &mut Transaction,
        mut failure: PhaseFailure,
        mut log: EventLog,
    ) -> TxnError {
        self.sweep_into(Phase::Abort, txn, &mut log);
        txn.set_state(TxnState::Aborted);
        info!(
            txn_id = %txn.id(),
            phase = %failure.phase,
            subscriber = %failure.subscriber,
            "Transaction aborted"
        );
        failure.events = log.into_events();
        failure.into()
    }

    fn record_sweep_failure(
        &self,
        phase: Phase,
        index: usize,
        error: &PhaseError,
        log: &mut EventLog,
    ) {
        let event = TxnEvent::from_error(
            TxnEventKind::for_sweep(phase),
            log.txn_id(),
            phase,
            index,
            &self.subscriber_name(index),
            error,
        );
        log.record(event);
    }

    /// Calls one subscriber's hook between two monitor checkpoints.
    ///
    /// A hook the subscriber does not handle succeeds without a monitor
    /// checkpoint.
    fn invoke(
        &mut self,
        index: usize,
        phase: Phase,
        txn: &Transaction,
        log: &mut EventLog,
    ) -> PhaseResult {
        let hook = phase.hook_name();
        let Some(subscriber) = self.registry.get_mut(index) else {
            return Err(PhaseError::internal(format!("no subscriber at index {}", index)));
        };
        if !subscriber.handles(phase) {
            return Ok(());
        }
        let name = subscriber.name().to_string();

        let handle = match self.monitor.watch(&name, hook) {
            Ok(handle) => handle,
            Err(fault) => {
                let event =
                    monitor_event(log.txn_id(), phase, index, &name, &fault, Checkpoint::Before);
                log.record(event);
                return Err(PhaseError::resource(fault.to_string()));
            }
        };

        trace!(txn_id = %txn.id(), subscriber = %name, hook, "Invoking subscriber");
        let result = dispatch(subscriber, phase, txn);

        let checkpoint = if result.is_ok() {
            Checkpoint::AfterSuccess
        } else {
            Checkpoint::AfterFailure
        };
        if let Err(fault) = self.monitor.check(&handle, &name, hook, checkpoint) {
            log.record(monitor_event(log.txn_id(), phase, index, &name, &fault, checkpoint));
            if result.is_ok() {
                return Err(PhaseError::resource(fault.to_string()));
            }
        }
        result
    }

    fn subscriber_name(&self, index: usize) -> String {
        self.registry
            .get(index)
            .map(|s| s.name().to_string())
            .unwrap_or_default()
    }

    fn report(&self, txn: &Transaction, log: EventLog) -> TxnReport {
        TxnReport {
            txn_id: txn.id(),
            state: txn.state(),
            summary: txn.summary(),
            events: log.into_events(),
        }
    }
}

impl Default for TxnEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_init(txn: &Transaction, operation: &'static str) -> TxnResult<()> {
    if txn.state() != TxnState::Init {
        return Err(TxnError::invalid_state(txn.id(), txn.state(), operation));
    }
    Ok(())
}

fn monitor_event(
    txn_id: TxnId,
    phase: Phase,
    index: usize,
    subscriber: &str,
    fault: &Fault,
    checkpoint: Checkpoint,
) -> TxnEvent {
    let mut event = TxnEvent::new(
        TxnEventKind::MonitorFault,
        txn_id,
        phase,
        index,
        subscriber,
        fault.to_string(),
    )
    .with_checkpoint(checkpoint);
    event.category = Some(ErrorCategory::Resource);
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use yangconf_tree::SchemaMap;

    type Calls = Arc<Mutex<Vec<String>>>;

    struct Stub {
        name: &'static str,
        calls: Calls,
        fail: Option<(Phase, PhaseError)>,
    }

    impl Stub {
        fn new(name: &'static str, calls: &Calls) -> Self {
            Self {
                name,
                calls: Arc::clone(calls),
                fail: None,
            }
        }

        fn failing(mut self, phase: Phase, error: PhaseError) -> Self {
            self.fail = Some((phase, error));
            self
        }

        fn hit(&mut self, phase: Phase) -> PhaseResult {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}({})", phase, self.name));
            match &self.fail {
                Some((p, e)) if *p == phase => Err(e.clone()),
                _ => Ok(()),
            }
        }
    }

    impl Subscriber for Stub {
        fn name(&self) -> &str {
            self.name
        }
        fn begin(&mut self, _txn: &Transaction) -> PhaseResult {
            self.hit(Phase::Begin)
        }
        fn validate(&mut self, _txn: &Transaction) -> PhaseResult {
            self.hit(Phase::Validate)
        }
        fn commit(&mut self, _txn: &Transaction) -> PhaseResult {
            self.hit(Phase::Commit)
        }
        fn end(&mut self, _txn: &Transaction) -> PhaseResult {
            self.hit(Phase::End)
        }
        fn revert(&mut self, _txn: &Transaction) -> PhaseResult {
            self.hit(Phase::Revert)
        }
        fn abort(&mut self, _txn: &Transaction) -> PhaseResult {
            self.hit(Phase::Abort)
        }
    }

    fn empty_txn(engine: &TxnEngine) -> Transaction {
        engine
            .create_transaction(
                ConfigTree::new("config"),
                ConfigTree::new("config"),
                &SchemaMap::new(),
            )
            .unwrap()
    }

    fn taken(calls: &Calls) -> Vec<String> {
        std::mem::take(&mut *calls.lock().unwrap())
    }

    #[test]
    fn test_engine_allocates_its_own_ids() {
        let engine = TxnEngine::new();
        assert_eq!(empty_txn(&engine).id(), TxnId::from_raw(0));
        assert_eq!(empty_txn(&engine).id(), TxnId::from_raw(1));
    }

    #[test]
    fn test_commit_success_path() {
        let calls = Calls::default();
        let mut engine = TxnEngine::new();
        engine.register(Stub::new("a", &calls)).unwrap();
        engine.register(Stub::new("b", &calls)).unwrap();

        let mut txn = empty_txn(&engine);
        let report = engine.commit(&mut txn).unwrap();
        assert_eq!(report.state, TxnState::End);
        assert!(!report.has_warnings());
        assert_eq!(
            taken(&calls),
            vec![
                "begin(a)", "begin(b)", "validate(a)", "validate(b)", "commit(a)", "commit(b)",
                "end(a)", "end(b)",
            ]
        );
    }

    #[test]
    fn test_commit_failure_reverts_and_aborts() {
        let calls = Calls::default();
        let mut engine = TxnEngine::new();
        engine.register(Stub::new("a", &calls)).unwrap();
        engine
            .register(Stub::new("b", &calls).failing(Phase::Commit, PhaseError::plugin("no route")))
            .unwrap();

        let mut txn = empty_txn(&engine);
        let err = engine.commit(&mut txn).unwrap_err();
        let failure = err.phase_failure().unwrap();
        assert_eq!(failure.phase, Phase::Commit);
        assert_eq!(failure.index, 1);
        assert!(failure.events.is_empty());
        assert_eq!(txn.state(), TxnState::Aborted);

        let calls = taken(&calls);
        let tail: Vec<&str> = calls.iter().skip(4).map(String::as_str).collect();
        assert_eq!(tail, vec!["commit(a)", "commit(b)", "revert(a)", "abort(a)", "abort(b)"]);
    }

    #[test]
    fn test_silent_failure_recorded_once() {
        let calls = Calls::default();
        let mut engine = TxnEngine::new();
        engine
            .register(Stub::new("a", &calls).failing(Phase::Validate, PhaseError::silent()))
            .unwrap();

        let mut txn = empty_txn(&engine);
        let err = engine.validate(&mut txn).unwrap_err();
        let events = &err.phase_failure().unwrap().events;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, TxnEventKind::SilentFailure);
        assert_eq!(events[0].subscriber, "a");
        assert_eq!(events[0].phase, Phase::Validate);
    }

    #[test]
    fn test_transaction_not_reusable() {
        let mut engine = TxnEngine::new();
        let mut txn = empty_txn(&engine);
        engine.commit(&mut txn).unwrap();
        let err = engine.commit(&mut txn).unwrap_err();
        assert!(matches!(err, TxnError::InvalidState { state: TxnState::End, .. }));
        assert!(engine.abort(&mut txn).is_err());
    }

    #[test]
    fn test_run_phase_leaves_state() {
        let calls = Calls::default();
        let mut engine = TxnEngine::new();
        engine.register(Stub::new("a", &calls)).unwrap();
        let txn = empty_txn(&engine);
        assert!(engine.run_phase(Phase::Begin, &txn).unwrap().is_empty());
        assert_eq!(txn.state(), TxnState::Init);
        assert_eq!(taken(&calls), vec!["begin(a)"]);
    }

    #[test]
    fn test_duplicate_registration() {
        let calls = Calls::default();
        let mut engine = TxnEngine::new();
        engine.register(Stub::new("a", &calls)).unwrap();
        assert!(matches!(
            engine.register(Stub::new("a", &calls)),
            Err(TxnError::DuplicateSubscriber { .. })
        ));
    }
}
