//! Scripted resource monitor

use std::sync::{Arc, Mutex, MutexGuard};
use yangconf_txn::{Checkpoint, Fault, ResourceMonitor, WatchHandle};

/// One monitor consultation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorCall {
    pub subscriber: String,
    pub hook: String,
    pub checkpoint: Checkpoint,
}

#[derive(Debug, Default)]
struct State {
    faults: Vec<(String, String, Checkpoint)>,
    calls: Vec<MonitorCall>,
}

/// Monitor that reports faults at scripted `(subscriber, hook, checkpoint)`
/// points and records every consultation.
///
/// Clones share state, so keep one clone for assertions after handing the
/// other to the engine.
#[derive(Debug, Clone, Default)]
pub struct ScriptedMonitor {
    state: Arc<Mutex<State>>,
}

impl ScriptedMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reports a fault when `subscriber`'s `hook` reaches `checkpoint`.
    pub fn fault_at(self, subscriber: &str, hook: &str, checkpoint: Checkpoint) -> Self {
        self.lock()
            .faults
            .push((subscriber.to_string(), hook.to_string(), checkpoint));
        self
    }

    pub fn calls(&self) -> Vec<MonitorCall> {
        self.lock().calls.clone()
    }

    /// Checkpoints seen for one subscriber hook, in order.
    pub fn checkpoints(&self, subscriber: &str, hook: &str) -> Vec<Checkpoint> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.subscriber == subscriber && c.hook == hook)
            .map(|c| c.checkpoint)
            .collect()
    }

    fn consult(&self, subscriber: &str, hook: &str, checkpoint: Checkpoint) -> Result<(), Fault> {
        let mut state = self.lock();
        state.calls.push(MonitorCall {
            subscriber: subscriber.to_string(),
            hook: hook.to_string(),
            checkpoint,
        });
        let scripted = state
            .faults
            .iter()
            .any(|(s, h, c)| s == subscriber && h == hook && *c == checkpoint);
        if scripted {
            return Err(Fault::new(
                "scripted",
                format!("{} {} at {}", subscriber, hook, checkpoint),
            ));
        }
        Ok(())
    }
}

impl ResourceMonitor for ScriptedMonitor {
    fn watch(&mut self, subscriber: &str, hook: &str) -> Result<WatchHandle, Fault> {
        self.consult(subscriber, hook, Checkpoint::Before)?;
        Ok(WatchHandle::empty())
    }

    fn check(
        &mut self,
        _handle: &WatchHandle,
        subscriber: &str,
        hook: &str,
        checkpoint: Checkpoint,
    ) -> Result<(), Fault> {
        self.consult(subscriber, hook, checkpoint)
    }
}
