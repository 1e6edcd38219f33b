//! Ordered subscriber registry.

use std::fmt;
use std::iter::Rev;
use std::ops::Range;
use tracing::info;

use crate::error::{TxnError, TxnResult};
use crate::subscriber::Subscriber;

/// Subscribers in registration order.
///
/// Registration order is the call order of every forward phase; revert runs
/// over a prefix of it in reverse.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: Vec<Box<dyn Subscriber>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a subscriber and returns its index.
    ///
    /// Display names identify subscribers in logs, so they must be unique.
    pub fn register(&mut self, subscriber: Box<dyn Subscriber>) -> TxnResult<usize> {
        let name = subscriber.name().to_string();
        if self.position(&name).is_some() {
            return Err(TxnError::DuplicateSubscriber { name });
        }
        let index = self.subscribers.len();
        info!(subscriber = %name, index, "Registering subscriber");
        self.subscribers.push(subscriber);
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&dyn Subscriber> {
        self.subscribers.get(index).map(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut (dyn Subscriber + 'static)> {
        self.subscribers.get_mut(index).map(|s| s.as_mut())
    }

    /// Returns the index of the subscriber with the given name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.subscribers.iter().position(|s| s.name() == name)
    }

    /// Display names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.subscribers.iter().map(|s| s.name()).collect()
    }

    /// Forward iteration step: the index after `previous`, or the first
    /// index when `previous` is `None`.
    pub fn next(&self, previous: Option<usize>) -> Option<usize> {
        let candidate = previous.map_or(0, |i| i + 1);
        (candidate < self.len()).then_some(candidate)
    }

    /// Reverse iteration step bounded to indices below `start`: the index
    /// before `previous`, or `start - 1` when `previous` is `None`.
    pub fn next_reverse_from(&self, previous: Option<usize>, start: usize) -> Option<usize> {
        let bound = start.min(self.len());
        previous.map_or(bound, |i| i.min(bound)).checked_sub(1)
    }

    /// Indices `start - 1, ..., 0` (clamped to the registry length).
    pub fn reverse_from(&self, start: usize) -> Rev<Range<usize>> {
        (0..start.min(self.len())).rev()
    }
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &self.names())
            .finish()
    }
}
