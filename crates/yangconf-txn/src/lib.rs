//! Transaction engine for YANG-modelled configuration.
//!
//! A configuration change moves a datastore from a source tree to a target
//! tree. This crate computes the structural difference between the two and
//! drives every registered [`Subscriber`] through the commit lifecycle:
//!
//! - [`diff_trees`]: deleted, added and changed nodes, list entries matched by
//!   key
//! - [`Transaction`]: the trees, their diff and an opaque caller argument
//! - [`SubscriberRegistry`]: subscribers in registration order
//! - [`TxnEngine`]: the phase driver, with revert on commit failure and
//!   best-effort abort
//! - [`ResourceMonitor`]: baseline/check hooks around each callback
//!
//! Everything runs synchronously on the caller's thread.
//!
//! # Example
//!
//! ```
//! use yangconf_tree::{ConfigTree, SchemaMap};
//! use yangconf_txn::{PhaseResult, Subscriber, Transaction, TxnEngine, TxnState};
//!
//! struct Printer;
//!
//! impl Subscriber for Printer {
//!     fn name(&self) -> &str {
//!         "printer"
//!     }
//!
//!     fn commit(&mut self, txn: &Transaction) -> PhaseResult {
//!         assert_eq!(txn.added().len(), 1);
//!         Ok(())
//!     }
//! }
//!
//! let source = ConfigTree::new("config");
//! let mut target = ConfigTree::new("config");
//! let cfg = target.add_container(target.root(), "cfg");
//! target.add_leaf(cfg, "x", "1");
//!
//! let mut engine = TxnEngine::new();
//! engine.register(Printer).unwrap();
//! let mut txn = engine
//!     .create_transaction(source, target, &SchemaMap::new())
//!     .unwrap();
//! let report = engine.commit(&mut txn).unwrap();
//! assert_eq!(report.state, TxnState::End);
//! ```

mod config;
mod diff;
mod engine;
mod error;
mod event;
mod monitor;
mod phase;
mod registry;
mod subscriber;
mod transaction;

pub use config::{EngineConfig, MonitorMode};
pub use diff::{diff_trees, TreeDiff};
pub use engine::{TxnEngine, TxnReport};
pub use error::{ErrorCategory, PhaseError, PhaseFailure, PhaseResult, TxnError, TxnResult};
pub use event::{TxnEvent, TxnEventKind};
pub use monitor::{Checkpoint, FdCountMonitor, Fault, NoopMonitor, ResourceMonitor, WatchHandle};
pub use phase::{Phase, TxnState};
pub use registry::SubscriberRegistry;
pub use subscriber::Subscriber;
pub use transaction::{ChangeKind, Side, Transaction, TxnId, TxnIdAllocator, TxnSummary};
