//! Resource/fault monitoring around subscriber callbacks.
//!
//! The engine asks the monitor for a baseline before every callback and
//! checks it again afterwards, whichever way the callback returned. A fault
//! at any checkpoint counts as a failure of that invocation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Point in a single invocation at which the monitor is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    Before,
    AfterFailure,
    AfterSuccess,
}

impl Checkpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Checkpoint::Before => "before",
            Checkpoint::AfterFailure => "after_failure",
            Checkpoint::AfterSuccess => "after_success",
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource problem attributed to one subscriber invocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{resource}: {detail}")]
pub struct Fault {
    pub resource: String,
    pub detail: String,
}

impl Fault {
    pub fn new(resource: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            detail: detail.into(),
        }
    }
}

/// Baseline captured before an invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchHandle {
    baseline: BTreeMap<String, u64>,
}

impl WatchHandle {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with(mut self, resource: impl Into<String>, value: u64) -> Self {
        self.baseline.insert(resource.into(), value);
        self
    }

    pub fn baseline(&self, resource: &str) -> Option<u64> {
        self.baseline.get(resource).copied()
    }
}

/// Watches resources around each subscriber callback.
pub trait ResourceMonitor: Send {
    /// Captures the baseline immediately before `hook` is invoked on
    /// `subscriber`. An error is a fault at [`Checkpoint::Before`].
    fn watch(&mut self, subscriber: &str, hook: &str) -> Result<WatchHandle, Fault>;

    /// Compares the current state against `handle` after the callback.
    fn check(
        &mut self,
        handle: &WatchHandle,
        subscriber: &str,
        hook: &str,
        checkpoint: Checkpoint,
    ) -> Result<(), Fault>;
}

/// Monitor that never reports a fault.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMonitor;

impl ResourceMonitor for NoopMonitor {
    fn watch(&mut self, _subscriber: &str, _hook: &str) -> Result<WatchHandle, Fault> {
        Ok(WatchHandle::empty())
    }

    fn check(
        &mut self,
        _handle: &WatchHandle,
        _subscriber: &str,
        _hook: &str,
        _checkpoint: Checkpoint,
    ) -> Result<(), Fault> {
        Ok(())
    }
}

const FD_RESOURCE: &str = "file_descriptors";

/// Counts open file descriptors of the process and reports a leak when a
/// callback leaves more open than it found, beyond `tolerance`.
///
/// Where the descriptor table cannot be listed the monitor captures no
/// baseline and every check passes.
#[derive(Debug, Clone)]
pub struct FdCountMonitor {
    tolerance: u64,
    fd_dir: PathBuf,
}

impl FdCountMonitor {
    pub fn new(tolerance: usize) -> Self {
        Self::with_fd_dir(tolerance, "/proc/self/fd")
    }

    /// Counts entries of `fd_dir` instead of `/proc/self/fd`.
    pub fn with_fd_dir(tolerance: usize, fd_dir: impl Into<PathBuf>) -> Self {
        Self {
            tolerance: tolerance as u64,
            fd_dir: fd_dir.into(),
        }
    }

    pub fn tolerance(&self) -> u64 {
        self.tolerance
    }

    /// Current number of open descriptors, or `None` when unavailable.
    pub fn open_fds(&self) -> Option<u64> {
        match fs::read_dir(&self.fd_dir) {
            Ok(entries) => Some(entries.filter(|e| e.is_ok()).count() as u64),
            Err(e) => {
                debug!(dir = %self.fd_dir.display(), error = %e, "Descriptor table unavailable");
                None
            }
        }
    }
}

impl Default for FdCountMonitor {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ResourceMonitor for FdCountMonitor {
    fn watch(&mut self, _subscriber: &str, _hook: &str) -> Result<WatchHandle, Fault> {
        let handle = match self.open_fds() {
            Some(count) => WatchHandle::empty().with(FD_RESOURCE, count),
            None => WatchHandle::empty(),
        };
        Ok(handle)
    }

    fn check(
        &mut self,
        handle: &WatchHandle,
        subscriber: &str,
        hook: &str,
        checkpoint: Checkpoint,
    ) -> Result<(), Fault> {
        let Some(baseline) = handle.baseline(FD_RESOURCE) else {
            return Ok(());
        };
        let Some(current) = self.open_fds() else {
            return Ok(());
        };
        if current.saturating_sub(baseline) > self.tolerance {
            return Err(Fault::new(
                FD_RESOURCE,
                format!(
                    "{} leaked {} descriptor(s) in {} ({} -> {}, checked {})",
                    subscriber,
                    current - baseline,
                    hook,
                    baseline,
                    current,
                    checkpoint
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) {
        fs::write(dir.path().join(name), b"").unwrap();
    }

    #[test]
    fn test_noop_never_faults() {
        let mut monitor = NoopMonitor;
        let handle = monitor.watch("ports", "transaction_commit").unwrap();
        assert_eq!(handle, WatchHandle::empty());
        assert!(monitor
            .check(&handle, "ports", "transaction_commit", Checkpoint::AfterSuccess)
            .is_ok());
    }

    #[test]
    fn test_fd_monitor_detects_growth() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "0");
        let mut monitor = FdCountMonitor::with_fd_dir(0, dir.path());
        let handle = monitor.watch("ports", "transaction_commit").unwrap();
        assert_eq!(handle.baseline(FD_RESOURCE), Some(1));

        touch(&dir, "1");
        let fault = monitor
            .check(&handle, "ports", "transaction_commit", Checkpoint::AfterSuccess)
            .unwrap_err();
        assert_eq!(fault.resource, FD_RESOURCE);
        assert!(fault.detail.contains("ports leaked 1 descriptor(s) in transaction_commit"));
    }

    #[test]
    fn test_fd_monitor_tolerance() {
        let dir = TempDir::new().unwrap();
        let mut monitor = FdCountMonitor::with_fd_dir(2, dir.path());
        let handle = monitor.watch("acl", "transaction_validate").unwrap();
        touch(&dir, "3");
        touch(&dir, "4");
        assert!(monitor
            .check(&handle, "acl", "transaction_validate", Checkpoint::AfterFailure)
            .is_ok());
        touch(&dir, "5");
        assert!(monitor
            .check(&handle, "acl", "transaction_validate", Checkpoint::AfterFailure)
            .is_err());
    }

    #[test]
    fn test_fd_monitor_unbounded_tolerance() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "0");
        let mut monitor = FdCountMonitor::with_fd_dir(usize::MAX, dir.path());
        let handle = monitor.watch("acl", "transaction_commit").unwrap();
        touch(&dir, "1");
        touch(&dir, "2");
        assert!(monitor
            .check(&handle, "acl", "transaction_commit", Checkpoint::AfterSuccess)
            .is_ok());
    }

    #[test]
    fn test_fd_monitor_ignores_shrinking_table() {
        let dir = TempDir::new().unwrap();
        touch(&dir, "0");
        touch(&dir, "1");
        let mut monitor = FdCountMonitor::with_fd_dir(0, dir.path());
        let handle = monitor.watch("acl", "transaction_commit").unwrap();
        fs::remove_file(dir.path().join("1")).unwrap();
        assert!(monitor
            .check(&handle, "acl", "transaction_commit", Checkpoint::AfterSuccess)
            .is_ok());
    }

    #[test]
    fn test_fd_monitor_degrades_without_table() {
        let dir = TempDir::new().unwrap();
        let mut monitor = FdCountMonitor::with_fd_dir(0, dir.path().join("missing"));
        let handle = monitor.watch("acl", "transaction_end").unwrap();
        assert_eq!(handle.baseline(FD_RESOURCE), None);
        assert!(monitor
            .check(&handle, "acl", "transaction_end", Checkpoint::AfterSuccess)
            .is_ok());
    }

    #[test]
    fn test_checkpoint_names() {
        assert_eq!(Checkpoint::AfterFailure.to_string(), "after_failure");
        assert_eq!(
            serde_json::to_string(&Checkpoint::AfterSuccess).unwrap(),
            "\"after_success\""
        );
    }
}
