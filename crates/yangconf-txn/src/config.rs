//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{TxnError, TxnResult};
use crate::monitor::{FdCountMonitor, NoopMonitor, ResourceMonitor};

/// Which resource monitor the engine wraps callbacks with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorMode {
    #[default]
    Disabled,
    FdCount,
}

/// Configuration for a [`TxnEngine`](crate::TxnEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Resource monitor selection
    pub monitor: MonitorMode,
    /// Extra descriptors a callback may leave open before it is flagged
    pub fd_leak_tolerance: usize,
    /// Log the change list of every new transaction at debug level
    pub log_diff: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            monitor: MonitorMode::Disabled,
            fd_leak_tolerance: 0,
            log_diff: true,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(text: &str) -> TxnResult<Self> {
        serde_yaml::from_str(text).map_err(|e| TxnError::config(format!("invalid YAML: {}", e)))
    }

    pub fn from_json_str(text: &str) -> TxnResult<Self> {
        serde_json::from_str(text).map_err(|e| TxnError::config(format!("invalid JSON: {}", e)))
    }

    /// Loads a configuration file; `.json` is parsed as JSON, `.yaml` and
    /// `.yml` as YAML.
    pub fn load(path: impl AsRef<Path>) -> TxnResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| TxnError::config(format!("cannot read {}: {}", path.display(), e)))?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&text),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text),
            _ => Err(TxnError::config(format!(
                "unsupported configuration format: {}",
                path.display()
            ))),
        }
    }

    /// Builds the monitor selected by [`monitor`](Self::monitor).
    pub fn build_monitor(&self) -> Box<dyn ResourceMonitor> {
        match self.monitor {
            MonitorMode::Disabled => Box::new(NoopMonitor),
            MonitorMode::FdCount => Box::new(FdCountMonitor::new(self.fd_leak_tolerance)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.monitor, MonitorMode::Disabled);
        assert_eq!(config.fd_leak_tolerance, 0);
        assert!(config.log_diff);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config =
            EngineConfig::from_yaml_str("monitor: fd_count\nfd_leak_tolerance: 2\n").unwrap();
        assert_eq!(
            config,
            EngineConfig {
                monitor: MonitorMode::FdCount,
                fd_leak_tolerance: 2,
                log_diff: true,
            }
        );
    }

    #[test]
    fn test_json() {
        let config = EngineConfig::from_json_str(r#"{"log_diff": false}"#).unwrap();
        assert!(!config.log_diff);
        assert_eq!(config.monitor, MonitorMode::Disabled);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = EngineConfig::from_json_str(r#"{"monitr": "fd_count"}"#).unwrap_err();
        assert!(matches!(err, TxnError::Config { .. }));
    }

    #[test]
    fn test_unknown_monitor_rejected() {
        assert!(EngineConfig::from_yaml_str("monitor: heap").is_err());
    }
}
