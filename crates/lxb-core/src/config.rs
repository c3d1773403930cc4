//! Builder configuration.
//!
//! Configuration is loaded from environment variables with sensible defaults;
//! the CLI overrides individual fields.

use crate::devices::DEFAULT_NETWORKS;
use crate::readiness::ReadinessPolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Settings that are not part of the lxfile itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderConfig {
    /// LXD socket; `None` means auto-detect.
    pub socket_path: Option<PathBuf>,

    /// LXD state directory holding `containers/<name>` (default: `/var/lib/lxd`).
    pub lxd_dir: PathBuf,

    /// Network poll attempts after start (default: 20).
    pub ready_attempts: u32,

    /// Spacing between network polls (default: 2.5 s).
    pub ready_interval: Duration,

    /// Start/stop action timeout in seconds (default: 30).
    pub action_timeout: i64,

    /// Remote the base image is resolved against (default: `local`).
    pub remote: String,

    /// Networks tried when the lxfile names none.
    pub default_networks: Vec<String>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        let policy = ReadinessPolicy::default();
        Self {
            socket_path: None,
            lxd_dir: PathBuf::from("/var/lib/lxd"),
            ready_attempts: policy.attempts,
            ready_interval: policy.interval,
            action_timeout: 30,
            remote: "local".to_string(),
            default_networks: DEFAULT_NETWORKS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl BuilderConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `LXB_SOCKET` | auto-detected |
    /// | `LXB_LXD_DIR` | `/var/lib/lxd` |
    /// | `LXB_READY_ATTEMPTS` | `20` |
    /// | `LXB_READY_INTERVAL_MS` | `2500` |
    /// | `LXB_ACTION_TIMEOUT` | `30` |
    /// | `LXB_REMOTE` | `local` |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();
        Self {
            socket_path: lookup("LXB_SOCKET")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            lxd_dir: lookup("LXB_LXD_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.lxd_dir),
            ready_attempts: lookup("LXB_READY_ATTEMPTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.ready_attempts),
            ready_interval: lookup("LXB_READY_INTERVAL_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(default.ready_interval),
            action_timeout: lookup("LXB_ACTION_TIMEOUT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.action_timeout),
            remote: lookup("LXB_REMOTE")
                .filter(|v| !v.is_empty())
                .unwrap_or(default.remote),
            default_networks: default.default_networks,
        }
    }

    pub fn readiness_policy(&self) -> ReadinessPolicy {
        ReadinessPolicy {
            attempts: self.ready_attempts,
            interval: self.ready_interval,
        }
    }
}
