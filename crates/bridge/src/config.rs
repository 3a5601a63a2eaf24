//! Bridge host configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_CALL_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 3_000;

/// Configuration for the agent bridge host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Bind address for the listener. Must be loopback; defaults to
    /// `127.0.0.1:0` so the OS assigns an ephemeral port.
    pub bind_address: Option<String>,
    /// Deadline for each panel call, in milliseconds.
    pub call_timeout_ms: u64,
    /// How long `stop` waits for in-flight connections before forcing
    /// termination, in milliseconds.
    pub shutdown_grace_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_address: None,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a JSON file; absent fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).with_context(|| format!("failed to read bridge config '{}'", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("failed to parse bridge config '{}'", path.display()))
    }

    /// The per-call deadline as a [`Duration`].
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// The shutdown grace period as a [`Duration`].
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}
