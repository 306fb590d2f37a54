//! Checker configuration.
//!
//! With the `config` feature enabled the configuration can be read from a
//! TOML table; keys that are left out keep their defaults.
//!
//! ```toml
//! sentinel = "OK"
//! timeout_ms = 30000
//! flush_windows = false
//! ```

use std::time::Duration;

#[cfg(feature = "config")]
use std::path::Path;

#[cfg(feature = "config")]
use crate::error::{CheckError, Result};

/// Sentinel a verifier prints when every test passed.
pub const TEST_OK: &str = "OK";

/// Settings for a [`SmartChecker`](crate::check::SmartChecker).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct CheckerConfig {
    /// Exact verifier output that means "solved"
    pub sentinel: String,
    /// Inserted between the answer file stem + index and the extension
    pub window_postfix: String,
    /// Appended to the snapshot stem for the placeholder listing file
    pub windows_postfix: String,
    /// Wall-clock budget for the test process; `None` waits forever
    pub timeout_ms: Option<u64>,
    /// How often a running test process is polled
    pub poll_interval_ms: u64,
    /// Write the placeholder listing file next to the snapshot
    pub flush_windows: bool,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            sentinel: TEST_OK.to_string(),
            window_postfix: "_window".to_string(),
            windows_postfix: "_windows".to_string(),
            timeout_ms: Some(60_000),
            poll_interval_ms: 10,
            flush_windows: true,
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_flush_windows(mut self, flush: bool) -> Self {
        self.flush_windows = flush;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Parse a configuration from TOML text.
    #[cfg(feature = "config")]
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| CheckError::Config(e.to_string()))
    }

    /// Load a configuration file.
    #[cfg(feature = "config")]
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| CheckError::io(path, e))?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CheckerConfig::default();
        assert_eq!(config.sentinel, "OK");
        assert_eq!(config.timeout(), Some(Duration::from_secs(60)));
        assert!(config.flush_windows);
    }

    #[test]
    fn test_builders() {
        let config = CheckerConfig::new()
            .with_timeout(None)
            .with_poll_interval(Duration::ZERO)
            .with_sentinel("PASS");

        assert_eq!(config.timeout(), None);
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
        assert_eq!(config.sentinel, "PASS");
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_from_toml_partial() {
        let config =
            CheckerConfig::from_toml_str("timeout_ms = 250\nflush_windows = false\n").unwrap();
        assert_eq!(config.timeout(), Some(Duration::from_millis(250)));
        assert!(!config.flush_windows);
        assert_eq!(config.window_postfix, "_window");
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_from_toml_invalid() {
        let err = CheckerConfig::from_toml_str("timeout_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, CheckError::Config(_)));
    }
}
