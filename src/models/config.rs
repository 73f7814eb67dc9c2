use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration from WaitRun.yaml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitRunConfig {
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Timing of the start/show/hide protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// How long `start` waits before showing the surface.
    /// Tasks finishing inside this window never show it.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Interval of the completion watcher's busy poll
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl CoordinatorConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_grace_period_ms() -> u64 {
    50
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// Logging setup consumed by [`crate::logging::setup_logging`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_log_prefix")]
    pub log_prefix: String,

    #[serde(default)]
    pub debug_mode: bool,

    #[serde(default = "default_console_output")]
    pub console_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            log_prefix: default_log_prefix(),
            debug_mode: false,
            console_output: default_console_output(),
        }
    }
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_prefix() -> String {
    "waitrun".to_string()
}

fn default_console_output() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinator_defaults() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.grace_period(), Duration::from_millis(50));
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_logging_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.log_dir, "logs");
        assert_eq!(config.log_prefix, "waitrun");
        assert!(!config.debug_mode);
        assert!(config.console_output);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "coordinator:\n  grace_period_ms: 120\n";
        let config: WaitRunConfig = serde_yaml_ng::from_str(yaml).unwrap();

        assert_eq!(config.coordinator.grace_period_ms, 120);
        assert_eq!(config.coordinator.poll_interval_ms, 500);
        assert_eq!(config.logging, LoggingConfig::default());
    }
}
