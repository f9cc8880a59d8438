//! Configuration management for textlift.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const CONFIG_DIR_NAME: &str = "textlift";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `TEXTLIFT_`, `__` between sections)
/// 2. TOML config file at `~/.config/textlift/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Delays and retry budgets.
    pub timing: TimingConfig,
    /// Tree walk bounds.
    pub traversal: TraversalConfig,
    /// App category classification.
    pub classifier: ClassifierConfig,
    /// Chromium accessibility bootstrap.
    pub bootstrap: BootstrapConfig,
}

/// Delays and retry budgets. All delays are bounded sleeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Attempts at reading the system-wide focused element.
    pub focus_retry_attempts: u32,
    /// Spacing between focus attempts in milliseconds.
    pub focus_retry_delay_ms: u64,
    /// Wait after enabling Chromium accessibility in milliseconds.
    pub bootstrap_delay_ms: u64,
    /// Wait after enabling Chromium accessibility for known-slow apps.
    pub slow_bootstrap_delay_ms: u64,
    /// Backoff between bootstrap retries in milliseconds.
    pub bootstrap_backoff_ms: u64,
    /// Wait between a synthesized copy and reading the clipboard.
    pub copy_wait_ms: u64,
    /// Wait between a synthesized select-all and paste.
    pub select_all_delay_ms: u64,
    /// Wait after a synthesized paste before restoring the clipboard.
    pub paste_settle_ms: u64,
    /// Wait before reading back a replacement for verification.
    pub verify_delay_ms: u64,
    /// Interval of the permission poll in milliseconds.
    pub permission_poll_interval_ms: u64,
}

/// Bounds on accessibility tree walks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    /// Ancestor levels searched by parent traversal.
    pub max_parent_depth: usize,
    /// Descendant depth searched by child descent.
    pub max_child_depth: usize,
    /// Ancestor levels searched for a web-content root.
    pub max_webview_depth: usize,
    /// Descendant depth searched for an element flagged as focused.
    pub max_focus_search_depth: usize,
}

/// App category classification overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Additional browser bundle identifiers (prefix match).
    pub extra_browser_ids: Vec<String>,
    /// Additional Chromium-embedded app identifiers.
    pub extra_electron_ids: Vec<String>,
    /// Identifiers whose accessibility tree takes longer to rebuild.
    pub slow_bootstrap_ids: Vec<String>,
    /// Regexes matched against executable paths to detect Java runtimes.
    pub java_path_patterns: Vec<String>,
}

/// Chromium accessibility bootstrap settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Attributes set to `true` on the application element.
    pub enablement_attributes: Vec<String>,
    /// Attempts made by retrying operations.
    pub max_attempts: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            focus_retry_attempts: 3,
            focus_retry_delay_ms: 30,
            bootstrap_delay_ms: 100,
            slow_bootstrap_delay_ms: 200,
            bootstrap_backoff_ms: 50,
            copy_wait_ms: 100,
            select_all_delay_ms: 50,
            paste_settle_ms: 100,
            verify_delay_ms: 50,
            permission_poll_interval_ms: 2000,
        }
    }
}

impl TimingConfig {
    /// Timing with every delay set to zero, for driving the engines
    /// against in-memory fakes.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            focus_retry_delay_ms: 0,
            bootstrap_delay_ms: 0,
            slow_bootstrap_delay_ms: 0,
            bootstrap_backoff_ms: 0,
            copy_wait_ms: 0,
            select_all_delay_ms: 0,
            paste_settle_ms: 0,
            verify_delay_ms: 0,
            permission_poll_interval_ms: 10,
            ..Self::default()
        }
    }

    /// Spacing between focus attempts.
    #[must_use]
    pub fn focus_retry_delay(&self) -> Duration {
        Duration::from_millis(self.focus_retry_delay_ms)
    }

    /// Wait after enabling Chromium accessibility.
    #[must_use]
    pub fn bootstrap_delay(&self, slow: bool) -> Duration {
        if slow {
            Duration::from_millis(self.slow_bootstrap_delay_ms)
        } else {
            Duration::from_millis(self.bootstrap_delay_ms)
        }
    }

    /// Backoff between bootstrap retries.
    #[must_use]
    pub fn bootstrap_backoff(&self) -> Duration {
        Duration::from_millis(self.bootstrap_backoff_ms)
    }

    /// Wait after a synthesized copy.
    #[must_use]
    pub fn copy_wait(&self) -> Duration {
        Duration::from_millis(self.copy_wait_ms)
    }

    /// Wait after a synthesized select-all.
    #[must_use]
    pub fn select_all_delay(&self) -> Duration {
        Duration::from_millis(self.select_all_delay_ms)
    }

    /// Wait after a synthesized paste.
    #[must_use]
    pub fn paste_settle(&self) -> Duration {
        Duration::from_millis(self.paste_settle_ms)
    }

    /// Wait before verification.
    #[must_use]
    pub fn verify_delay(&self) -> Duration {
        Duration::from_millis(self.verify_delay_ms)
    }

    /// Interval of the permission poll.
    #[must_use]
    pub fn permission_poll_interval(&self) -> Duration {
        Duration::from_millis(self.permission_poll_interval_ms)
    }
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_parent_depth: 8,
            max_child_depth: 12,
            max_webview_depth: 10,
            max_focus_search_depth: 6,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            extra_browser_ids: Vec::new(),
            extra_electron_ids: Vec::new(),
            slow_bootstrap_ids: default_slow_bootstrap_ids(),
            java_path_patterns: default_java_path_patterns(),
        }
    }
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            enablement_attributes: vec![
                "AXManualAccessibility".to_string(),
                "AXEnhancedUserInterface".to_string(),
                "AXWebAccessibilityEnabled".to_string(),
            ],
            max_attempts: 3,
        }
    }
}

/// Apps whose Chromium tree is known to rebuild slowly.
fn default_slow_bootstrap_ids() -> Vec<String> {
    vec![
        "com.tinyspeck.slackmacgap".to_string(),
        "com.microsoft.teams2".to_string(),
        "com.hnc.Discord".to_string(),
        "notion.id".to_string(),
    ]
}

/// Executable path shapes of Java runtimes.
fn default_java_path_patterns() -> Vec<String> {
    vec![
        r"(?i)/(jre|jdk|jbr)[^/]*/".to_string(),
        r"(?i)/JavaVirtualMachines/".to_string(),
        r"(?i)/bin/java$".to_string(),
        r"(?i)\.jar$".to_string(),
    ]
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("TEXTLIFT_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.timing.focus_retry_attempts == 0 {
            return Err(invalid("focus_retry_attempts must be greater than 0"));
        }

        if self.timing.permission_poll_interval_ms == 0 {
            return Err(invalid("permission_poll_interval_ms must be greater than 0"));
        }

        let depths = [
            ("max_parent_depth", self.traversal.max_parent_depth),
            ("max_child_depth", self.traversal.max_child_depth),
            ("max_webview_depth", self.traversal.max_webview_depth),
            ("max_focus_search_depth", self.traversal.max_focus_search_depth),
        ];
        for (name, depth) in depths {
            if depth == 0 {
                return Err(invalid(format!("{name} must be greater than 0")));
            }
        }

        if self.bootstrap.max_attempts == 0 {
            return Err(invalid("bootstrap max_attempts must be greater than 0"));
        }

        if self.bootstrap.enablement_attributes.is_empty() {
            return Err(invalid("bootstrap enablement_attributes cannot be empty"));
        }

        for pattern in &self.classifier.java_path_patterns {
            if regex::Regex::new(pattern).is_err() {
                return Err(invalid(format!("invalid regex pattern: {pattern}")));
            }
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timing() {
        let timing = TimingConfig::default();

        assert_eq!(timing.focus_retry_attempts, 3);
        assert_eq!(timing.focus_retry_delay(), Duration::from_millis(30));
        assert_eq!(timing.bootstrap_delay(false), Duration::from_millis(100));
        assert_eq!(timing.bootstrap_delay(true), Duration::from_millis(200));
        assert_eq!(timing.copy_wait(), Duration::from_millis(100));
        assert_eq!(timing.permission_poll_interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_immediate_timing_keeps_retry_budget() {
        let timing = TimingConfig::immediate();

        assert_eq!(timing.focus_retry_attempts, 3);
        assert_eq!(timing.copy_wait(), Duration::ZERO);
        assert_eq!(timing.bootstrap_delay(true), Duration::ZERO);
        assert!(timing.permission_poll_interval() > Duration::ZERO);
    }

    #[test]
    fn test_default_traversal() {
        let traversal = TraversalConfig::default();

        assert_eq!(traversal.max_parent_depth, 8);
        assert_eq!(traversal.max_child_depth, 12);
    }

    #[test]
    fn test_default_bootstrap() {
        let bootstrap = BootstrapConfig::default();

        assert_eq!(bootstrap.enablement_attributes.len(), 3);
        assert!(bootstrap
            .enablement_attributes
            .contains(&"AXManualAccessibility".to_string()));
        assert_eq!(bootstrap.max_attempts, 3);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_depth() {
        let mut config = Config::default();
        config.traversal.max_child_depth = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("max_child_depth"));
    }

    #[test]
    fn test_validate_zero_poll_interval() {
        let mut config = Config::default();
        config.timing.permission_poll_interval_ms = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("permission_poll_interval_ms"));
    }

    #[test]
    fn test_validate_zero_focus_attempts() {
        let mut config = Config::default();
        config.timing.focus_retry_attempts = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_attributes() {
        let mut config = Config::default();
        config.bootstrap.enablement_attributes.clear();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("enablement_attributes"));
    }

    #[test]
    fn test_validate_invalid_regex() {
        let mut config = Config::default();
        config.classifier.java_path_patterns = vec!["[invalid".to_string()];

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("invalid regex"));
    }

    #[test]
    fn test_default_java_patterns_are_valid() {
        for pattern in default_java_path_patterns() {
            assert!(
                regex::Regex::new(&pattern).is_ok(),
                "Invalid pattern: {pattern}"
            );
        }
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("textlift"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_timing_config_deserialize_partial() {
        let json = r#"{"copy_wait_ms": 250}"#;
        let timing: TimingConfig = serde_json::from_str(json).unwrap();
        assert_eq!(timing.copy_wait_ms, 250);
        assert_eq!(timing.focus_retry_attempts, 3);
    }

    #[test]
    fn test_config_serialize() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("enablement_attributes"));
        assert!(json.contains("max_parent_depth"));
    }
}
