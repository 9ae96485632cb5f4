//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::parse_target_url;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// What to watch and how often
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// HTTP client behavior
    #[serde(default)]
    pub http: HttpConfig,

    /// Change detection tuning
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Snapshot persistence
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let url = self
            .monitor
            .url
            .as_deref()
            .ok_or_else(|| AppError::config("no target URL configured (use --url)"))?;
        parse_target_url(url)?;

        if self.monitor.interval_secs == 0 {
            return Err(AppError::validation("monitor.interval_secs must be > 0"));
        }
        if self.monitor.test_mode && self.monitor.test_cycles == 0 {
            return Err(AppError::validation("monitor.test_cycles must be > 0"));
        }
        if let Some(selector) = &self.monitor.selector {
            Selector::parse(selector).map_err(|e| AppError::selector(selector, format!("{e:?}")))?;
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.http.max_retries == 0 {
            return Err(AppError::validation("http.max_retries must be > 0"));
        }
        self.detection.compile_patterns()?;
        Ok(())
    }

    /// The configured target URL. Only meaningful after [`Config::validate`].
    pub fn target_url(&self) -> &str {
        self.monitor.url.as_deref().unwrap_or_default()
    }

    /// Poll interval as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.monitor.interval_secs)
    }

    /// Number of cycles to run before stopping, `None` for an unbounded run.
    pub fn cycle_limit(&self) -> Option<u64> {
        self.monitor.test_mode.then_some(self.monitor.test_cycles)
    }
}

/// Text extraction strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// All document text except scripts and styles
    #[default]
    Raw,
    /// Main content first, raw text as fallback
    Structured,
}

/// What to watch and how often.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Page to watch
    #[serde(default)]
    pub url: Option<String>,

    /// Seconds between the start of consecutive cycles
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    /// Extraction strategy
    #[serde(default)]
    pub extraction: ExtractionMode,

    /// CSS selector restricting extraction to one element
    #[serde(default)]
    pub selector: Option<String>,

    /// Run a bounded number of cycles against an in-memory store
    #[serde(default)]
    pub test_mode: bool,

    /// Cycle count for test mode
    #[serde(default = "defaults::test_cycles")]
    pub test_cycles: u64,

    /// Show the status board
    #[serde(default)]
    pub gui: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            url: None,
            interval_secs: defaults::interval(),
            extraction: ExtractionMode::default(),
            selector: None,
            test_mode: false,
            test_cycles: defaults::test_cycles(),
            gui: false,
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Attempts per cycle before the fetch counts as failed
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Pause between attempts in seconds
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_retries: defaults::max_retries(),
            retry_delay_secs: defaults::retry_delay(),
        }
    }
}

/// Change detection tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Regexes removed from the text before fingerprinting
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Graphemes of content quoted on first observation and change
    #[serde(default = "defaults::excerpt_length")]
    pub excerpt_length: usize,

    /// Diff lines rendered per change
    #[serde(default = "defaults::max_diff_lines")]
    pub max_diff_lines: usize,
}

impl DetectionConfig {
    /// Compile `ignore_patterns`, rejecting invalid expressions.
    pub fn compile_patterns(&self) -> Result<Vec<Regex>> {
        self.ignore_patterns
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| AppError::config(format!("invalid ignore pattern '{p}': {e}")))
            })
            .collect()
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            ignore_patterns: Vec::new(),
            excerpt_length: defaults::excerpt_length(),
            max_diff_lines: defaults::max_diff_lines(),
        }
    }
}

/// Snapshot persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding snapshot records
    #[serde(default = "defaults::storage_dir")]
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: defaults::storage_dir(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter level when RUST_LOG is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Monitor defaults
    pub fn interval() -> u64 {
        60
    }
    pub fn test_cycles() -> u64 {
        2
    }

    // HTTP defaults
    pub fn user_agent() -> String {
        "Custom Web Monitor Bot/1.0".into()
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn retry_delay() -> u64 {
        5
    }

    // Detection defaults
    pub fn excerpt_length() -> usize {
        200
    }
    pub fn max_diff_lines() -> usize {
        20
    }

    pub fn storage_dir() -> PathBuf {
        PathBuf::from("storage")
    }
    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.monitor.url = Some("https://example.com".to_string());
        config
    }

    #[test]
    fn validate_default_with_url_ok() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_url() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn validate_rejects_relative_url() {
        let mut config = valid_config();
        config.monitor.url = Some("example.com/page".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config = valid_config();
        config.monitor.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_selector_and_pattern() {
        let mut config = valid_config();
        config.monitor.selector = Some("[[invalid".to_string());
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.detection.ignore_patterns = vec!["(unclosed".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [monitor]
            url = "https://example.com/news"
            extraction = "structured"

            [detection]
            ignore_patterns = ["Visitors: \\d+"]
            "#,
        )
        .unwrap();

        assert_eq!(config.monitor.extraction, ExtractionMode::Structured);
        assert_eq!(config.monitor.interval_secs, 60);
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.detection.excerpt_length, 200);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn cycle_limit_only_in_test_mode() {
        let mut config = valid_config();
        assert_eq!(config.cycle_limit(), None);
        config.monitor.test_mode = true;
        assert_eq!(config.cycle_limit(), Some(2));
    }
}
