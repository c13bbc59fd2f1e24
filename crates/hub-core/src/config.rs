//! Configuration management
//!
//! Settings are resolved in the following order (later wins):
//! 1. Default values
//! 2. `hub.toml` configuration file
//! 3. `HUB_*` environment variables
//!
//! `${VAR_NAME}` placeholders inside the configuration file are expanded
//! from the environment before parsing.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::Error;

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "hub.toml";

/// Main configuration for the agent hub
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP API configuration
    pub api: ApiConfig,

    /// Orchestrator configuration
    pub orchestrator: OrchestratorConfig,

    /// Simulated handler timing
    pub simulation: SimulationConfig,

    /// Result cache configuration
    pub cache: CacheConfig,

    /// Fast service work queue configuration
    pub queue: QueueConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Bearer key for HTTP API authentication (no auth when unset)
    pub key: Option<String>,

    /// Port for HTTP API server
    pub port: u16,

    /// Allowed CORS origins. If unset, any origin is allowed
    pub allowed_origins: Option<Vec<String>>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: None,
            port: default_api_port(),
            allowed_origins: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Start the orchestrator (and every registered agent) at boot
    pub auto_start: bool,
}

/// Delay range for the simulated orchestrator handlers, in milliseconds.
///
/// A task sleeps for a uniformly random duration in `[min_delay_ms, max_delay_ms]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 1000,
            max_delay_ms: 6000,
        }
    }
}

impl SimulationConfig {
    /// No delay at all (tests, benchmarks)
    pub fn instant() -> Self {
        Self {
            min_delay_ms: 0,
            max_delay_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached results
    pub capacity: u64,
    /// Time-to-live of a cached result in seconds
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            ttl_secs: 300,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of queued (not yet dispatched) tasks
    pub capacity: usize,
    /// Maximum number of tasks executing at once
    pub max_concurrency: usize,
    /// Per-task execution timeout in seconds
    pub task_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            max_concurrency: 10,
            task_timeout_secs: 30,
        }
    }
}

impl QueueConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
}

fn default_api_port() -> u16 {
    3000
}

impl Config {
    /// Expand `${VAR_NAME}` placeholders with environment values.
    ///
    /// Unset variables expand to the empty string.
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next();

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Parse configuration from TOML text (after placeholder expansion)
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let expanded = Self::expand_env_vars(content);
        toml::from_str(&expanded)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let mut cfg = Self::from_toml_str(&content)?;
        cfg.apply_env_overrides();
        cfg.validate()?;

        Ok(cfg)
    }

    /// Load configuration from the default location.
    ///
    /// Uses `./hub.toml` when present, otherwise defaults plus environment.
    pub fn load() -> crate::Result<Self> {
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::from_toml_file(DEFAULT_CONFIG_FILE);
        }

        Self::from_env()
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply `HUB_*` overrides read through `lookup`.
    ///
    /// Empty or unparsable values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("HUB_API_KEY") {
            self.api.key = Some(key);
        }
        if let Some(port) = get("HUB_API_PORT").and_then(|p| p.parse().ok()) {
            self.api.port = port;
        }
        if let Some(origins) = get("HUB_API_ALLOWED_ORIGINS") {
            self.api.allowed_origins =
                Some(origins.split(',').map(|s| s.trim().to_string()).collect());
        }

        if let Some(auto_start) = get("HUB_AUTO_START") {
            self.orchestrator.auto_start = auto_start.to_lowercase() == "true";
        }

        if let Some(ms) = get("HUB_SIMULATION_MIN_MS").and_then(|v| v.parse().ok()) {
            self.simulation.min_delay_ms = ms;
        }
        if let Some(ms) = get("HUB_SIMULATION_MAX_MS").and_then(|v| v.parse().ok()) {
            self.simulation.max_delay_ms = ms;
        }

        if let Some(capacity) = get("HUB_CACHE_CAPACITY").and_then(|v| v.parse().ok()) {
            self.cache.capacity = capacity;
        }
        if let Some(ttl) = get("HUB_CACHE_TTL_SECS").and_then(|v| v.parse().ok()) {
            self.cache.ttl_secs = ttl;
        }

        if let Some(capacity) = get("HUB_QUEUE_CAPACITY").and_then(|v| v.parse().ok()) {
            self.queue.capacity = capacity;
        }
        if let Some(n) = get("HUB_MAX_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.queue.max_concurrency = n;
        }
        if let Some(secs) = get("HUB_TASK_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.queue.task_timeout_secs = secs;
        }
    }

    /// Reject settings the runtime cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        if self.simulation.min_delay_ms > self.simulation.max_delay_ms {
            return Err(Error::Config(format!(
                "simulation.min_delay_ms ({}) exceeds simulation.max_delay_ms ({})",
                self.simulation.min_delay_ms, self.simulation.max_delay_ms
            )));
        }
        if self.queue.capacity == 0 {
            return Err(Error::Config("queue.capacity must be at least 1".to_string()));
        }
        if self.queue.max_concurrency == 0 {
            return Err(Error::Config(
                "queue.max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.port, 3000);
        assert!(config.api.key.is_none());
        assert!(!config.orchestrator.auto_start);
        assert_eq!(config.simulation.min_delay_ms, 1000);
        assert_eq!(config.simulation.max_delay_ms, 6000);
        assert_eq!(config.cache.capacity, 1000);
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert_eq!(config.queue.max_concurrency, 10);
        assert_eq!(config.queue.task_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_expand_env_vars() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::set_var("HUB_CONFIG_TEST_VAR", "secret");
        }

        let result = Config::expand_env_vars("key = \"${HUB_CONFIG_TEST_VAR}\"");
        assert_eq!(result, "key = \"secret\"");

        let missing = Config::expand_env_vars("key = \"${HUB_CONFIG_TEST_MISSING}\"");
        assert_eq!(missing, "key = \"\"");

        unsafe {
            std::env::remove_var("HUB_CONFIG_TEST_VAR");
        }
    }

    #[test]
    fn test_expand_env_vars_plain_dollar() {
        assert_eq!(Config::expand_env_vars("cost = $5"), "cost = $5");
    }

    #[test]
    fn test_toml_parsing_partial() {
        let toml = r#"
[api]
port = 8080

[cache]
ttl_secs = 60

[queue]
max_concurrency = 4
"#;
        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.capacity, 1000);
        assert_eq!(config.queue.max_concurrency, 4);
        assert_eq!(config.queue.capacity, 256);
        assert_eq!(config.simulation.max_delay_ms, 6000);
    }

    #[test]
    fn test_toml_parsing_invalid() {
        let result = Config::from_toml_str("[api\nport = ");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[orchestrator]\nauto_start = true\n\n[simulation]\nmin_delay_ms = 5\nmax_delay_ms = 10").unwrap();

        let config = Config::from_toml_file(file.path()).unwrap();
        assert!(config.orchestrator.auto_start);
        assert_eq!(config.simulation.min_delay_ms, 5);
        assert_eq!(config.simulation.max_delay_ms, 10);
    }

    #[test]
    fn test_from_toml_file_missing() {
        let result = Config::from_toml_file("/nonexistent/hub.toml");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_apply_overrides() {
        let vars: HashMap<&str, &str> = [
            ("HUB_API_PORT", "9000"),
            ("HUB_API_KEY", "k"),
            ("HUB_API_ALLOWED_ORIGINS", "http://a.test, http://b.test"),
            ("HUB_AUTO_START", "TRUE"),
            ("HUB_CACHE_CAPACITY", "10"),
            ("HUB_MAX_CONCURRENCY", "not-a-number"),
            ("HUB_TASK_TIMEOUT_SECS", ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.key.as_deref(), Some("k"));
        assert_eq!(
            config.api.allowed_origins,
            Some(vec!["http://a.test".to_string(), "http://b.test".to_string()])
        );
        assert!(config.orchestrator.auto_start);
        assert_eq!(config.cache.capacity, 10);
        // Unparsable and empty values leave the defaults in place
        assert_eq!(config.queue.max_concurrency, 10);
        assert_eq!(config.queue.task_timeout_secs, 30);
    }

    #[test]
    fn test_validate_rejects_inverted_delay_range() {
        let mut config = Config::default();
        config.simulation.min_delay_ms = 10;
        config.simulation.max_delay_ms = 5;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.queue.max_concurrency = 0;
        assert!(config.validate().is_err());
    }
}
