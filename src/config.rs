//! Application configuration loaded from environment variables.

use std::time::Duration;

use serde::Deserialize;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Provider Credentials ===
    /// API key for the odds provider. Absence is fatal at startup.
    pub betwatch_api_key: String,

    /// GraphQL endpoint of the odds provider.
    #[serde(default = "default_provider_url")]
    pub betwatch_url: String,

    // === Scan Targets ===
    /// Bookmakers whose fixed prices are checked (comma-separated).
    #[serde(default = "default_bookmakers")]
    pub target_bookmakers: Vec<String>,

    /// Race types to fetch (comma-separated).
    #[serde(default = "default_race_types")]
    pub target_race_types: Vec<String>,

    /// Locations/states to fetch (comma-separated).
    #[serde(default = "default_locations")]
    pub target_locations: Vec<String>,

    // === Betting Window ===
    /// Minimum minutes before the jump for a race to qualify.
    #[serde(default = "default_min_minutes")]
    pub min_minutes_to_jump: i64,

    /// Maximum minutes before the jump for a race to qualify.
    #[serde(default = "default_max_minutes")]
    pub max_minutes_to_jump: i64,

    // === Pagination ===
    /// Races requested per page. The provider caps pages at 100.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Politeness delay between page requests.
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,

    // === Polling ===
    /// Target duration of one poll cycle, sleep included.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    // === HTTP & Retry ===
    /// Per-request HTTP timeout.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    /// Maximum fetch attempts per page, first try included.
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    /// Total retry time budget per page.
    #[serde(default = "default_retry_max_elapsed_secs")]
    pub retry_max_elapsed_secs: u64,

    /// First backoff delay; doubles per attempt.
    #[serde(default = "default_retry_initial_backoff_ms")]
    pub retry_initial_backoff_ms: u64,

    // === Server Configuration ===
    /// HTTP server port for health/metrics endpoints.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,
}

fn default_provider_url() -> String {
    "https://api.betwatch.com/query".to_string()
}

fn default_bookmakers() -> Vec<String> {
    ["Sportsbet", "Tab", "Boombet", "Tabtouch"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_race_types() -> Vec<String> {
    ["Greyhound", "Harness"].iter().map(|s| s.to_string()).collect()
}

fn default_locations() -> Vec<String> {
    ["NSW", "VIC", "QLD", "SA", "WA", "TAS", "NT", "ACT"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_min_minutes() -> i64 {
    2
}

fn default_max_minutes() -> i64 {
    15
}

fn default_page_size() -> usize {
    95 // keep under the provider's 100 cap
}

fn default_page_delay_ms() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    3_000
}

fn default_http_timeout_ms() -> u64 {
    20_000
}

fn default_retry_max_attempts() -> u32 {
    5
}

fn default_retry_max_elapsed_secs() -> u64 {
    60
}

fn default_retry_initial_backoff_ms() -> u64 {
    500
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.betwatch_api_key.is_empty() {
            return Err("BETWATCH_API_KEY is required".to_string());
        }

        if self.min_minutes_to_jump < 0 {
            return Err("MIN_MINUTES_TO_JUMP must not be negative".to_string());
        }

        if self.min_minutes_to_jump >= self.max_minutes_to_jump {
            return Err("MIN_MINUTES_TO_JUMP must be less than MAX_MINUTES_TO_JUMP".to_string());
        }

        if self.page_size == 0 || self.page_size > 100 {
            return Err("PAGE_SIZE must be between 1 and 100".to_string());
        }

        if self.poll_interval_ms == 0 {
            return Err("POLL_INTERVAL_MS must be positive".to_string());
        }

        if self.target_bookmakers.is_empty() {
            return Err("TARGET_BOOKMAKERS must not be empty".to_string());
        }

        Ok(())
    }

    /// Poll interval as a Duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Inter-page delay as a Duration.
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    /// Per-request HTTP timeout as a Duration.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

/// A fully-defaulted configuration for unit tests across the crate.
#[doc(hidden)]
pub fn test_config() -> Config {
    Config {
        betwatch_api_key: "test-key".to_string(),
        betwatch_url: default_provider_url(),
        target_bookmakers: default_bookmakers(),
        target_race_types: default_race_types(),
        target_locations: default_locations(),
        min_minutes_to_jump: default_min_minutes(),
        max_minutes_to_jump: default_max_minutes(),
        page_size: default_page_size(),
        page_delay_ms: default_page_delay_ms(),
        poll_interval_ms: default_poll_interval_ms(),
        http_timeout_ms: default_http_timeout_ms(),
        retry_max_attempts: default_retry_max_attempts(),
        retry_max_elapsed_secs: default_retry_max_elapsed_secs(),
        retry_initial_backoff_ms: default_retry_initial_backoff_ms(),
        port: default_port(),
        rust_log: default_log_level(),
        verbose: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_sensible() {
        assert_eq!(default_min_minutes(), 2);
        assert_eq!(default_max_minutes(), 15);
        assert_eq!(default_page_size(), 95);
        assert_eq!(default_retry_max_attempts(), 5);
        assert!(default_bookmakers().contains(&"Sportsbet".to_string()));
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_api_key() {
        let config = Config {
            betwatch_api_key: "".to_string(),
            ..test_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_window() {
        let config = Config {
            min_minutes_to_jump: 20,
            max_minutes_to_jump: 15,
            ..test_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_oversized_page() {
        let config = Config {
            page_size: 500,
            ..test_config()
        };
        assert!(config.validate().is_err());
    }
}
