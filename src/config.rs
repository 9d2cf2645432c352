use std::env;
use std::ops::{Range, RangeInclusive};
use std::time::Duration;
use log::warn;

use crate::error::ConfigError;

// Server Configuration
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const STATS_INTERVAL_SECS: u64 = 60;

// Source Configuration
pub const DEFAULT_POLYGON_BASE_URL: &str = "https://api.polygon.io";
pub const DEFAULT_MAX_PAGES: usize = 1;
pub const FETCH_TIMEOUT_SECS: u64 = 30;

// Poller Configuration
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_ERROR_COOLDOWN_SECS: u64 = 60;
pub const DEFAULT_EMPTY_COOLDOWN_SECS: u64 = 3600;
pub const DEFAULT_SNAPSHOT_FILE: &str = "stocks.json";

// Value generation bounds
pub const DEFAULT_PRICE_MIN: f64 = 0.0;
pub const DEFAULT_PRICE_MAX: f64 = 100.0;
pub const DEFAULT_INTERVAL_MIN: u32 = 1;
pub const DEFAULT_INTERVAL_MAX: u32 = 5;

// Subscriber Configuration
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub bind_host: String,
    pub port: u16,
    pub polygon_base_url: String,
    pub max_pages: usize,
    pub poll_interval: Duration,
    pub error_cooldown: Duration,
    pub empty_cooldown: Duration,
    pub snapshot_file: String,
    pub price_min: f64,
    pub price_max: f64,
    pub interval_min: u32,
    pub interval_max: u32,
    pub subscriber_buffer: usize,
    pub send_timeout: Duration,
    pub client_publish: bool,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Unparseable numbers fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let secs = |key: &str, default: u64| Duration::from_secs(parse_or(&lookup, key, default));

        Self {
            api_key: lookup("POLYGON_API_KEY").filter(|key| !key.trim().is_empty()),
            bind_host: lookup("BIND_HOST").unwrap_or_else(|| DEFAULT_BIND_HOST.to_string()),
            port: parse_or(&lookup, "PORT", DEFAULT_PORT),
            polygon_base_url: lookup("POLYGON_BASE_URL")
                .unwrap_or_else(|| DEFAULT_POLYGON_BASE_URL.to_string()),
            max_pages: parse_or(&lookup, "MAX_PAGES", DEFAULT_MAX_PAGES),
            poll_interval: secs("POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS),
            error_cooldown: secs("ERROR_COOLDOWN_SECS", DEFAULT_ERROR_COOLDOWN_SECS),
            empty_cooldown: secs("EMPTY_COOLDOWN_SECS", DEFAULT_EMPTY_COOLDOWN_SECS),
            snapshot_file: lookup("SNAPSHOT_FILE")
                .unwrap_or_else(|| DEFAULT_SNAPSHOT_FILE.to_string()),
            price_min: parse_or(&lookup, "PRICE_MIN", DEFAULT_PRICE_MIN),
            price_max: parse_or(&lookup, "PRICE_MAX", DEFAULT_PRICE_MAX),
            interval_min: parse_or(&lookup, "INTERVAL_MIN", DEFAULT_INTERVAL_MIN),
            interval_max: parse_or(&lookup, "INTERVAL_MAX", DEFAULT_INTERVAL_MAX),
            subscriber_buffer: parse_or(&lookup, "SUBSCRIBER_BUFFER", DEFAULT_SUBSCRIBER_BUFFER),
            send_timeout: secs("SEND_TIMEOUT_SECS", DEFAULT_SEND_TIMEOUT_SECS),
            client_publish: parse_or(&lookup, "CLIENT_PUBLISH", true),
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.is_none() {
            return Err(ConfigError::MissingApiKey);
        }

        if self.port == 0 {
            return Err(invalid("PORT", "must be non-zero"));
        }

        if self.poll_interval.is_zero() {
            return Err(invalid("POLL_INTERVAL_SECS", "must be at least one second"));
        }

        if self.subscriber_buffer == 0 {
            return Err(invalid("SUBSCRIBER_BUFFER", "must be at least 1"));
        }

        if self.max_pages == 0 {
            return Err(invalid("MAX_PAGES", "must be at least 1"));
        }

        if !self.price_min.is_finite() || !self.price_max.is_finite() {
            return Err(invalid("PRICE_MIN", "price bounds must be finite"));
        }

        if self.price_min >= self.price_max {
            return Err(invalid("PRICE_MIN", "must be below PRICE_MAX"));
        }

        if self.interval_min > self.interval_max {
            return Err(invalid("INTERVAL_MIN", "must not exceed INTERVAL_MAX"));
        }

        if self.error_cooldown > self.empty_cooldown {
            warn!("ERROR_COOLDOWN_SECS exceeds EMPTY_COOLDOWN_SECS; empty listings will retry sooner than failures");
        }

        Ok(())
    }

    pub fn api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or_default()
    }

    pub fn price_range(&self) -> Range<f64> {
        self.price_min..self.price_max
    }

    pub fn interval_range(&self) -> RangeInclusive<u32> {
        self.interval_min..=self.interval_max
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }

    pub fn log_config(&self) {
        let masked = self
            .api_key
            .as_deref()
            .map(|key| format!("{}***", key.chars().take(4).collect::<String>()))
            .unwrap_or_else(|| "<unset>".to_string());

        println!("Server Configuration:");
        println!("  Bind Address: {}", self.bind_address());
        println!("  Ticker Source: {} (max {} page(s))", self.polygon_base_url, self.max_pages);
        println!("  Poll Interval: {:?}", self.poll_interval);
        println!("  Cooldowns: error {:?}, empty {:?}", self.error_cooldown, self.empty_cooldown);
        println!("  Snapshot File: {}", self.snapshot_file);
        println!("  Price Range: {:?}, Refresh Interval: {:?}", self.price_range(), self.interval_range());
        println!("  Subscriber Buffer: {} (send timeout {:?})", self.subscriber_buffer, self.send_timeout);
        println!("  Client Publish: {}", self.client_publish);
        println!("  Log Level: {}", self.log_level);
        println!("  API Key: {}", masked);
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an unparseable value '{}', using default", key, raw);
            default
        }),
        None => default,
    }
}

fn invalid(key: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue { key, reason: reason.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_config_defaults() {
        let config = config_with(&[]);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.bind_address(), "0.0.0.0:3001");
        assert_eq!(config.poll_interval, Duration::from_secs(3600));
        assert_eq!(config.error_cooldown, Duration::from_secs(60));
        assert_eq!(config.empty_cooldown, Duration::from_secs(3600));
        assert_eq!(config.snapshot_file, "stocks.json");
        assert!(config.client_publish);
        assert!(config.api_key.is_none());
        assert_eq!(config.price_range(), 0.0..100.0);
        assert_eq!(config.interval_range(), 1..=5);
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let config = config_with(&[("POLYGON_API_KEY", "   ")]);
        assert!(matches!(config.validate(), Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn test_config_overrides() {
        let config = config_with(&[
            ("POLYGON_API_KEY", "abcdef"),
            ("PORT", "8080"),
            ("POLL_INTERVAL_SECS", "15"),
            ("CLIENT_PUBLISH", "false"),
            ("MAX_PAGES", "3"),
        ]);
        assert!(config.validate().is_ok());
        assert_eq!(config.port, 8080);
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.max_pages, 3);
        assert!(!config.client_publish);
        assert_eq!(config.api_key(), "abcdef");
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = config_with(&[("PORT", "not-a-port"), ("SUBSCRIBER_BUFFER", "-1")]);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.subscriber_buffer, DEFAULT_SUBSCRIBER_BUFFER);
    }

    #[test]
    fn test_config_validation() {
        let mut config = config_with(&[("POLYGON_API_KEY", "key")]);
        config.subscriber_buffer = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { key: "SUBSCRIBER_BUFFER", .. })
        ));

        config.subscriber_buffer = 1;
        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_value_bounds_overrides() {
        let config = config_with(&[
            ("POLYGON_API_KEY", "key"),
            ("PRICE_MIN", "10"),
            ("PRICE_MAX", "20.5"),
            ("INTERVAL_MIN", "2"),
            ("INTERVAL_MAX", "2"),
        ]);
        assert!(config.validate().is_ok());
        assert_eq!(config.price_range(), 10.0..20.5);
        assert_eq!(config.interval_range(), 2..=2);
    }

    #[test]
    fn test_value_bounds_validation() {
        let inverted_prices = config_with(&[("POLYGON_API_KEY", "key"), ("PRICE_MIN", "50"), ("PRICE_MAX", "50")]);
        assert!(matches!(
            inverted_prices.validate(),
            Err(ConfigError::InvalidValue { key: "PRICE_MIN", .. })
        ));

        let infinite = config_with(&[("POLYGON_API_KEY", "key"), ("PRICE_MAX", "inf")]);
        assert!(infinite.validate().is_err());

        let inverted_intervals = config_with(&[("POLYGON_API_KEY", "key"), ("INTERVAL_MIN", "6")]);
        assert!(matches!(
            inverted_intervals.validate(),
            Err(ConfigError::InvalidValue { key: "INTERVAL_MIN", .. })
        ));
    }
}
