//! Process configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use messaging::{DELAYED_EXCHANGE, RetryPolicy};

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` bind address (default: `"0.0.0.0"`)
/// - `PORT` listen port (default: `3000`)
/// - `RUST_LOG` tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` `text` or `json` (default: `text`)
/// - `DATABASE_URL` PostgreSQL URL; the in-memory backend is used when unset
/// - `CONSUMER_MAX_RETRIES` redeliveries before dead-lettering (default: `3`)
/// - `CONSUMER_RETRY_DELAY_MS` delay between redeliveries (default: `5000`)
/// - `DELAYED_EXCHANGE` exchange used for retries (default: `"direct.delayed"`)
///
/// Unparseable numbers fall back to their defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub consumer_max_retries: u32,
    pub consumer_retry_delay_ms: u64,
    pub delayed_exchange: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: parse_var(&lookup, "LOG_FORMAT").unwrap_or(defaults.log_format),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            consumer_max_retries: parse_var(&lookup, "CONSUMER_MAX_RETRIES")
                .unwrap_or(defaults.consumer_max_retries),
            consumer_retry_delay_ms: parse_var(&lookup, "CONSUMER_RETRY_DELAY_MS")
                .unwrap_or(defaults.consumer_retry_delay_ms),
            delayed_exchange: lookup("DELAYED_EXCHANGE").unwrap_or(defaults.delayed_exchange),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Retry bounds for integration event consumers.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.consumer_max_retries,
            delay: Duration::from_millis(self.consumer_retry_delay_ms),
            delayed_exchange: self.delayed_exchange.clone(),
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            consumer_max_retries: retry.max_retries,
            consumer_retry_delay_ms: 5000,
            delayed_exchange: DELAYED_EXCHANGE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.database_url.is_none());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_reads_every_key() {
        let config = Config::from_lookup(lookup(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8081"),
            ("RUST_LOG", "debug"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/catalog"),
            ("CONSUMER_MAX_RETRIES", "5"),
            ("CONSUMER_RETRY_DELAY_MS", "250"),
            ("DELAYED_EXCHANGE", "catalog.delayed"),
        ]));

        assert_eq!(config.addr(), "127.0.0.1:8081");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/catalog")
        );

        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.delay, Duration::from_millis(250));
        assert_eq!(policy.delayed_exchange, "catalog.delayed");
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "not-a-port"),
            ("LOG_FORMAT", "yaml"),
            ("CONSUMER_MAX_RETRIES", "-1"),
            ("DATABASE_URL", ""),
        ]));

        assert_eq!(config.port, 3000);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.consumer_max_retries, 3);
        assert!(config.database_url.is_none());
    }
}
