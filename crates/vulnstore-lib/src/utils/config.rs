// Application configuration
// Read from the environment, optionally seeded from a .env file

use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use super::database::DATABASE_FILE;

/// Only raw GitHub content is fetched unless configured otherwise
pub const DEFAULT_TRUSTED_SOURCE_PREFIX: &str = "https://raw.githubusercontent.com/";

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_WORKER_COUNT: usize = 3;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 2;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DB_CONNECT_ATTEMPTS: u32 = 10;

/// Configuration error, fatal at startup
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Fetch-related settings handed to the HTTP fetcher
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    pub trusted_prefix: String,
    pub retry_delay: Duration,
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            trusted_prefix: DEFAULT_TRUSTED_SOURCE_PREFIX.to_string(),
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }
}

/// Process-wide settings
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub db_connect_attempts: u32,
    pub host: IpAddr,
    pub port: u16,
    pub worker_count: usize,
    /// Used by `/scan` when the request omits `repo`
    pub default_source: Option<String>,
    pub fetch: FetchConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DATABASE_FILE),
            db_connect_attempts: DEFAULT_DB_CONNECT_ATTEMPTS,
            host: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            worker_count: DEFAULT_WORKER_COUNT,
            default_source: None,
            fetch: FetchConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from process environment after reading an optional `.env`
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let worker_count: usize = parse_or(&get, "WORKER_COUNT", defaults.worker_count)?;
        if worker_count == 0 {
            return Err(ConfigError::InvalidValue {
                key: "WORKER_COUNT",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let retry_delay_secs: u64 =
            parse_or(&get, "FETCH_RETRY_DELAY_SECS", DEFAULT_RETRY_DELAY_SECS)?;
        let timeout_secs: u64 = parse_or(&get, "FETCH_TIMEOUT_SECS", DEFAULT_FETCH_TIMEOUT_SECS)?;

        Ok(Self {
            database_path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            db_connect_attempts: parse_or(&get, "DB_CONNECT_ATTEMPTS", defaults.db_connect_attempts)?,
            host: parse_or(&get, "APP_HOST", defaults.host)?,
            port: parse_or(&get, "APP_PORT", defaults.port)?,
            worker_count,
            default_source: get("SOURCE_REPO_URL"),
            fetch: FetchConfig {
                trusted_prefix: get("TRUSTED_SOURCE_PREFIX")
                    .unwrap_or(defaults.fetch.trusted_prefix),
                retry_delay: Duration::from_secs(retry_delay_secs),
                timeout: Duration::from_secs(timeout_secs),
            },
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config, AppConfig::default());
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.port, 8080);
        assert_eq!(config.fetch.retry_delay, Duration::from_secs(2));
        assert_eq!(config.fetch.trusted_prefix, DEFAULT_TRUSTED_SOURCE_PREFIX);
        assert!(config.default_source.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("DATABASE_PATH", "/tmp/scans.db"),
            ("APP_PORT", "9090"),
            ("APP_HOST", "127.0.0.1"),
            ("WORKER_COUNT", "8"),
            ("SOURCE_REPO_URL", "https://raw.githubusercontent.com/acme/scans/main"),
            ("FETCH_RETRY_DELAY_SECS", "0"),
        ])
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/scans.db"));
        assert_eq!(config.port, 9090);
        assert_eq!(config.host, IpAddr::from([127, 0, 0, 1]));
        assert_eq!(config.worker_count, 8);
        assert_eq!(
            config.default_source.as_deref(),
            Some("https://raw.githubusercontent.com/acme/scans/main")
        );
        assert_eq!(config.fetch.retry_delay, Duration::ZERO);
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = load(&[("APP_PORT", "  "), ("SOURCE_REPO_URL", "")]).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.default_source.is_none());
    }

    #[test]
    fn test_invalid_values() {
        let err = load(&[("APP_PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "APP_PORT", .. }));

        let err = load(&[("WORKER_COUNT", "0")]).unwrap_err();
        assert!(err.to_string().contains("WORKER_COUNT"));
    }
}
