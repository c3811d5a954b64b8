//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::timezone::{TimezoneError, Zone};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Zone that draws day boundaries for snapshots
    pub timezone: Zone,

    /// Per-handler projection timeout; `None` disables it
    pub projection_handler_timeout: Option<Duration>,

    /// Clear and regenerate the read model at startup
    pub rebuild_on_start: bool,

    /// Environment (development, production)
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let timezone = env::var("TIMEZONE").unwrap_or_else(|_| "UTC".to_string());
        let timezone = parse_timezone(&timezone)?;

        let timeout_ms: u64 = env::var("PROJECTION_HANDLER_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PROJECTION_HANDLER_TIMEOUT_MS"))?;

        let rebuild_on_start = parse_flag(
            "REBUILD_ON_START",
            &env::var("REBUILD_ON_START").unwrap_or_else(|_| "false".to_string()),
        )?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        Ok(Self {
            database_url,
            database_max_connections,
            timezone,
            projection_handler_timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
            rebuild_on_start,
            environment,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_timezone(value: &str) -> Result<Zone, ConfigError> {
    Ok(value.parse()?)
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue(name)),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),

    #[error("Invalid value for environment variable TIMEZONE: {0}")]
    Timezone(#[from] TimezoneError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("X", "true").unwrap());
        assert!(parse_flag("X", " YES ").unwrap());
        assert!(!parse_flag("X", "0").unwrap());
        assert!(matches!(
            parse_flag("X", "maybe"),
            Err(ConfigError::InvalidValue("X"))
        ));
    }

    #[test]
    fn test_parse_timezone_keeps_cause() {
        assert_eq!(parse_timezone("Asia/Tokyo").unwrap().identifier(), "Asia/Tokyo");

        let err = parse_timezone("Mars/Olympus").unwrap_err();
        assert!(matches!(
            &err,
            ConfigError::Timezone(TimezoneError::Unrecognized(value)) if value == "Mars/Olympus"
        ));
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("Mars/Olympus"));
    }
}
