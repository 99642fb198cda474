//! Configuration for the farmstead server
//!
//! Values come from environment variables (loaded from `.env` when present)
//! on top of in-code defaults. Required variables: `ENV`, `LOG_LEVEL`,
//! `DATABASE_URL`. Optional with defaults: `LOG_SUGARED`, `HTTP_PORT`,
//! `HTTP_TIMEOUT`.

use std::fmt;

use config::{ConfigError, Environment};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment
    pub env: EnvName,

    /// Logging configuration
    pub log: LogConfig,

    /// HTTP server configuration
    pub http: HttpConfig,

    /// Database configuration
    pub database: DatabaseConfig,
}

/// Deployment environment name
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnvName {
    Development,
    Production,
    Test,
}

impl EnvName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvName::Development => "development",
            EnvName::Production => "production",
            EnvName::Test => "test",
        }
    }
}

impl fmt::Display for EnvName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    /// Minimum level emitted by the subscriber
    pub level: LogLevel,

    /// Human-readable output when true, structured JSON when false
    pub sugared: bool,
}

/// Log verbosity level
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Server port
    pub port: u16,

    /// Graceful shutdown drain window in seconds
    pub timeout: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
}

impl Config {
    /// Load configuration from the environment
    pub fn load() -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            // Defaults for the optional variables
            .set_default("log.sugared", true)?
            .set_default("http.port", 8080)?
            .set_default("http.timeout", 10)?
            // Environment variables: ENV -> env, LOG_LEVEL -> log.level,
            // HTTP_PORT -> http.port, DATABASE_URL -> database.url, ...
            .add_source(Environment::default().separator("_").try_parsing(true))
            .build()?;

        let config: Config = config.try_deserialize()?;

        if !config.database.url.starts_with("postgres://")
            && !config.database.url.starts_with("postgresql://")
        {
            return Err(ConfigError::Message(format!(
                "invalid value for environment variable DATABASE_URL: {}",
                config.database.url
            )));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_name_parses_known_values() {
        for (raw, expected) in [
            ("\"development\"", EnvName::Development),
            ("\"production\"", EnvName::Production),
            ("\"test\"", EnvName::Test),
        ] {
            let parsed: EnvName = serde_json::from_str(raw).unwrap();
            assert_eq!(parsed, expected);
        }
    }

    #[test]
    fn env_name_rejects_unknown_values() {
        assert!(serde_json::from_str::<EnvName>("\"staging\"").is_err());
    }

    #[test]
    fn log_level_rejects_unknown_values() {
        assert!(serde_json::from_str::<LogLevel>("\"trace\"").is_err());
        assert_eq!(
            serde_json::from_str::<LogLevel>("\"warn\"").unwrap(),
            LogLevel::Warn
        );
    }
}
