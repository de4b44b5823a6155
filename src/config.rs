//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;

use crate::ledger::FundsPolicy;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Hex SHA-256 digests of accepted API keys
    pub api_key_hashes: Vec<String>,

    /// Let transfers take the source account below zero
    pub allow_overdraft: bool,

    /// Apply embedded migrations at startup
    pub run_migrations: bool,

    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORT"))?;

        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        let api_key_hashes = lookup("API_KEY_HASHES")
            .map(|raw| parse_key_hashes(&raw))
            .transpose()?
            .unwrap_or_default();

        let allow_overdraft = parse_bool(lookup("ALLOW_OVERDRAFT"), "ALLOW_OVERDRAFT")?;
        let run_migrations = parse_bool(lookup("RUN_MIGRATIONS"), "RUN_MIGRATIONS")?;

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(_) => return Err(ConfigError::InvalidValue("LOG_FORMAT")),
        };

        let config = Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            api_key_hashes,
            allow_overdraft,
            run_migrations,
            log_format,
        };

        // A production server with no keys would reject every request
        if config.is_production() && config.api_key_hashes.is_empty() {
            return Err(ConfigError::MissingEnv("API_KEY_HASHES"));
        }

        Ok(config)
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn funds_policy(&self) -> FundsPolicy {
        if self.allow_overdraft {
            FundsPolicy::AllowOverdraft
        } else {
            FundsPolicy::RequireSufficient
        }
    }
}

fn parse_bool(value: Option<String>, key: &'static str) -> Result<bool, ConfigError> {
    match value.as_deref() {
        None => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some("false") | Some("0") => Ok(false),
        Some(_) => Err(ConfigError::InvalidValue(key)),
    }
}

fn parse_key_hashes(raw: &str) -> Result<Vec<String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|digest| {
            let valid = digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit());
            if valid {
                Ok(digest.to_ascii_lowercase())
            } else {
                Err(ConfigError::InvalidValue("API_KEY_HASHES"))
            }
        })
        .collect()
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
