//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use bitacora_core::identity::MasterCredentials;
use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub advisory_model: String,
    pub summary_model: String,
    pub cors_origin: String,
    pub session_ttl_days: i64,
    pub master_credentials: MasterCredentials,
}

fn list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Empty values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // --- Load Server and Database Settings ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url =
            var("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            var("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        let session_ttl_days = match var("SESSION_TTL_DAYS") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|d| *d > 0)
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "SESSION_TTL_DAYS".to_string(),
                        format!("'{}' is not a positive number of days", raw),
                    )
                })?,
            None => 30,
        };

        // --- Load AI Provider Settings (key is optional) ---
        let openai_api_key = var("OPENAI_API_KEY");
        let openai_base_url = var("OPENAI_BASE_URL");
        let advisory_model = var("ADVISORY_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());
        let summary_model = var("SUMMARY_MODEL").unwrap_or_else(|| "gpt-4o".to_string());

        // --- Load Bootstrap Accounts ---
        let defaults = MasterCredentials::default();
        let master_credentials = MasterCredentials {
            admin_users: var("MASTER_ADMIN_USERS")
                .map(|raw| list(&raw))
                .unwrap_or(defaults.admin_users),
            admin_password: var("MASTER_ADMIN_PASSWORD").unwrap_or(defaults.admin_password),
            operator_users: var("MASTER_OPERATOR_USERS")
                .map(|raw| list(&raw))
                .unwrap_or(defaults.operator_users),
            operator_password: var("MASTER_OPERATOR_PASSWORD")
                .unwrap_or(defaults.operator_password),
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            openai_base_url,
            advisory_model,
            summary_model,
            cors_origin,
            session_ttl_days,
            master_credentials,
        })
    }
}
