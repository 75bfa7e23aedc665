//! API configuration

use serde::Deserialize;

/// API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Database URL; an empty string selects the in-memory backend
    pub database_url: String,
    /// Shared secret for gateway webhook signatures
    pub webhook_secret: String,
    /// Ceiling in seconds on one webhook verification pass
    pub verification_timeout_secs: u64,
    /// Log level
    pub log_level: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: String::new(),
            webhook_secret: "change-me-in-production".to_string(),
            verification_timeout_secs: 10,
            log_level: "info".to_string(),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API"))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// True when no database URL was supplied and the process should run
    /// against the in-memory store.
    pub fn use_in_memory_store(&self) -> bool {
        self.database_url.trim().is_empty()
    }
}
