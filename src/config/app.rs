//! Main application configuration
//!
//! This module defines the primary configuration structures for the quiz-duel
//! session service, including environment variable loading and validation.

use crate::config::rating::RatingConfig;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub gateway: GatewaySettings,
    pub session: SessionSettings,
    pub rating: RatingConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Bind address for the HTTP/WebSocket server
    pub bind_address: String,
    /// Port for the HTTP/WebSocket server
    pub http_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Connection gateway settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    /// HMAC secret for verifying connection tokens
    pub token_secret: String,
    /// Maximum concurrent socket connections
    pub max_connections: u32,
}

/// Session manager settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Rating-difference tolerance for pairing (± window)
    pub pairing_window: i32,
    /// Number of questions distributed per match
    pub questions_per_match: usize,
    /// Interval between stale-room reaper runs, in seconds
    pub reap_interval_seconds: u64,
    /// Age after which a room still waiting for an opponent is cancelled
    pub waiting_timeout_seconds: u64,
    /// Inactivity after which an in-progress room is voided
    pub stalled_timeout_seconds: u64,
    /// Number of entries served by the ranking endpoint
    pub ranking_limit: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "quiz-duel".to_string(),
            log_level: "info".to_string(),
            bind_address: "0.0.0.0".to_string(),
            http_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            token_secret: "change-me".to_string(),
            max_connections: 10_000,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            pairing_window: 200,
            questions_per_match: 10,
            reap_interval_seconds: 60,
            waiting_timeout_seconds: 300, // 5 minutes alone in a room
            stalled_timeout_seconds: 900, // 15 minutes without a report
            ranking_limit: 10,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(addr) = env::var("BIND_ADDRESS") {
            config.service.bind_address = addr;
        }
        if let Ok(port) = env::var("HTTP_PORT") {
            config.service.http_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid HTTP_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Gateway settings
        if let Ok(secret) = env::var("TOKEN_SECRET") {
            config.gateway.token_secret = secret;
        }
        if let Ok(max_conns) = env::var("MAX_CONNECTIONS") {
            config.gateway.max_connections = max_conns
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_CONNECTIONS value: {}", max_conns))?;
        }

        // Session settings
        if let Ok(window) = env::var("PAIRING_WINDOW") {
            config.session.pairing_window = window
                .parse()
                .map_err(|_| anyhow!("Invalid PAIRING_WINDOW value: {}", window))?;
        }
        if let Ok(count) = env::var("QUESTIONS_PER_MATCH") {
            config.session.questions_per_match = count
                .parse()
                .map_err(|_| anyhow!("Invalid QUESTIONS_PER_MATCH value: {}", count))?;
        }
        if let Ok(interval) = env::var("REAP_INTERVAL_SECONDS") {
            config.session.reap_interval_seconds = interval
                .parse()
                .map_err(|_| anyhow!("Invalid REAP_INTERVAL_SECONDS value: {}", interval))?;
        }
        if let Ok(timeout) = env::var("WAITING_TIMEOUT_SECONDS") {
            config.session.waiting_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid WAITING_TIMEOUT_SECONDS value: {}", timeout))?;
        }
        if let Ok(timeout) = env::var("STALLED_TIMEOUT_SECONDS") {
            config.session.stalled_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid STALLED_TIMEOUT_SECONDS value: {}", timeout))?;
        }
        if let Ok(limit) = env::var("RANKING_LIMIT") {
            config.session.ranking_limit = limit
                .parse()
                .map_err(|_| anyhow!("Invalid RANKING_LIMIT value: {}", limit))?;
        }

        // Rating settings
        if let Ok(k) = env::var("RATING_K_FACTOR") {
            config.rating.k_factor = k
                .parse()
                .map_err(|_| anyhow!("Invalid RATING_K_FACTOR value: {}", k))?;
        }
        if let Ok(rating) = env::var("RATING_DEFAULT") {
            config.rating.default_rating = rating
                .parse()
                .map_err(|_| anyhow!("Invalid RATING_DEFAULT value: {}", rating))?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then validate
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path.display(), e))?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get reap interval as Duration
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.session.reap_interval_seconds)
    }

    /// Get waiting-room timeout as Duration
    pub fn waiting_timeout(&self) -> Duration {
        Duration::from_secs(self.session.waiting_timeout_seconds)
    }

    /// Get stalled-room timeout as Duration
    pub fn stalled_timeout(&self) -> Duration {
        Duration::from_secs(self.session.stalled_timeout_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.session.reap_interval_seconds == 0 {
        return Err(anyhow!("Reap interval must be greater than 0"));
    }
    if config.session.waiting_timeout_seconds == 0 {
        return Err(anyhow!("Waiting timeout must be greater than 0"));
    }
    if config.session.stalled_timeout_seconds == 0 {
        return Err(anyhow!("Stalled timeout must be greater than 0"));
    }

    // Validate gateway settings
    if config.gateway.token_secret.is_empty() {
        return Err(anyhow!("Token secret cannot be empty"));
    }
    if config.gateway.max_connections == 0 {
        return Err(anyhow!("Max connections must be greater than 0"));
    }

    // Validate session settings
    if config.session.pairing_window < 0 {
        return Err(anyhow!("Pairing window cannot be negative"));
    }
    if config.session.questions_per_match == 0 {
        return Err(anyhow!("Questions per match must be greater than 0"));
    }
    if config.session.ranking_limit == 0 {
        return Err(anyhow!("Ranking limit must be greater than 0"));
    }

    // Validate rating settings
    if config.rating.k_factor <= 0.0 {
        return Err(anyhow!("Rating K-factor must be positive"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.session.pairing_window, 200);
        assert_eq!(config.session.questions_per_match, 10);
        assert_eq!(config.rating.k_factor, 20.0);
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut config = AppConfig::default();
        config.service.log_level = "verbose".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_questions_rejected() {
        let mut config = AppConfig::default();
        config.session.questions_per_match = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_negative_pairing_window_rejected() {
        let mut config = AppConfig::default();
        config.session.pairing_window = -1;
        assert!(validate_config(&config).is_err());
    }
}
