//! Configuration management for the quiz-duel service
//!
//! This module handles all configuration loading from environment variables,
//! optional TOML files, validation, and default values for the session service.

pub mod app;
pub mod rating;

// Re-export commonly used types
pub use app::{
    validate_config, AppConfig, GatewaySettings, ServiceSettings, SessionSettings,
};
pub use rating::RatingConfig;
