//! Service layer for the quiz-duel session service
//!
//! This module contains the main application state, HTTP/WebSocket router
//! construction, health reporting, and background task management for the
//! production service.

pub mod app;
pub mod health;

pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthStatus};
