//! Metrics and monitoring for the quiz-duel session service
//!
//! This module provides Prometheus metrics collection for the session
//! manager, room registry and connection gateway.

pub mod collector;

pub use collector::{GatewayMetrics, MetricsCollector, SessionMetrics};
