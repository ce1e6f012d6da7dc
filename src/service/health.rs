//! Health, metrics and ranking endpoints
//!
//! This module provides the HTTP observability surface of the service:
//! a health summary, Prometheus metrics, and the read-only ranking listing.

use crate::metrics::MetricsCollector;
use crate::session::manager::SessionManager;
use crate::store::SessionStore;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Library version
    pub version: String,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
    /// Session statistics
    pub stats: SessionStatsReport,
}

/// Session statistics for health reporting
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionStatsReport {
    pub active_rooms: usize,
    pub waiting_rooms: usize,
    pub pairing_requests: u64,
    pub matches_settled: u64,
    pub matches_cancelled: u64,
    pub connected_players: i64,
}

/// One row of the public ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingEntry {
    pub id: String,
    pub display_name: String,
    pub rating: i32,
}

/// State shared by the observability handlers
pub struct HealthContext {
    pub service_name: String,
    pub manager: Arc<SessionManager>,
    pub store: Arc<dyn SessionStore>,
    pub metrics: Arc<MetricsCollector>,
    pub ranking_limit: usize,
}

impl HealthCheck {
    /// Build a health summary from the live session manager
    pub fn gather(ctx: &HealthContext) -> Self {
        let (status, stats) = match ctx.manager.stats() {
            Ok(stats) => (
                HealthStatus::Healthy,
                SessionStatsReport {
                    active_rooms: stats.active_rooms,
                    waiting_rooms: stats.waiting_rooms,
                    pairing_requests: stats.pairing_requests,
                    matches_settled: stats.matches_settled,
                    matches_cancelled: stats.matches_cancelled,
                    connected_players: ctx.metrics.gateway().connected_players.get(),
                },
            ),
            Err(e) => {
                error!("Health check could not read session stats: {}", e);
                (HealthStatus::Unhealthy, SessionStatsReport::default())
            }
        };

        Self {
            status,
            service: ctx.service_name.clone(),
            version: crate::VERSION.to_string(),
            timestamp: crate::utils::current_timestamp(),
            stats,
        }
    }
}

/// Build the observability router (`/health`, `/metrics`, `/ranking`)
pub fn observability_router(ctx: Arc<HealthContext>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/ranking", get(ranking_handler))
        .with_state(ctx)
}

async fn health_handler(State(ctx): State<Arc<HealthContext>>) -> impl IntoResponse {
    let health = HealthCheck::gather(&ctx);
    let status = match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(health))
}

async fn metrics_handler(State(ctx): State<Arc<HealthContext>>) -> impl IntoResponse {
    let families = ctx.metrics.registry().gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    match encoder.encode(&families, &mut buffer) {
        Ok(()) => (StatusCode::OK, buffer).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "encoding error").into_response()
        }
    }
}

async fn ranking_handler(State(ctx): State<Arc<HealthContext>>) -> impl IntoResponse {
    match ctx.store.top_by_rating(ctx.ranking_limit).await {
        Ok(users) => {
            let entries: Vec<RankingEntry> = users
                .into_iter()
                .map(|user| RankingEntry {
                    id: user.id,
                    display_name: user.display_name,
                    rating: user.rating,
                })
                .collect();
            Json(entries).into_response()
        }
        Err(e) => {
            error!("Ranking query failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "store unavailable").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RatingConfig, SessionSettings};
    use crate::gateway::registry::MockEventSink;
    use crate::store::InMemorySessionStore;
    use crate::types::UserProfile;

    fn test_context() -> Arc<HealthContext> {
        let metrics = Arc::new(MetricsCollector::default());
        let store = Arc::new(InMemorySessionStore::new());
        let mut profile = UserProfile::new("p1".to_string(), "One".to_string());
        profile.rating = 1300;
        store.seed_user(profile);

        let manager = Arc::new(
            SessionManager::with_metrics(
                store.clone(),
                Arc::new(MockEventSink::new()),
                SessionSettings::default(),
                RatingConfig::default(),
                metrics.clone(),
            )
            .unwrap(),
        );

        Arc::new(HealthContext {
            service_name: "quiz-duel-test".to_string(),
            manager,
            store,
            metrics,
            ranking_limit: 10,
        })
    }

    #[tokio::test]
    async fn test_health_gather_reports_healthy() {
        let ctx = test_context();
        let health = HealthCheck::gather(&ctx);
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.service, "quiz-duel-test");
        assert_eq!(health.stats.active_rooms, 0);
    }

    #[tokio::test]
    async fn test_ranking_handler_serves_store_contents() {
        let ctx = test_context();
        let top = ctx.store.top_by_rating(ctx.ranking_limit).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].rating, 1300);
    }
}
