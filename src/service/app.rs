//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the store, the
//! session manager, the connection gateway and the HTTP server together,
//! and manages background tasks and graceful shutdown.

use crate::config::AppConfig;
use crate::gateway::auth::{IdentityVerifier, JwtIdentityVerifier};
use crate::gateway::registry::ConnectionRegistry;
use crate::gateway::ws::{ws_upgrade, GatewayContext};
use crate::metrics::MetricsCollector;
use crate::service::health::{observability_router, HealthContext};
use crate::session::manager::{SessionManager, SessionStats};
use crate::store::{InMemorySessionStore, SessionStore};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Failed to bind {address}: {message}")]
    Bind { address: String, message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Durable session store
    store: Arc<dyn SessionStore>,

    /// Core session manager
    manager: Arc<SessionManager>,

    /// Live connection registry
    connections: Arc<ConnectionRegistry>,

    /// Token verifier for socket upgrades
    verifier: Arc<dyn IdentityVerifier>,

    /// Metrics collector shared by all components
    metrics: Arc<MetricsCollector>,

    /// HTTP server task handle
    server_task: Option<JoinHandle<()>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the application with the bundled in-memory store and the
    /// JWT verifier configured from the gateway settings.
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let verifier: Arc<dyn IdentityVerifier> =
            Arc::new(JwtIdentityVerifier::new(&config.gateway.token_secret));
        Self::with_components(config, store, verifier).await
    }

    /// Initialize with explicit store and verifier implementations
    pub async fn with_components(
        config: AppConfig,
        store: Arc<dyn SessionStore>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Result<Self, ServiceError> {
        info!("Initializing quiz-duel session service");
        info!(
            "Configuration: service={}, bind={}:{}, pairing_window=±{}, questions_per_match={}",
            config.service.name,
            config.service.bind_address,
            config.service.http_port,
            config.session.pairing_window,
            config.session.questions_per_match
        );

        let metrics = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);

        let connections = Arc::new(ConnectionRegistry::new(metrics.clone()));

        let manager = Arc::new(
            SessionManager::with_metrics(
                store.clone(),
                connections.clone(),
                config.session.clone(),
                config.rating.clone(),
                metrics.clone(),
            )
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to create session manager: {}", e),
            })?,
        );

        Ok(Self {
            config,
            store,
            manager,
            connections,
            verifier,
            metrics,
            server_task: None,
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Build the complete HTTP router: socket endpoint plus observability
    pub fn router(&self) -> Router {
        let gateway_ctx = Arc::new(GatewayContext {
            verifier: self.verifier.clone(),
            connections: self.connections.clone(),
            manager: self.manager.clone(),
            metrics: self.metrics.clone(),
            max_connections: self.config.gateway.max_connections,
        });

        let health_ctx = Arc::new(HealthContext {
            service_name: self.config.service.name.clone(),
            manager: self.manager.clone(),
            store: self.store.clone(),
            metrics: self.metrics.clone(),
            ranking_limit: self.config.session.ranking_limit,
        });

        Router::new()
            .route("/ws", get(ws_upgrade))
            .with_state(gateway_ctx)
            .merge(observability_router(health_ctx))
    }

    /// Start the HTTP server and background tasks
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        let address = format!(
            "{}:{}",
            self.config.service.bind_address, self.config.service.http_port
        );
        info!("Starting quiz-duel service on {}", address);

        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| ServiceError::Bind {
                address: address.clone(),
                message: e.to_string(),
            })?;

        let router = self.router();
        let is_running = self.is_running.clone();

        *self.is_running.write().await = true;

        self.server_task = Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!("HTTP server terminated: {}", e);
            }
            *is_running.write().await = false;
        }));

        // Stale-room reaper bounds the otherwise unbounded wait states.
        self.manager.clone().start_reaper_task();

        info!("Quiz-duel session service started on {}", address);
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) {
        info!("Shutting down quiz-duel service");
        *self.is_running.write().await = false;

        if let Some(task) = self.server_task.take() {
            task.abort();
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("Server task ended abnormally: {}", e);
                }
            }
        }

        info!("Quiz-duel service stopped");
    }

    /// Whether the service is currently accepting work
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Application configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Core session manager
    pub fn manager(&self) -> Arc<SessionManager> {
        self.manager.clone()
    }

    /// Current session statistics
    pub fn session_stats(&self) -> crate::error::Result<SessionStats> {
        self.manager.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_app_state_initialization() {
        let state = AppState::new(AppConfig::default()).await.unwrap();
        assert!(!state.is_running().await);

        let stats = state.session_stats().unwrap();
        assert_eq!(stats.active_rooms, 0);
        assert_eq!(stats.pairing_requests, 0);
    }

    #[tokio::test]
    async fn test_router_builds() {
        let state = AppState::new(AppConfig::default()).await.unwrap();
        let _router = state.router();
    }
}
