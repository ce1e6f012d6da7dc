//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the quiz-duel session
//! service using Prometheus metrics.

use anyhow::Result;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;

/// Main metrics collector for the session service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Session-manager metrics
    session_metrics: SessionMetrics,

    /// Connection-gateway metrics
    gateway_metrics: GatewayMetrics,
}

/// Session-manager metrics
#[derive(Clone)]
pub struct SessionMetrics {
    /// Total pairing requests handled
    pub pairing_requests_total: IntCounter,

    /// Total rooms created
    pub rooms_created_total: IntCounter,

    /// Total pairings that joined an existing room
    pub rooms_joined_total: IntCounter,

    /// Total matches settled, labelled by outcome (win/draw)
    pub matches_settled_total: IntCounterVec,

    /// Total matches cancelled or voided, labelled by reason
    pub matches_cancelled_total: IntCounterVec,

    /// Total rooms reclaimed by the reaper, labelled by room state
    pub rooms_reaped_total: IntCounterVec,

    /// Currently active rooms
    pub active_rooms: IntGauge,
}

/// Connection-gateway metrics
#[derive(Clone)]
pub struct GatewayMetrics {
    /// Currently connected players
    pub connected_players: IntGauge,

    /// Total inbound client events, labelled by event name
    pub events_received_total: IntCounterVec,

    /// Total handler failures converted to error pushes
    pub handler_errors_total: IntCounter,

    /// Pushes dropped because the target identity was not connected
    pub push_drops_total: IntCounter,

    /// Prior connections evicted by a newer one for the same identity
    pub connections_evicted_total: IntCounter,
}

impl MetricsCollector {
    /// Create a new metrics collector with a fresh registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let session_metrics = SessionMetrics::new(&registry)?;
        let gateway_metrics = GatewayMetrics::new(&registry)?;

        Ok(Self {
            registry,
            session_metrics,
            gateway_metrics,
        })
    }

    /// Get the underlying Prometheus registry for gathering
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Session-manager metrics accessor
    pub fn session(&self) -> &SessionMetrics {
        &self.session_metrics
    }

    /// Gateway metrics accessor
    pub fn gateway(&self) -> &GatewayMetrics {
        &self.gateway_metrics
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        // Registration against a fresh registry only fails on duplicate or
        // malformed metric definitions, which the tests below pin down.
        Self::new().expect("metric registration against a fresh registry")
    }
}

impl SessionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let pairing_requests_total = IntCounter::with_opts(Opts::new(
            "pairing_requests_total",
            "Total pairing requests handled",
        ))?;
        let rooms_created_total = IntCounter::with_opts(Opts::new(
            "rooms_created_total",
            "Total rooms created",
        ))?;
        let rooms_joined_total = IntCounter::with_opts(Opts::new(
            "rooms_joined_total",
            "Total pairings that joined an existing room",
        ))?;
        let matches_settled_total = IntCounterVec::new(
            Opts::new("matches_settled_total", "Total matches settled"),
            &["outcome"],
        )?;
        let matches_cancelled_total = IntCounterVec::new(
            Opts::new("matches_cancelled_total", "Total matches cancelled or voided"),
            &["reason"],
        )?;
        let rooms_reaped_total = IntCounterVec::new(
            Opts::new("rooms_reaped_total", "Total rooms reclaimed by the reaper"),
            &["state"],
        )?;
        let active_rooms =
            IntGauge::with_opts(Opts::new("active_rooms", "Currently active rooms"))?;

        registry.register(Box::new(pairing_requests_total.clone()))?;
        registry.register(Box::new(rooms_created_total.clone()))?;
        registry.register(Box::new(rooms_joined_total.clone()))?;
        registry.register(Box::new(matches_settled_total.clone()))?;
        registry.register(Box::new(matches_cancelled_total.clone()))?;
        registry.register(Box::new(rooms_reaped_total.clone()))?;
        registry.register(Box::new(active_rooms.clone()))?;

        Ok(Self {
            pairing_requests_total,
            rooms_created_total,
            rooms_joined_total,
            matches_settled_total,
            matches_cancelled_total,
            rooms_reaped_total,
            active_rooms,
        })
    }
}

impl GatewayMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let connected_players = IntGauge::with_opts(Opts::new(
            "connected_players",
            "Currently connected players",
        ))?;
        let events_received_total = IntCounterVec::new(
            Opts::new("events_received_total", "Total inbound client events"),
            &["event"],
        )?;
        let handler_errors_total = IntCounter::with_opts(Opts::new(
            "handler_errors_total",
            "Total handler failures converted to error pushes",
        ))?;
        let push_drops_total = IntCounter::with_opts(Opts::new(
            "push_drops_total",
            "Pushes dropped because the target was not connected",
        ))?;
        let connections_evicted_total = IntCounter::with_opts(Opts::new(
            "connections_evicted_total",
            "Prior connections evicted by a newer one for the same identity",
        ))?;

        registry.register(Box::new(connected_players.clone()))?;
        registry.register(Box::new(events_received_total.clone()))?;
        registry.register(Box::new(handler_errors_total.clone()))?;
        registry.register(Box::new(push_drops_total.clone()))?;
        registry.register(Box::new(connections_evicted_total.clone()))?;

        Ok(Self {
            connected_players,
            events_received_total,
            handler_errors_total,
            push_drops_total,
            connections_evicted_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_registers_all_metrics() {
        let collector = MetricsCollector::new().unwrap();

        collector.session().pairing_requests_total.inc();
        collector.session().rooms_created_total.inc();
        collector
            .session()
            .matches_settled_total
            .with_label_values(&["win"])
            .inc();
        collector.gateway().connected_players.set(3);
        collector
            .gateway()
            .events_received_total
            .with_label_values(&["buscarPartida"])
            .inc();

        let families = collector.registry().gather();
        assert!(!families.is_empty());

        let names: Vec<String> = families.iter().map(|f| f.get_name().to_string()).collect();
        assert!(names.iter().any(|n| n == "pairing_requests_total"));
        assert!(names.iter().any(|n| n == "connected_players"));
        assert!(names.iter().any(|n| n == "matches_settled_total"));
    }

    #[test]
    fn test_independent_collectors_do_not_collide() {
        // Each collector owns its registry, so parallel tests can coexist.
        let first = MetricsCollector::new().unwrap();
        let second = MetricsCollector::new().unwrap();
        first.session().rooms_created_total.inc();
        assert_eq!(second.session().rooms_created_total.get(), 0);
    }
}
