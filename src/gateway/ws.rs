//! WebSocket endpoint: per-connection loop and event dispatch
//!
//! Each authenticated connection runs one task that multiplexes outbound
//! pushes (from the connection registry) and inbound client events. Handler
//! failures never tear the connection down; they convert to an `error` push
//! on the originating socket.

use crate::error::Result;
use crate::gateway::auth::IdentityVerifier;
use crate::gateway::events::{ClientEvent, ServerEvent};
use crate::gateway::registry::{ConnectionRegistry, OutboundFrame};
use crate::metrics::MetricsCollector;
use crate::session::manager::SessionManager;
use crate::session::room::RoomState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Everything the socket endpoint needs, shared across connections
pub struct GatewayContext {
    pub verifier: Arc<dyn IdentityVerifier>,
    pub connections: Arc<ConnectionRegistry>,
    pub manager: Arc<SessionManager>,
    pub metrics: Arc<MetricsCollector>,
    pub max_connections: u32,
}

/// Query parameters of the upgrade request
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    /// Connection token issued by the auth collaborator
    pub token: String,
}

/// `GET /ws?token=...` — authenticate, then upgrade to a WebSocket
pub async fn ws_upgrade(
    State(ctx): State<Arc<GatewayContext>>,
    Query(params): Query<ConnectParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let player_id = match ctx.verifier.verify(&params.token).await {
        Ok(identity) => identity,
        Err(e) => {
            warn!("Rejected socket upgrade: {}", e);
            return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
        }
    };

    if ctx.connections.connection_count() >= ctx.max_connections as usize {
        warn!(
            "Rejecting connection for '{}': connection limit ({}) reached",
            player_id, ctx.max_connections
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "server full").into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(ctx, socket, player_id))
}

/// Top-level per-connection loop, spawned for each upgraded socket
pub async fn handle_socket(ctx: Arc<GatewayContext>, mut socket: WebSocket, player_id: String) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundFrame>();
    let connection_id = ctx.connections.register(player_id.clone(), tx.clone());

    info!("Player '{}' connected ({})", player_id, connection_id);

    loop {
        tokio::select! {
            // Outbound: forward queued server events to the socket.
            maybe_frame = rx.recv() => {
                match maybe_frame {
                    Some(OutboundFrame::Event(event)) => {
                        match serde_json::to_string(&event) {
                            Ok(json) => {
                                if socket.send(Message::Text(json.into())).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                error!("Failed to serialize '{}' push: {}", event.name(), e);
                            }
                        }
                    }
                    // Evicted by a newer connection for the same identity.
                    Some(OutboundFrame::Shutdown) => {
                        let _ = socket.send(Message::Close(None)).await;
                        break;
                    }
                    None => break,
                }
            }
            // Inbound: read client events from the socket.
            maybe_msg = socket.recv() => {
                match maybe_msg {
                    Some(Ok(Message::Text(text))) => {
                        let event: ClientEvent = match serde_json::from_str(&text) {
                            Ok(event) => event,
                            Err(e) => {
                                debug!("Malformed frame from '{}': {}", player_id, e);
                                let _ = tx.send(OutboundFrame::Event(ServerEvent::error(
                                    format!("Invalid message: {}", e),
                                )));
                                continue;
                            }
                        };

                        if let Err(e) = dispatch(&ctx, &player_id, event).await {
                            ctx.metrics.gateway().handler_errors_total.inc();
                            let _ = tx.send(OutboundFrame::Event(ServerEvent::error(
                                client_message(&e),
                            )));
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!("Socket error for '{}': {}", player_id, e);
                        break;
                    }
                    _ => continue,
                }
            }
        }
    }

    ctx.connections.unregister(&player_id, connection_id);

    // A disconnect does not abort an in-progress match: the player may
    // reconnect and still report, and stalled rooms fall to the reaper.
    match ctx.manager.player_room(&player_id) {
        Ok(Some(room)) if room.state() == RoomState::InProgress => {
            warn!(
                "Player '{}' disconnected mid-match ({}); room left intact",
                player_id,
                room.id()
            );
        }
        _ => {}
    }

    info!("Player '{}' disconnected ({})", player_id, connection_id);
}

/// Route one validated client event into the session manager
async fn dispatch(ctx: &GatewayContext, player_id: &str, event: ClientEvent) -> Result<()> {
    ctx.metrics
        .gateway()
        .events_received_total
        .with_label_values(&[event.name()])
        .inc();

    event.validate(player_id)?;

    match event {
        ClientEvent::FindMatch(_) => {
            ctx.manager.request_match(player_id).await?;
        }
        ClientEvent::CancelSearch(_) => {
            ctx.manager.cancel_match(player_id).await?;
        }
        ClientEvent::ReportResults(payload) => {
            ctx.manager
                .report_result(payload.match_id, player_id, payload.correct_count)
                .await?;
        }
    }
    Ok(())
}

/// Player-facing message for a failed handler: precondition and validation
/// failures are explained verbatim, infrastructure faults are not leaked.
fn client_message(error: &anyhow::Error) -> String {
    match error.downcast_ref::<crate::error::SessionError>() {
        Some(session_error) if session_error.is_client_fault() => session_error.to_string(),
        _ => "Internal error, please try again".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RatingConfig, SessionSettings};
    use crate::error::SessionError;
    use crate::gateway::auth::StaticIdentityVerifier;
    use crate::gateway::events::FindMatchPayload;
    use crate::gateway::registry::MockEventSink;
    use crate::store::InMemorySessionStore;
    use crate::types::Question;

    fn test_context() -> (Arc<GatewayContext>, Arc<InMemorySessionStore>) {
        let metrics = Arc::new(MetricsCollector::default());
        let store = Arc::new(InMemorySessionStore::new());
        store.seed_questions(
            (0..20)
                .map(|i| Question {
                    id: format!("q{}", i),
                    text: format!("Question {}?", i),
                    correct_answer: "right".to_string(),
                    incorrect_answers: vec!["a".to_string()],
                    topic: "general".to_string(),
                    difficulty: "easy".to_string(),
                })
                .collect(),
        );
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
        let ctx = GatewayContext {
            verifier: Arc::new(StaticIdentityVerifier::new().with_token("tok", "p1")),
            connections: Arc::new(ConnectionRegistry::new(metrics.clone())),
            manager,
            metrics,
            max_connections: 100,
        };
        (Arc::new(ctx), store)
    }

    #[tokio::test]
    async fn test_dispatch_find_match() {
        let (ctx, _store) = test_context();
        let event = ClientEvent::FindMatch(FindMatchPayload {
            player_id: "p1".to_string(),
        });
        dispatch(&ctx, "p1", event).await.unwrap();

        let room = ctx.manager.player_room("p1").unwrap();
        assert!(room.is_some());
    }

    #[tokio::test]
    async fn test_dispatch_rejects_identity_spoofing() {
        let (ctx, _store) = test_context();
        let event = ClientEvent::FindMatch(FindMatchPayload {
            player_id: "someone-else".to_string(),
        });
        let err = dispatch(&ctx, "p1", event).await.unwrap_err();
        let session_err = err.downcast::<SessionError>().unwrap();
        assert!(matches!(session_err, SessionError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_client_message_hides_internal_faults() {
        let precondition: anyhow::Error = SessionError::AlreadyInMatchOrPairing {
            player_id: "p1".to_string(),
        }
        .into();
        assert!(client_message(&precondition).contains("p1"));

        let store_fault: anyhow::Error = SessionError::StoreUnavailable {
            message: "secret dsn".to_string(),
        }
        .into();
        assert!(!client_message(&store_fault).contains("secret"));
    }
}
