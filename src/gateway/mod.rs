//! Connection gateway for the quiz-duel service
//!
//! This module owns the duplex channel to each authenticated player: the
//! identity → connection registry, the named-event wire protocol, token
//! verification, and the per-connection WebSocket loop.

pub mod auth;
pub mod events;
pub mod registry;
pub mod ws;

// Re-export commonly used types
pub use auth::{IdentityVerifier, JwtIdentityVerifier, StaticIdentityVerifier};
pub use events::{ClientEvent, ServerEvent};
pub use registry::{ConnectionRegistry, EventSink, MockEventSink};
