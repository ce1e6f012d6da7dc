//! Quiz Duel - Real-time head-to-head trivia match service
//!
//! This crate provides the match session core of a trivia game service:
//! rating-based pairing, in-memory room lifecycle, question distribution,
//! result aggregation and ELO settlement, coordinated over a WebSocket
//! gateway and a durable session store.

pub mod config;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod questions;
pub mod rating;
pub mod service;
pub mod session;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{Result, SessionError};
pub use types::*;

// Re-export key components
pub use gateway::registry::EventSink;
pub use session::{SessionManager, SessionStats};
pub use store::{InMemorySessionStore, SessionStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
