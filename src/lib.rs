// Public modules
pub mod chat;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod manager;
pub mod observability;
pub mod optimistic;
pub mod provision;
pub mod render;
pub mod thought;
pub mod timeline;
pub mod transport;
pub mod types;
pub mod utils;

// Re-exports
pub use client::{ApiClient, SessionApi};
pub use config::ClientConfig;
pub use connection::{ConnectionEvent, ConnectionStatus, DropReason, SendOutcome, SessionConnection};
pub use error::{Error, Result};
pub use manager::ConversationSessionManager;
pub use observability::register_biometrics;
pub use optimistic::{MutationOutcome, OptimisticList, Patch, PendingMutation, Remote, Settlement};
pub use provision::{GeneralChat, ProjectChat, SessionProvisioner, TaskChat};
pub use thought::{Span, SpanKind, ThoughtParser, parse_thoughts};
pub use timeline::{MessageEntry, Timeline};
pub use transport::{Connector, WebSocketConnector};
pub use types::*;
