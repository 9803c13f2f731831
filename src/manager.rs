//! The conversation surface exposed to user interfaces.
//!
//! A [`ConversationSessionManager`] binds at most one session at a time to a
//! [`SessionConnection`] and its timeline.  Binding another session discards
//! the previous pair before anything of the new one is loaded, so messages
//! never carry over between sessions.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::client::SessionApi;
use crate::connection::{
    ConnectionEvent, ConnectionStatus, DropReason, SendOutcome, SessionConnection,
};
use crate::observability::CONNECTION_DROPPED_SENDS;
use crate::timeline::{MessageEntry, Timeline};
use crate::transport::Connector;
use crate::types::SessionId;

/// Binds sessions to live connections, one at a time.
pub struct ConversationSessionManager {
    api: Arc<dyn SessionApi>,
    connector: Arc<dyn Connector>,
    binding: Option<SessionConnection>,
}

impl ConversationSessionManager {
    /// An idle manager.
    pub fn new(api: Arc<dyn SessionApi>, connector: Arc<dyn Connector>) -> Self {
        Self {
            api,
            connector,
            binding: None,
        }
    }

    /// Binds `session`, or nothing for `None`.
    ///
    /// The current binding is torn down first.  For a concrete session the
    /// stored history is fetched once to seed the timeline and then the
    /// connection is opened; if the history cannot be fetched the session
    /// starts with an empty timeline.  Binding the session that is already
    /// bound does nothing unless its connection has ended.
    pub async fn bind(&mut self, session: Option<SessionId>) {
        if let (Some(requested), Some(current)) = (session, &self.binding) {
            if current.session() == requested
                && current.status() != ConnectionStatus::Disconnected
            {
                debug!(session_id = %requested, "session already bound");
                return;
            }
        }
        self.unbind();
        let Some(session) = session else {
            return;
        };

        let timeline = match self.api.get_session(session).await {
            Ok(detail) => Timeline::from_history(detail.messages),
            Err(err) => {
                warn!(session_id = %session, error = %err, "could not load history; starting empty");
                Timeline::new()
            }
        };
        info!(session_id = %session, entries = timeline.len(), "binding session");
        self.binding = Some(SessionConnection::open(
            self.connector.clone(),
            session,
            timeline,
        ));
    }

    /// Releases the current binding, closing its transport.
    pub fn unbind(&mut self) {
        if let Some(mut connection) = self.binding.take() {
            debug!(session_id = %connection.session(), "unbinding session");
            connection.close();
        }
    }

    /// Opens a fresh connection for the bound session.
    ///
    /// Returns false when no session is bound.
    pub async fn reconnect(&mut self) -> bool {
        let Some(session) = self.session() else {
            return false;
        };
        self.unbind();
        self.bind(Some(session)).await;
        true
    }

    /// The bound session.
    pub fn session(&self) -> Option<SessionId> {
        self.binding.as_ref().map(SessionConnection::session)
    }

    /// Connection state; `Disconnected` when idle.
    pub fn status(&self) -> ConnectionStatus {
        self.binding
            .as_ref()
            .map(SessionConnection::status)
            .unwrap_or(ConnectionStatus::Disconnected)
    }

    /// The bound conversation, in order.  Empty when idle.
    pub fn messages(&self) -> &[MessageEntry] {
        match &self.binding {
            Some(connection) => connection.messages(),
            None => &[],
        }
    }

    /// The bound conversation's timeline.
    pub fn timeline(&self) -> Option<&Timeline> {
        self.binding.as_ref().map(SessionConnection::timeline)
    }

    /// Sends `text` on the bound session.
    ///
    /// Empty messages, and messages while not connected, are dropped.
    pub fn send_message(&mut self, text: &str) -> SendOutcome {
        let Some(connection) = self.binding.as_mut() else {
            CONNECTION_DROPPED_SENDS.click();
            return SendOutcome::Dropped(DropReason::NoSession);
        };
        if text.trim().is_empty() {
            CONNECTION_DROPPED_SENDS.click();
            return SendOutcome::Dropped(DropReason::Empty);
        }
        connection.send(text)
    }

    /// Waits for and applies the next event of the bound connection.
    ///
    /// Returns `None` when idle or once the connection has ended.  Cancel safe.
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        match self.binding.as_mut() {
            Some(connection) => connection.next_event().await,
            None => None,
        }
    }

    /// Applies every event that has already arrived.
    pub fn drain(&mut self) -> usize {
        self.binding.as_mut().map_or(0, SessionConnection::drain)
    }
}

impl fmt::Debug for ConversationSessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationSessionManager")
            .field("binding", &self.binding)
            .finish()
    }
}
