//! A provisioning scope wired to a session manager and its session list.

use std::sync::Arc;

use tracing::{debug, info};

use crate::client::SessionApi;
use crate::error::Result;
use crate::manager::ConversationSessionManager;
use crate::optimistic::{MutationOutcome, SessionRemote, SessionRename, Sessions};
use crate::provision::SessionProvisioner;
use crate::transport::Connector;
use crate::types::{ChatSession, SessionId};

/// One chat surface: the sessions of a scope plus the bound conversation.
#[derive(Debug)]
pub struct Conversation {
    manager: ConversationSessionManager,
    sessions: Sessions,
}

impl Conversation {
    /// A conversation over `provisioner`'s sessions; nothing is bound yet.
    pub fn new(
        api: Arc<dyn SessionApi>,
        connector: Arc<dyn Connector>,
        provisioner: Arc<dyn SessionProvisioner>,
    ) -> Self {
        Self {
            manager: ConversationSessionManager::new(api.clone(), connector),
            sessions: Sessions::new(SessionRemote::new(api, provisioner)),
        }
    }

    /// Loads the session list and binds `requested`, or whatever the scope provisions.
    pub async fn enter(&mut self, requested: Option<SessionId>) -> Result<Option<SessionId>> {
        let target = match requested {
            Some(id) => Some(id),
            None => {
                let remote = self.sessions.remote();
                remote.provisioner().provision(remote.api()).await?
            }
        };
        self.sessions.refresh().await?;
        info!(session_id = ?target, scope = ?self.sessions.remote().provisioner(), "entering chat");
        self.manager.bind(target).await;
        Ok(target)
    }

    /// Creates a session in this scope and binds it.
    pub async fn new_session(&mut self, title: Option<String>) -> Result<ChatSession> {
        let session = self.sessions.create(&title).await?;
        self.manager.bind(Some(session.id)).await;
        Ok(session)
    }

    /// Binds another session.
    pub async fn switch(&mut self, id: SessionId) {
        self.manager.bind(Some(id)).await;
    }

    /// Renames a session.
    pub async fn rename(&mut self, id: SessionId, title: impl Into<String>) -> MutationOutcome {
        let patch = SessionRename {
            title: title.into(),
        };
        self.sessions.update(id, &patch).await
    }

    /// Deletes a session.
    ///
    /// When the bound session is deleted the scope decides what comes next:
    /// nothing for general chat, the next or a fresh session for scoped chats.
    pub async fn delete(&mut self, id: SessionId) -> Result<MutationOutcome> {
        let outcome = self.sessions.delete(id).await;
        if !outcome.is_confirmed() || self.manager.session() != Some(id) {
            return Ok(outcome);
        }
        self.manager.unbind();
        let next = {
            let remote = self.sessions.remote();
            remote.provisioner().after_delete(remote.api()).await?
        };
        debug!(deleted = %id, next = ?next, "bound session deleted");
        if next.is_some() {
            self.sessions.refresh().await?;
        }
        self.manager.bind(next).await;
        Ok(outcome)
    }

    /// Reloads the session list.
    pub async fn refresh_sessions(&mut self) -> Result<()> {
        self.sessions.refresh().await
    }

    /// The scope's sessions, newest first.
    pub fn sessions(&self) -> &[ChatSession] {
        self.sessions.items()
    }

    /// The bound conversation.
    pub fn manager(&self) -> &ConversationSessionManager {
        &self.manager
    }

    /// The bound conversation, mutably.
    pub fn manager_mut(&mut self) -> &mut ConversationSessionManager {
        &mut self.manager
    }
}
