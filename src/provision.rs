//! How each kind of conversation finds its session.
//!
//! General, project, and task conversations share one manager; they differ
//! only in which sessions belong to them and in what to bind when none is
//! chosen.  Each is a [`SessionProvisioner`].

use std::fmt;

use async_trait::async_trait;
use tracing::info;

use crate::client::SessionApi;
use crate::error::Result;
use crate::types::{ChatSession, SessionId, TaskId};

/// Title prefix marking a session that belongs to a project.
pub const PROJECT_TITLE_PREFIX: &str = "Project:";

/// Title given to new general sessions.
pub const NEW_CHAT_TITLE: &str = "New Chat";

/// Finds, lists, and creates the sessions of one conversation scope.
#[async_trait]
pub trait SessionProvisioner: Send + Sync + fmt::Debug {
    /// Whether `session` belongs to this scope.
    fn includes(&self, session: &ChatSession) -> bool;

    /// Title for a new session when the caller gives none.
    fn default_title(&self) -> String;

    /// Sessions in this scope, most recently updated first.
    async fn sessions(&self, api: &dyn SessionApi) -> Result<Vec<ChatSession>> {
        let mut sessions: Vec<ChatSession> = api
            .list_sessions()
            .await?
            .into_iter()
            .filter(|s| self.includes(s))
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    /// The session to bind when entering the scope; `None` leaves the manager idle.
    async fn provision(&self, api: &dyn SessionApi) -> Result<Option<SessionId>> {
        Ok(self.sessions(api).await?.first().map(|s| s.id))
    }

    /// Creates a new session in this scope.
    async fn create(&self, api: &dyn SessionApi, title: Option<&str>) -> Result<ChatSession> {
        let title = match title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(title) => title.to_string(),
            None => self.default_title(),
        };
        api.create_session(&title).await
    }

    /// The session to bind after the bound one was deleted.
    async fn after_delete(&self, _api: &dyn SessionApi) -> Result<Option<SessionId>> {
        Ok(None)
    }
}

/// Free-form conversations: every session that is not a project's.
#[derive(Debug, Clone, Default)]
pub struct GeneralChat;

#[async_trait]
impl SessionProvisioner for GeneralChat {
    fn includes(&self, session: &ChatSession) -> bool {
        !session.title.starts_with(PROJECT_TITLE_PREFIX)
    }

    fn default_title(&self) -> String {
        NEW_CHAT_TITLE.to_string()
    }
}

/// Conversations about one project, keyed by the `Project: {name}` title.
#[derive(Debug, Clone)]
pub struct ProjectChat {
    project_name: String,
}

impl ProjectChat {
    /// The scope of the project called `project_name`.
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
        }
    }

    /// The project's name.
    pub fn project_name(&self) -> &str {
        &self.project_name
    }
}

#[async_trait]
impl SessionProvisioner for ProjectChat {
    fn includes(&self, session: &ChatSession) -> bool {
        session.title == self.default_title()
    }

    fn default_title(&self) -> String {
        format!("{PROJECT_TITLE_PREFIX} {}", self.project_name)
    }

    async fn provision(&self, api: &dyn SessionApi) -> Result<Option<SessionId>> {
        if let Some(latest) = self.sessions(api).await?.first() {
            return Ok(Some(latest.id));
        }
        let created = self.create(api, None).await?;
        info!(session_id = %created.id, project = %self.project_name, "created project session");
        Ok(Some(created.id))
    }

    /// Project sessions are always titled after the project.
    async fn create(&self, api: &dyn SessionApi, _title: Option<&str>) -> Result<ChatSession> {
        api.create_session(&self.default_title()).await
    }

    async fn after_delete(&self, api: &dyn SessionApi) -> Result<Option<SessionId>> {
        self.provision(api).await
    }
}

/// The single conversation attached to a task.  The backend creates it on
/// first use and returns the same session afterwards.
#[derive(Debug, Clone, Copy)]
pub struct TaskChat {
    task_id: TaskId,
}

impl TaskChat {
    /// The scope of task `task_id`.
    pub fn new(task_id: TaskId) -> Self {
        Self { task_id }
    }

    /// The task.
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }
}

#[async_trait]
impl SessionProvisioner for TaskChat {
    fn includes(&self, _session: &ChatSession) -> bool {
        // Task sessions are not recognizable by title; `sessions` asks the backend.
        false
    }

    fn default_title(&self) -> String {
        format!("Task {}", self.task_id)
    }

    async fn sessions(&self, api: &dyn SessionApi) -> Result<Vec<ChatSession>> {
        Ok(vec![api.task_chat_session(self.task_id).await?])
    }

    async fn provision(&self, api: &dyn SessionApi) -> Result<Option<SessionId>> {
        Ok(Some(api.task_chat_session(self.task_id).await?.id))
    }

    async fn create(&self, api: &dyn SessionApi, _title: Option<&str>) -> Result<ChatSession> {
        api.task_chat_session(self.task_id).await
    }

    async fn after_delete(&self, api: &dyn SessionApi) -> Result<Option<SessionId>> {
        self.provision(api).await
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeSessionApi;
    use super::*;

    #[tokio::test]
    async fn general_chat_hides_project_sessions() {
        let api = FakeSessionApi::new();
        api.add("Groceries", 1, &[]);
        api.add("Project: Apollo", 5, &[]);
        let recent = api.add("Trip ideas", 3, &[]);

        let sessions = GeneralChat.sessions(&api).await.unwrap();
        let titles: Vec<_> = sessions.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Trip ideas", "Groceries"]);
        assert_eq!(GeneralChat.provision(&api).await.unwrap(), Some(recent));
    }

    #[tokio::test]
    async fn general_chat_with_no_sessions_stays_idle() {
        let api = FakeSessionApi::new();
        api.add("Project: Apollo", 5, &[]);
        assert_eq!(GeneralChat.provision(&api).await.unwrap(), None);
        assert_eq!(GeneralChat.after_delete(&api).await.unwrap(), None);
    }

    #[tokio::test]
    async fn general_chat_titles_new_sessions() {
        let api = FakeSessionApi::new();
        let untitled = GeneralChat.create(&api, Some("  ")).await.unwrap();
        assert_eq!(untitled.title, NEW_CHAT_TITLE);
        let titled = GeneralChat.create(&api, Some("Budget")).await.unwrap();
        assert_eq!(titled.title, "Budget");
    }

    #[tokio::test]
    async fn project_chat_reuses_latest_session() {
        let api = FakeSessionApi::new();
        api.add("Project: Apollo", 1, &[]);
        let latest = api.add("Project: Apollo", 4, &[]);
        api.add("Project: Gemini", 9, &[]);
        api.add("Apollo notes", 8, &[]);

        let scope = ProjectChat::new("Apollo");
        assert_eq!(scope.sessions(&api).await.unwrap().len(), 2);
        assert_eq!(scope.provision(&api).await.unwrap(), Some(latest));
        assert_eq!(api.titles().len(), 4);
    }

    #[tokio::test]
    async fn project_chat_creates_when_missing() {
        let api = FakeSessionApi::new();
        let scope = ProjectChat::new("Apollo");
        let id = scope.provision(&api).await.unwrap();
        assert!(id.is_some());
        assert_eq!(api.titles(), vec!["Project: Apollo".to_string()]);
        // the title convention wins over the caller's
        let created = scope.create(&api, Some("Other")).await.unwrap();
        assert_eq!(created.title, "Project: Apollo");
    }

    #[tokio::test]
    async fn project_chat_rebinds_after_delete() {
        let api = FakeSessionApi::new();
        let scope = ProjectChat::new("Apollo");
        let first = scope.provision(&api).await.unwrap().unwrap();
        api.delete_session(first).await.unwrap();
        let next = scope.after_delete(&api).await.unwrap();
        assert!(next.is_some());
        assert_ne!(next, Some(first));
    }

    #[tokio::test]
    async fn task_chat_reuses_the_task_session() {
        let api = FakeSessionApi::new();
        let scope = TaskChat::new(12);
        let first = scope.provision(&api).await.unwrap();
        let second = scope.provision(&api).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(scope.sessions(&api).await.unwrap().len(), 1);
        let other = TaskChat::new(13).provision(&api).await.unwrap();
        assert!(other.is_some());
        assert_ne!(other, first);
    }
}
