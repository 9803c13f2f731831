use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client as ReqwestClient, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::types::{
    BackendConfig, ChatSession, Event, EventCreate, EventId, EventUpdate, Memory, MemoryCreate,
    Project, ProjectCreate, ProjectId, SessionDetail, SessionId, StoredFile, Task, TaskCreate,
    TaskId, TaskUpdate,
};

/// Session operations the conversation layer depends on.
///
/// [`ApiClient`] implements this against the backend; tests substitute fakes.
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// All sessions, most recently updated first.
    async fn list_sessions(&self) -> Result<Vec<ChatSession>>;

    /// Creates an empty session.
    async fn create_session(&self, title: &str) -> Result<ChatSession>;

    /// A session with its stored messages.
    async fn get_session(&self, id: SessionId) -> Result<SessionDetail>;

    /// Changes a session's title.
    async fn rename_session(&self, id: SessionId, title: &str) -> Result<ChatSession>;

    /// Deletes a session and its messages.
    async fn delete_session(&self, id: SessionId) -> Result<()>;

    /// The session attached to a task, created on first use.
    async fn task_chat_session(&self, task: TaskId) -> Result<ChatSession>;
}

/// Client for the Jarvis REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
}

#[derive(Serialize)]
struct SessionTitle<'a> {
    title: &'a str,
}

#[derive(Deserialize)]
struct Transcription {
    text: String,
}

impl ApiClient {
    /// Create a client for the backend described by `config`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout)
            .default_headers(Self::default_headers())
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            timeout: config.timeout,
        })
    }

    /// The REST root requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();
        match response.text().await {
            Ok(body) => error_from_body(status_code, &body),
            Err(e) => Error::http_client(
                format!("Failed to read error response: {e}"),
                Some(Box::new(e)),
            ),
        }
    }

    fn map_request_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Sends `request` and returns the successful response.
    async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        let request = request.build().map_err(|e| self.map_request_error(e))?;
        let method = request.method().clone();
        let url = request.url().clone();
        CLIENT_REQUESTS.click();
        let started = Instant::now();
        let result = self.client.execute(request).await;
        CLIENT_REQUEST_DURATION.add(started.elapsed().as_secs_f64());

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                CLIENT_REQUEST_ERRORS.click();
                return Err(self.map_request_error(e));
            }
        };
        debug!(%method, %url, status = response.status().as_u16(), "api request");
        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }
        Ok(response)
    }

    async fn execute_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.execute(request).await?;
        response.json::<T>().await.map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {e}"),
                Some(Box::new(e)),
            )
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        self.execute_json(self.client.get(url)).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.url(path)?;
        self.execute_json(self.client.post(url).json(body)).await
    }

    async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.url(path)?;
        self.execute_json(self.client.put(url).json(body)).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let url = self.url(path)?;
        // The body is a human-readable acknowledgement.
        self.execute(self.client.delete(url)).await.map(|_| ())
    }

    // Sessions

    /// List chat sessions, most recently updated first.
    pub async fn list_sessions(&self) -> Result<Vec<ChatSession>> {
        self.get("chat/sessions").await
    }

    /// Create a chat session with the given title.
    pub async fn create_session(&self, title: &str) -> Result<ChatSession> {
        self.post("chat/sessions", &SessionTitle { title }).await
    }

    /// Fetch a session including its message history.
    pub async fn get_session(&self, id: SessionId) -> Result<SessionDetail> {
        self.get(&format!("chat/sessions/{id}")).await
    }

    /// Rename a session.
    pub async fn rename_session(&self, id: SessionId, title: &str) -> Result<ChatSession> {
        self.put(&format!("chat/sessions/{id}"), &SessionTitle { title })
            .await
    }

    /// Delete a session.
    pub async fn delete_session(&self, id: SessionId) -> Result<()> {
        self.delete(&format!("chat/sessions/{id}")).await
    }

    // Transcription

    /// Upload recorded audio and return the recognized text.
    pub async fn transcribe(&self, audio: impl Into<Bytes>, file_name: &str) -> Result<String> {
        let audio = audio.into();
        let length = audio.len() as u64;
        let part = Part::stream_with_length(audio, length)
            .file_name(file_name.to_string())
            .mime_str("audio/wav")
            .map_err(|e| self.map_request_error(e))?;
        let url = self.url("chat/transcribe")?;
        let request = self
            .client
            .post(url)
            .multipart(Form::new().part("file", part));
        let transcription: Transcription = self.execute_json(request).await?;
        Ok(transcription.text)
    }

    /// Read a WAV file from disk and transcribe it.
    pub async fn transcribe_file(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let audio = tokio::fs::read(path)
            .await
            .map_err(|e| Error::io(format!("could not read {}", path.display()), e))?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("recording.wav");
        self.transcribe(audio, file_name).await
    }

    // Tasks

    /// List all tasks.
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.get("tasks").await
    }

    /// Create a task.
    pub async fn create_task(&self, task: &TaskCreate) -> Result<Task> {
        self.post("tasks", task).await
    }

    /// Apply a partial update to a task.
    pub async fn update_task(&self, id: TaskId, patch: &TaskUpdate) -> Result<Task> {
        self.put(&format!("tasks/{id}"), patch).await
    }

    /// Delete a task.
    pub async fn delete_task(&self, id: TaskId) -> Result<()> {
        self.delete(&format!("tasks/{id}")).await
    }

    /// The chat session attached to a task; the backend creates it on first use.
    pub async fn task_chat_session(&self, id: TaskId) -> Result<ChatSession> {
        self.post(&format!("tasks/{id}/chat"), &serde_json::json!({}))
            .await
    }

    /// Files attached to a task.
    pub async fn task_files(&self, id: TaskId) -> Result<Vec<StoredFile>> {
        self.get(&format!("tasks/{id}/files")).await
    }

    // Events

    /// List calendar events.
    pub async fn list_events(&self) -> Result<Vec<Event>> {
        self.get("events").await
    }

    /// Create a calendar event.
    pub async fn create_event(&self, event: &EventCreate) -> Result<Event> {
        self.post("events", event).await
    }

    /// Apply a partial update to an event.
    pub async fn update_event(&self, id: EventId, patch: &EventUpdate) -> Result<Event> {
        self.put(&format!("events/{id}"), patch).await
    }

    /// Delete a calendar event.
    pub async fn delete_event(&self, id: EventId) -> Result<()> {
        self.delete(&format!("events/{id}")).await
    }

    // Projects

    /// List projects.
    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        self.get("projects").await
    }

    /// Fetch one project.
    pub async fn get_project(&self, id: ProjectId) -> Result<Project> {
        self.get(&format!("projects/{id}")).await
    }

    /// Create a project.
    pub async fn create_project(&self, project: &ProjectCreate) -> Result<Project> {
        self.post("projects", project).await
    }

    /// Files uploaded to a project.
    pub async fn project_files(&self, id: ProjectId) -> Result<Vec<StoredFile>> {
        self.get(&format!("projects/{id}/files")).await
    }

    // Memories

    /// List stored memories.
    pub async fn list_memories(&self) -> Result<Vec<Memory>> {
        self.get("memory").await
    }

    /// Store a memory.
    pub async fn create_memory(&self, memory: &MemoryCreate) -> Result<Memory> {
        self.post("memory", memory).await
    }

    /// Delete a memory.
    pub async fn delete_memory(&self, id: i64) -> Result<()> {
        self.delete(&format!("memory/{id}")).await
    }

    // Settings

    /// The backend's display-only settings.
    pub async fn backend_config(&self) -> Result<BackendConfig> {
        self.get("config").await
    }
}

#[async_trait]
impl SessionApi for ApiClient {
    async fn list_sessions(&self) -> Result<Vec<ChatSession>> {
        ApiClient::list_sessions(self).await
    }

    async fn create_session(&self, title: &str) -> Result<ChatSession> {
        ApiClient::create_session(self, title).await
    }

    async fn get_session(&self, id: SessionId) -> Result<SessionDetail> {
        ApiClient::get_session(self, id).await
    }

    async fn rename_session(&self, id: SessionId, title: &str) -> Result<ChatSession> {
        ApiClient::rename_session(self, id, title).await
    }

    async fn delete_session(&self, id: SessionId) -> Result<()> {
        ApiClient::delete_session(self, id).await
    }

    async fn task_chat_session(&self, task: TaskId) -> Result<ChatSession> {
        ApiClient::task_chat_session(self, task).await
    }
}

/// Maps an unsuccessful response to an [`Error`].
///
/// The backend reports failures as `{"detail": "..."}`, or as a list of
/// issues with `loc` and `msg` when request validation fails.
fn error_from_body(status_code: u16, body: &str) -> Error {
    #[derive(Deserialize)]
    struct ErrorResponse {
        detail: Option<Detail>,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Detail {
        Message(String),
        Issues(Vec<Issue>),
    }

    #[derive(Deserialize)]
    struct Issue {
        #[serde(default)]
        loc: Vec<serde_json::Value>,
        msg: String,
    }

    let detail = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|e| e.detail);
    let (message, param) = match detail {
        Some(Detail::Message(message)) => (message, None),
        Some(Detail::Issues(issues)) => {
            let param = issues.first().map(|issue| {
                issue
                    .loc
                    .iter()
                    .map(|part| match part {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(".")
            });
            let message = issues
                .iter()
                .map(|issue| issue.msg.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            (message, param.filter(|p| !p.is_empty()))
        }
        None => (body.to_string(), None),
    };

    // Map HTTP status code to appropriate error type
    match status_code {
        400 => Error::bad_request(message),
        404 => Error::not_found(message, None, None),
        408 => Error::timeout(message, None),
        422 => Error::validation(message, param),
        500 => Error::internal_server(message),
        502..=504 => Error::service_unavailable(message),
        _ => Error::api(status_code, message),
    }
}


#[cfg(test)]
mod tests {
    use super::fake::serve_script;
    use super::*;
    use tokio::net::TcpListener;

    /// Answers one HTTP request with `status` and a JSON `body`, returning the request.
    async fn serve_once(status: &'static str, body: &'static str) -> (Url, tokio::task::JoinHandle<String>) {
        let (base, script) = serve_script(vec![(status, body.to_string())]).await;
        let handle = tokio::spawn(async move { script.await.unwrap().remove(0) });
        (base, handle)
    }

    fn client_for(base: &Url) -> ApiClient {
        let config = ClientConfig::new()
            .with_base_url(base.as_str())
            .unwrap()
            .with_timeout(Duration::from_secs(5));
        ApiClient::new(&config).unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = ApiClient::new(&ClientConfig::new());
        tokio_test::assert_ok!(&client);
        assert_eq!(
            client.unwrap().base_url().as_str(),
            "http://localhost:8000/api/"
        );
    }

    #[test]
    fn detail_string_becomes_message() {
        let err = error_from_body(404, r#"{"detail": "Session not found"}"#);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Resource not found: Session not found");
    }

    #[test]
    fn validation_issues_are_joined() {
        let body = r#"{"detail": [
            {"loc": ["body", "title"], "msg": "field required", "type": "value_error.missing"},
            {"loc": ["body", "status"], "msg": "invalid status", "type": "value_error"}
        ]}"#;
        match error_from_body(422, body) {
            Error::Validation { message, param } => {
                assert_eq!(message, "field required; invalid status");
                assert_eq!(param.as_deref(), Some("body.title"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_json_body_is_kept_verbatim() {
        let err = error_from_body(502, "Bad Gateway");
        assert!(err.is_server_error());
        assert_eq!(err.to_string(), "Service unavailable: Bad Gateway");
        let err = error_from_body(418, "teapot");
        assert_eq!(err.status_code(), Some(418));
    }

    #[tokio::test]
    async fn get_session_decodes_history() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"id": 4, "title": "Plans", "created_at": "2025-11-02T10:00:00",
                "updated_at": "2025-11-02T10:05:00", "messages": [
                {"id": 1, "session_id": 4, "role": "user", "content": "hello", "type": "text",
                 "timestamp": "2025-11-02T10:01:00"}]}"#,
        )
        .await;
        let detail = client_for(&base).get_session(SessionId::new(4)).await.unwrap();
        assert_eq!(detail.title, "Plans");
        assert_eq!(detail.messages.len(), 1);
        let head = server.await.unwrap();
        assert!(head.starts_with("GET /api/chat/sessions/4 HTTP/1.1"));
    }

    #[tokio::test]
    async fn error_status_is_mapped() {
        let (base, server) = serve_once("404 Not Found", r#"{"detail": "Session not found"}"#).await;
        let err = client_for(&base)
            .get_session(SessionId::new(99))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn projects_and_their_files() {
        let (base, server) = serve_script(vec![
            (
                "200 OK",
                r#"[{"id": 2, "name": "Apollo", "tags": ["space"], "file_count": 1,
                     "created_at": "2025-03-01T08:00:00", "updated_at": "2025-03-02T08:00:00"}]"#
                    .to_string(),
            ),
            (
                "200 OK",
                r#"{"id": 2, "name": "Apollo", "description": "Moon shot", "status": "active",
                    "created_at": "2025-03-01T08:00:00", "updated_at": "2025-03-02T08:00:00"}"#
                    .to_string(),
            ),
            (
                "200 OK",
                r#"[{"id": 8, "filename": "plan.pdf", "file_type": "pdf",
                     "summary": "Launch plan", "created_at": "2025-03-01T09:00:00"}]"#
                    .to_string(),
            ),
            (
                "200 OK",
                r#"{"id": 3, "name": "Gemini", "created_at": "2025-03-05T08:00:00",
                    "updated_at": "2025-03-05T08:00:00"}"#
                    .to_string(),
            ),
            ("200 OK", "[]".to_string()),
        ])
        .await;
        let client = client_for(&base);
        let projects = client.list_projects().await.unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].status, "active");
        assert_eq!(projects[0].tags, vec!["space".to_string()]);

        let project = client.get_project(2).await.unwrap();
        assert_eq!(project.description.as_deref(), Some("Moon shot"));
        let files = client.project_files(2).await.unwrap();
        assert_eq!(files[0].filename, "plan.pdf");
        assert_eq!(files[0].summary.as_deref(), Some("Launch plan"));

        let created = client.create_project(&ProjectCreate::new("Gemini")).await.unwrap();
        assert_eq!(created.id, 3);
        assert!(client.task_files(5).await.unwrap().is_empty());

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /api/projects HTTP/1.1"));
        assert!(requests[1].starts_with("GET /api/projects/2 HTTP/1.1"));
        assert!(requests[2].starts_with("GET /api/projects/2/files HTTP/1.1"));
        assert!(requests[3].starts_with("POST /api/projects HTTP/1.1"));
        assert!(requests[3].contains(r#""name":"Gemini""#));
        assert!(requests[4].starts_with("GET /api/tasks/5/files HTTP/1.1"));
    }

    #[tokio::test]
    async fn memories_round_trip() {
        let (base, server) = serve_script(vec![
            (
                "200 OK",
                r#"{"id": 12, "content": "Likes window seats", "category": "travel",
                    "created_at": "2025-04-01T08:00:00"}"#
                    .to_string(),
            ),
            (
                "200 OK",
                r#"[{"id": 12, "content": "Likes window seats", "created_at": "2025-04-01T08:00:00"}]"#
                    .to_string(),
            ),
            ("200 OK", r#"{"message": "Memory deleted"}"#.to_string()),
        ])
        .await;
        let client = client_for(&base);
        let memory = client
            .create_memory(&MemoryCreate::new("Likes window seats", Some("travel".to_string())))
            .await
            .unwrap();
        assert_eq!(memory.category, "travel");
        let memories = client.list_memories().await.unwrap();
        assert_eq!(memories[0].category, "general");
        tokio_test::assert_ok!(client.delete_memory(12).await);

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("POST /api/memory HTTP/1.1"));
        assert!(requests[0].contains(r#""category":"travel""#));
        assert!(requests[1].starts_with("GET /api/memory HTTP/1.1"));
        assert!(requests[2].starts_with("DELETE /api/memory/12 HTTP/1.1"));
    }

    #[tokio::test]
    async fn backend_config_is_read() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"app_name": "Jarvis AI Assistant", "debug": true,
                "llm": {"model": "qwen3:4b", "base_url": "http://localhost:11434"},
                "database": {"type": "sqlite", "url": "sqlite:///jarvis.db"}}"#,
        )
        .await;
        let settings = client_for(&base).backend_config().await.unwrap();
        assert!(settings.debug);
        assert_eq!(settings.llm.model, "qwen3:4b");
        assert_eq!(settings.database.kind, "sqlite");
        assert!(server.await.unwrap().starts_with("GET /api/config HTTP/1.1"));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let base = Url::parse(&format!("http://{addr}/api/")).unwrap();
        let err = client_for(&base).list_sessions().await.unwrap_err();
        assert!(err.is_connection(), "{err:?}");
    }
}
