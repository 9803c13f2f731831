//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved
//! configuration the REPL runs with.

use std::path::PathBuf;
use std::sync::Arc;

use arrrg_derive::CommandLine;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::provision::{GeneralChat, ProjectChat, SessionProvisioner, TaskChat};
use crate::types::{SessionId, TaskId};

/// Command-line arguments for the jarvis-chat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// REST root of the backend.
    #[arrrg(optional, "Backend API root (default: http://localhost:8000/api/)", "URL")]
    pub api_url: Option<String>,

    /// Websocket root, when it cannot be derived from the API root.
    #[arrrg(optional, "Websocket root for chat sockets", "URL")]
    pub ws_url: Option<String>,

    /// YAML configuration file.
    #[arrrg(optional, "YAML configuration file", "PATH")]
    pub config: Option<String>,

    /// Chat about a project.
    #[arrrg(optional, "Chat within a project's sessions", "NAME")]
    pub project: Option<String>,

    /// Chat about a task.
    #[arrrg(optional, "Chat about a task", "TASK_ID")]
    pub task: Option<i64>,

    /// Session to open instead of the provisioned one.
    #[arrrg(optional, "Session to open (or 'new' for none)", "SESSION_ID")]
    pub session: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Do not print reasoning.
    #[arrrg(flag, "Hide the assistant's reasoning")]
    pub hide_thinking: bool,
}

/// Which sessions the chat works with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ChatScope {
    /// Every session that does not belong to a project.
    #[default]
    General,
    /// The sessions of one project.
    Project(String),
    /// The session attached to one task.
    Task(TaskId),
}

impl ChatScope {
    /// The provisioning strategy for this scope.
    pub fn provisioner(&self) -> Arc<dyn SessionProvisioner> {
        match self {
            ChatScope::General => Arc::new(GeneralChat),
            ChatScope::Project(name) => Arc::new(ProjectChat::new(name.clone())),
            ChatScope::Task(id) => Arc::new(TaskChat::new(*id)),
        }
    }
}

/// Configuration for a chat run.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Backend endpoints, timeouts, and markers.
    pub client: ClientConfig,

    /// Which sessions to work with.
    pub scope: ChatScope,

    /// Session to bind on start; `None` lets the scope decide.
    pub session: Option<SessionId>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Whether to print reasoning.
    pub show_thinking: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Scope: general chat
    /// - Color: enabled
    /// - Thinking: shown
    pub fn new() -> Self {
        Self {
            client: ClientConfig::new(),
            scope: ChatScope::General,
            session: None,
            use_color: true,
            show_thinking: true,
        }
    }

    /// Layers `args` over an already loaded client configuration.
    pub fn resolve(args: ChatArgs, mut client: ClientConfig) -> Result<Self> {
        if let Some(url) = &args.api_url {
            client = client.with_base_url(url)?;
        }
        if let Some(url) = &args.ws_url {
            client = client.with_ws_url(url)?;
        }
        let scope = match (args.project, args.task) {
            (Some(_), Some(_)) => {
                return Err(Error::config("--project and --task are mutually exclusive"));
            }
            (Some(name), None) if name.trim().is_empty() => {
                return Err(Error::config("--project needs a name"));
            }
            (Some(name), None) => ChatScope::Project(name.trim().to_string()),
            (None, Some(task)) => ChatScope::Task(task),
            (None, None) => ChatScope::General,
        };
        let session = match &args.session {
            Some(value) => SessionId::parse_binding(value)?,
            None => None,
        };
        Ok(Self {
            client,
            scope,
            session,
            use_color: !args.no_color,
            show_thinking: !args.hide_thinking,
        })
    }

    /// Sets the client configuration.
    pub fn with_client(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }

    /// Sets the scope.
    pub fn with_scope(mut self, scope: ChatScope) -> Self {
        self.scope = scope;
        self
    }

    /// Sets the session to bind on start.
    pub fn with_session(mut self, session: Option<SessionId>) -> Self {
        self.session = session;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Sets whether reasoning is printed.
    pub fn with_thinking(mut self, show: bool) -> Self {
        self.show_thinking = show;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = Error;

    /// Loads the configuration file and environment, then applies `args`.
    fn try_from(args: ChatArgs) -> Result<Self> {
        let path = args.config.as_ref().map(PathBuf::from);
        let client = ClientConfig::load(path.as_deref())?;
        Self::resolve(args, client)
    }
}
