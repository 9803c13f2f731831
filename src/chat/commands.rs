//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to manage sessions, tasks, events, projects, and memories
//! without sending anything to the assistant.

use crate::types::{EventId, ProjectId, SessionId, TaskId, TaskStatus};

/// A parsed chat command.
///
/// These commands control the client and are not sent on the session.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// List the sessions of the current scope.
    Sessions,

    /// Create a session and switch to it, optionally titled.
    New(Option<String>),

    /// Switch to another session.
    Switch(SessionId),

    /// Rename a session.
    Rename(SessionId, String),

    /// Delete a session.
    Delete(SessionId),

    /// Reopen the connection of the current session.
    Reconnect,

    /// Print the current conversation.
    History,

    /// List tasks.
    Tasks,

    /// Create a task.
    TaskAdd(String),

    /// Move a task to another column.
    TaskStatus(TaskId, TaskStatus),

    /// Delete a task.
    TaskRemove(TaskId),

    /// List the files attached to a task.
    TaskFiles(TaskId),

    /// List events.
    Events,

    /// Delete an event.
    EventRemove(EventId),

    /// List projects.
    Projects,

    /// Create a project.
    ProjectAdd(String),

    /// Show a project and its files.
    ProjectShow(ProjectId),

    /// List stored memories.
    Memories,

    /// Store a memory, optionally in a category.
    MemoryAdd {
        /// Category; the backend default when `None`.
        category: Option<String>,
        /// The fact to remember.
        content: String,
    },

    /// Delete a memory.
    MemoryRemove(i64),

    /// Show the backend's settings.
    BackendConfig,

    /// Transcribe a WAV file into the next prompt.
    Transcribe(String),

    /// Toggle thinking visibility.
    Thinking(bool),

    /// Show the session and connection state.
    Status,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use jarvis::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/switch 12").is_some());
/// assert!(parse_command("What is on my plate today?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    if !input.starts_with('/') {
        return None;
    }

    let mut parts = input[1..].splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "sessions" | "ls" => ChatCommand::Sessions,
        "new" => ChatCommand::New(argument.map(|s| s.to_string())),
        "switch" | "open" => match parse_session(argument, "/switch") {
            Ok(id) => ChatCommand::Switch(id),
            Err(err) => ChatCommand::Invalid(err),
        },
        "rename" => parse_rename(argument),
        "delete" => match parse_session(argument, "/delete") {
            Ok(id) => ChatCommand::Delete(id),
            Err(err) => ChatCommand::Invalid(err),
        },
        "reconnect" => ChatCommand::Reconnect,
        "history" => ChatCommand::History,
        "tasks" => ChatCommand::Tasks,
        "task" => parse_task_command(argument),
        "events" => ChatCommand::Events,
        "event" => parse_event_command(argument),
        "projects" => ChatCommand::Projects,
        "project" => parse_project_command(argument),
        "memories" => ChatCommand::Memories,
        "memory" => parse_memory_command(argument),
        "config" => ChatCommand::BackendConfig,
        "transcribe" => match argument {
            Some(path) => ChatCommand::Transcribe(path.to_string()),
            None => ChatCommand::Invalid("/transcribe requires a WAV file path".to_string()),
        },
        "thinking" => match argument.and_then(parse_on_off) {
            Some(value) => ChatCommand::Thinking(value),
            None => ChatCommand::Invalid("/thinking expects 'on' or 'off'".to_string()),
        },
        "status" => ChatCommand::Status,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn parse_session(argument: Option<&str>, name: &str) -> Result<SessionId, String> {
    let Some(arg) = argument else {
        return Err(format!("{name} requires a session id"));
    };
    arg.parse::<SessionId>()
        .map_err(|_| format!("{name} expects a session id, got {arg:?}"))
}

fn parse_id(argument: Option<&str>, name: &str) -> Result<i64, String> {
    let Some(arg) = argument else {
        return Err(format!("{name} requires an id"));
    };
    arg.trim_start_matches('#')
        .parse::<i64>()
        .map_err(|_| format!("{name} expects a numeric id, got {arg:?}"))
}

fn parse_rename(argument: Option<&str>) -> ChatCommand {
    let Some(arg) = argument else {
        return ChatCommand::Invalid("/rename requires a session id and a title".to_string());
    };
    let (id, title) = match arg.split_once(' ') {
        Some((id, title)) => (id, title.trim()),
        None => (arg, ""),
    };
    if title.is_empty() {
        return ChatCommand::Invalid("/rename requires a title".to_string());
    }
    match parse_session(Some(id), "/rename") {
        Ok(id) => ChatCommand::Rename(id, title.to_string()),
        Err(err) => ChatCommand::Invalid(err),
    }
}

fn parse_task_command(argument: Option<&str>) -> ChatCommand {
    let Some(arg) = argument else {
        return ChatCommand::Invalid(
            "/task requires 'add <title>', 'done <id>', 'status <id> <status>', or 'rm <id>'"
                .to_string(),
        );
    };

    let mut parts = arg.splitn(2, ' ');
    let action = parts.next().unwrap_or_default();
    let rest = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());
    match action.to_lowercase().as_str() {
        "add" => match rest {
            Some(title) => ChatCommand::TaskAdd(title.to_string()),
            None => ChatCommand::Invalid("/task add requires a title".to_string()),
        },
        "done" => match parse_id(rest, "/task done") {
            Ok(id) => ChatCommand::TaskStatus(id, TaskStatus::Done),
            Err(err) => ChatCommand::Invalid(err),
        },
        "status" => {
            let Some((id, status)) = rest.and_then(|r| r.split_once(' ')) else {
                return ChatCommand::Invalid("/task status requires an id and a status".to_string());
            };
            let id = match parse_id(Some(id), "/task status") {
                Ok(id) => id,
                Err(err) => return ChatCommand::Invalid(err),
            };
            match status.parse::<TaskStatus>() {
                Ok(status) => ChatCommand::TaskStatus(id, status),
                Err(_) => ChatCommand::Invalid(format!(
                    "/task status expects backlog, todo, in_progress, or done, got {:?}",
                    status.trim()
                )),
            }
        }
        "rm" | "delete" => match parse_id(rest, "/task rm") {
            Ok(id) => ChatCommand::TaskRemove(id),
            Err(err) => ChatCommand::Invalid(err),
        },
        "files" => match parse_id(rest, "/task files") {
            Ok(id) => ChatCommand::TaskFiles(id),
            Err(err) => ChatCommand::Invalid(err),
        },
        _ => ChatCommand::Invalid(
            "Unrecognized /task action (use add, done, status, files, or rm)".to_string(),
        ),
    }
}

fn parse_event_command(argument: Option<&str>) -> ChatCommand {
    let mut parts = argument.unwrap_or_default().splitn(2, ' ');
    let action = parts.next().unwrap_or_default();
    let rest = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());
    match action.to_lowercase().as_str() {
        "rm" | "delete" => match parse_id(rest, "/event rm") {
            Ok(id) => ChatCommand::EventRemove(id),
            Err(err) => ChatCommand::Invalid(err),
        },
        _ => ChatCommand::Invalid("/event requires 'rm <id>'".to_string()),
    }
}

fn parse_project_command(argument: Option<&str>) -> ChatCommand {
    let mut parts = argument.unwrap_or_default().splitn(2, ' ');
    let action = parts.next().unwrap_or_default();
    let rest = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());
    match action.to_lowercase().as_str() {
        "add" => match rest {
            Some(name) => ChatCommand::ProjectAdd(name.to_string()),
            None => ChatCommand::Invalid("/project add requires a name".to_string()),
        },
        "show" => match parse_id(rest, "/project show") {
            Ok(id) => ChatCommand::ProjectShow(id),
            Err(err) => ChatCommand::Invalid(err),
        },
        _ => ChatCommand::Invalid("/project requires 'add <name>' or 'show <id>'".to_string()),
    }
}

fn parse_memory_command(argument: Option<&str>) -> ChatCommand {
    let mut parts = argument.unwrap_or_default().splitn(2, ' ');
    let action = parts.next().unwrap_or_default();
    let rest = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());
    match action.to_lowercase().as_str() {
        "add" => {
            let Some(rest) = rest else {
                return ChatCommand::Invalid("/memory add requires some text".to_string());
            };
            // `@category` may lead the text.
            let (category, content) = match rest.strip_prefix('@') {
                Some(tagged) => match tagged.split_once(' ') {
                    Some((category, content)) => (Some(category.to_string()), content.trim()),
                    None => (Some(tagged.to_string()), ""),
                },
                None => (None, rest),
            };
            if content.is_empty() {
                return ChatCommand::Invalid("/memory add requires some text".to_string());
            }
            ChatCommand::MemoryAdd {
                category,
                content: content.to_string(),
            }
        }
        "rm" | "delete" => match parse_id(rest, "/memory rm") {
            Ok(id) => ChatCommand::MemoryRemove(id),
            Err(err) => ChatCommand::Invalid(err),
        },
        _ => ChatCommand::Invalid(
            "/memory requires 'add [@category] <text>' or 'rm <id>'".to_string(),
        ),
    }
}

fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /sessions              List sessions
  /new [title]           Start a new session
  /switch <id>           Switch to another session
  /rename <id> <title>   Rename a session
  /delete <id>           Delete a session
  /reconnect             Reopen the current session's connection
  /history               Show the current conversation
  /tasks                 List tasks
  /task add <title>      Create a task
  /task done <id>        Mark a task done
  /task status <id> <s>  Move a task (backlog, todo, in_progress, done)
  /task rm <id>          Delete a task
  /task files <id>       List a task's files
  /events                List events
  /event rm <id>         Delete an event
  /projects              List projects
  /project add <name>    Create a project
  /project show <id>     Show a project and its files
  /memories              List stored memories
  /memory add [@cat] <t> Remember something
  /memory rm <id>        Forget a memory
  /config                Show backend settings
  /transcribe <file>     Transcribe a WAV file into the next prompt
  /thinking on|off       Show or hide reasoning
  /status                Show session and connection state
  /help                  Show this help message
  /quit                  Exit the chat"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn plain_messages_are_not_commands() {
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command("what about /quit?"), None);
    }

    #[test]
    fn parse_session_commands() {
        assert_eq!(parse_command("/sessions"), Some(ChatCommand::Sessions));
        assert_eq!(parse_command("/new"), Some(ChatCommand::New(None)));
        assert_eq!(
            parse_command("/new  Trip ideas "),
            Some(ChatCommand::New(Some("Trip ideas".to_string())))
        );
        assert_eq!(
            parse_command("/switch #7"),
            Some(ChatCommand::Switch(SessionId::new(7)))
        );
        assert_eq!(
            parse_command("/delete 3"),
            Some(ChatCommand::Delete(SessionId::new(3)))
        );
        assert!(matches!(
            parse_command("/switch"),
            Some(ChatCommand::Invalid(_))
        ));
        assert!(matches!(
            parse_command("/switch abc"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn parse_rename() {
        assert_eq!(
            parse_command("/rename 4 Weekly shop"),
            Some(ChatCommand::Rename(SessionId::new(4), "Weekly shop".to_string()))
        );
        assert_eq!(
            parse_command("/rename 4"),
            Some(ChatCommand::Invalid("/rename requires a title".to_string()))
        );
        assert!(matches!(
            parse_command("/rename x title"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn parse_task_commands() {
        assert_eq!(parse_command("/tasks"), Some(ChatCommand::Tasks));
        assert_eq!(
            parse_command("/task add Buy milk"),
            Some(ChatCommand::TaskAdd("Buy milk".to_string()))
        );
        assert_eq!(
            parse_command("/task done 5"),
            Some(ChatCommand::TaskStatus(5, TaskStatus::Done))
        );
        assert_eq!(
            parse_command("/task status 5 in-progress"),
            Some(ChatCommand::TaskStatus(5, TaskStatus::InProgress))
        );
        assert_eq!(
            parse_command("/task rm #5"),
            Some(ChatCommand::TaskRemove(5))
        );
        assert!(matches!(
            parse_command("/task status 5 someday"),
            Some(ChatCommand::Invalid(_))
        ));
        assert!(matches!(
            parse_command("/task add"),
            Some(ChatCommand::Invalid(_))
        ));
        assert!(matches!(parse_command("/task"), Some(ChatCommand::Invalid(_))));
    }

    #[test]
    fn parse_event_commands() {
        assert_eq!(parse_command("/events"), Some(ChatCommand::Events));
        assert_eq!(
            parse_command("/event rm 9"),
            Some(ChatCommand::EventRemove(9))
        );
        assert!(matches!(parse_command("/event"), Some(ChatCommand::Invalid(_))));
    }

    #[test]
    fn parse_project_commands() {
        assert_eq!(parse_command("/projects"), Some(ChatCommand::Projects));
        assert_eq!(
            parse_command("/project add Apollo"),
            Some(ChatCommand::ProjectAdd("Apollo".to_string()))
        );
        assert_eq!(
            parse_command("/project show #2"),
            Some(ChatCommand::ProjectShow(2))
        );
        assert_eq!(parse_command("/task files 5"), Some(ChatCommand::TaskFiles(5)));
        assert!(matches!(
            parse_command("/project add"),
            Some(ChatCommand::Invalid(_))
        ));
        assert!(matches!(
            parse_command("/project"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn parse_memory_commands() {
        assert_eq!(parse_command("/memories"), Some(ChatCommand::Memories));
        assert_eq!(
            parse_command("/memory add Likes window seats"),
            Some(ChatCommand::MemoryAdd {
                category: None,
                content: "Likes window seats".to_string(),
            })
        );
        assert_eq!(
            parse_command("/memory add @travel  Likes window seats"),
            Some(ChatCommand::MemoryAdd {
                category: Some("travel".to_string()),
                content: "Likes window seats".to_string(),
            })
        );
        assert_eq!(
            parse_command("/memory rm 12"),
            Some(ChatCommand::MemoryRemove(12))
        );
        assert!(matches!(
            parse_command("/memory add @travel"),
            Some(ChatCommand::Invalid(_))
        ));
        assert_eq!(parse_command("/config"), Some(ChatCommand::BackendConfig));
    }

    #[test]
    fn parse_transcribe() {
        assert_eq!(
            parse_command("/transcribe memo.wav"),
            Some(ChatCommand::Transcribe("memo.wav".to_string()))
        );
        assert!(matches!(
            parse_command("/transcribe"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn parse_thinking() {
        assert_eq!(
            parse_command("/thinking on"),
            Some(ChatCommand::Thinking(true))
        );
        assert_eq!(
            parse_command("/thinking OFF"),
            Some(ChatCommand::Thinking(false))
        );
        assert_eq!(
            parse_command("/thinking maybe"),
            Some(ChatCommand::Invalid(
                "/thinking expects 'on' or 'off'".to_string()
            ))
        );
    }

    #[test]
    fn parse_unknown_command() {
        assert_eq!(
            parse_command("/unknown"),
            Some(ChatCommand::Invalid("Unknown command: /unknown".to_string()))
        );
    }

    #[test]
    fn help_text_not_empty() {
        let help = help_text();
        assert!(help.contains("/quit"));
        assert!(help.contains("/sessions"));
        assert!(help.contains("/transcribe"));
        assert!(help.contains("/task status"));
        assert!(help.contains("/projects"));
        assert!(help.contains("/memory add"));
        assert!(help.contains("/config"));
    }
}
