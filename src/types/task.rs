use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::Error;

/// Identifier of a task on the board.
pub type TaskId = i64;

/// Board column a task sits in.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not yet planned.
    #[default]
    Backlog,
    /// Planned.
    Todo,
    /// Being worked on.
    InProgress,
    /// Finished.
    Done,
    /// A status this client does not know about.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStatus::Backlog => "backlog",
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "backlog" => Ok(TaskStatus::Backlog),
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" | "doing" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            other => Err(Error::validation(
                format!("unknown task status: {other}"),
                Some("status".to_string()),
            )),
        }
    }
}

/// Task priority.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority.
    Low,
    /// Medium priority.
    #[default]
    Med,
    /// High priority.
    High,
    /// A priority this client does not know about.
    #[serde(other)]
    Unknown,
}

/// A task on the board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Server-assigned identifier.
    pub id: TaskId,

    /// Short title.
    pub title: String,

    /// Optional longer description.
    #[serde(default)]
    pub description: Option<String>,

    /// Board column.
    #[serde(default)]
    pub status: TaskStatus,

    /// Priority.
    #[serde(default)]
    pub priority: Priority,

    /// Free-form tag, `GEN` by default.
    #[serde(default)]
    pub tag: Option<String>,

    /// Optional due date.
    #[serde(with = "crate::utils::time::option", default)]
    pub deadline: Option<OffsetDateTime>,

    /// Initials of whoever owns the task (`ME`, `AI`, ...).
    #[serde(default)]
    pub user_initials: Option<String>,

    /// When the task was created.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,

    /// When the task last changed.
    #[serde(with = "crate::utils::time")]
    pub updated_at: OffsetDateTime,
}

/// Payload for creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskCreate {
    /// Short title.
    pub title: String,

    /// Optional longer description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Initial column.
    pub status: TaskStatus,

    /// Priority.
    pub priority: Priority,

    /// Free-form tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Optional due date.
    #[serde(
        with = "crate::utils::time::option",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub deadline: Option<OffsetDateTime>,

    /// Owner initials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_initials: Option<String>,
}

impl TaskCreate {
    /// Creates a backlog task with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Sets the initial status.
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial update of a task.  Only fields that are `Some` are sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskUpdate {
    /// New title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// New description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// New column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,

    /// New priority.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,

    /// New tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// New due date.
    #[serde(
        with = "crate::utils::time::option",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub deadline: Option<OffsetDateTime>,

    /// New owner initials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_initials: Option<String>,
}

impl TaskUpdate {
    /// An update that only moves the task to another column.
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Writes every present field onto `task`.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = Some(description.clone());
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(tag) = &self.tag {
            task.tag = Some(tag.clone());
        }
        if let Some(deadline) = self.deadline {
            task.deadline = Some(deadline);
        }
        if let Some(initials) = &self.user_initials {
            task.user_initials = Some(initials.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_serializes_only_set_fields() {
        let update = TaskUpdate::status(TaskStatus::Done);
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({"status": "done"}));
    }

    #[test]
    fn unknown_status_is_tolerated() {
        let status: TaskStatus = serde_json::from_str("\"blocked\"").unwrap();
        assert_eq!(status, TaskStatus::Unknown);
    }

    #[test]
    fn status_from_str() {
        assert_eq!("in-progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("DONE".parse::<TaskStatus>().unwrap(), TaskStatus::Done);
        assert!("later".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn deserialize_task_with_naive_timestamps() {
        let json = r#"{
            "id": 9, "title": "Write report", "description": null,
            "status": "in_progress", "priority": "high", "tag": "WORK",
            "deadline": null, "user_initials": "ME",
            "created_at": "2025-12-01T09:00:00.5",
            "updated_at": "2025-12-01T09:00:00.5"
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.priority, Priority::High);
        assert!(task.deadline.is_none());
    }
}
