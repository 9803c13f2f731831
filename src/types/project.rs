use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Identifier of a project.
pub type ProjectId = i64;

fn default_status() -> String {
    "active".to_string()
}

/// A project with its own document store and chat sessions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    /// Server-assigned identifier.
    pub id: ProjectId,

    /// Project name; project chats are titled `Project: {name}`.
    pub name: String,

    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,

    /// Lifecycle status, `active` by default.
    #[serde(default = "default_status")]
    pub status: String,

    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Number of uploaded files.
    #[serde(default)]
    pub file_count: u32,

    /// When the project was created.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,

    /// When the project last changed.
    #[serde(with = "crate::utils::time")]
    pub updated_at: OffsetDateTime,
}

/// Payload for creating a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectCreate {
    /// Project name.
    pub name: String,

    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Lifecycle status.
    pub status: String,

    /// Free-form tags.
    pub tags: Vec<String>,
}

impl ProjectCreate {
    /// Creates an active, untagged project.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            status: default_status(),
            tags: Vec::new(),
        }
    }
}

/// A file uploaded to a project or task, with its generated summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredFile {
    /// Server-assigned identifier.
    pub id: i64,

    /// Original file name.
    pub filename: String,

    /// File type as detected by the backend.
    pub file_type: String,

    /// Generated summary, once available.
    #[serde(default)]
    pub summary: Option<String>,

    /// When the file was uploaded.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,
}
