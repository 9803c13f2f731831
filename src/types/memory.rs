use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

fn default_category() -> String {
    "general".to_string()
}

/// A long-lived fact the assistant keeps about the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Memory {
    /// Server-assigned identifier.
    pub id: i64,

    /// The remembered fact.
    pub content: String,

    /// Grouping such as `general`, `preference`, `work`.
    #[serde(default = "default_category")]
    pub category: String,

    /// When the memory was recorded.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,
}

/// Payload for recording a memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryCreate {
    /// The fact to remember.
    pub content: String,

    /// Grouping.
    pub category: String,
}

impl MemoryCreate {
    /// Creates a memory in the given category, `general` when `None`.
    pub fn new(content: impl Into<String>, category: Option<String>) -> Self {
        Self {
            content: content.into(),
            category: category.unwrap_or_else(default_category),
        }
    }
}
