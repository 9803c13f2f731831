use std::fmt;

use serde::{Deserialize, Serialize};

/// Author of a conversation entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Text typed (or dictated) by the user.
    User,

    /// Text produced by the assistant, possibly streamed.
    Assistant,

    /// The recorded result of a tool the assistant invoked.
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}
