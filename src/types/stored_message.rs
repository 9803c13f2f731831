use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::{Role, SessionId};

fn default_kind() -> String {
    "text".to_string()
}

/// A message persisted by the backend, as returned with a session's history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredMessage {
    /// Server-assigned identifier.
    pub id: i64,

    /// The session this message belongs to.
    pub session_id: SessionId,

    /// Author of the message.
    pub role: Role,

    /// Full message text, including any reasoning markers.
    pub content: String,

    /// Content type; the backend only produces `text`.
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,

    /// When the backend stored the message.
    #[serde(with = "crate::utils::time::option", default)]
    pub timestamp: Option<OffsetDateTime>,

    /// Name of the invoked tool when `role` is `tool`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}
