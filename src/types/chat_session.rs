use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::types::StoredMessage;

/// Opaque, server-assigned identifier of a conversation session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(i64);

impl SessionId {
    /// Wraps a raw identifier received from the backend.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier, as used in request paths.
    pub const fn get(self) -> i64 {
        self.0
    }

    /// Interprets a session binding supplied by a caller.
    ///
    /// The empty string and the `new` placeholder mean "no session yet" and
    /// produce `Ok(None)`.
    pub fn parse_binding(value: &str) -> Result<Option<Self>> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("new") {
            return Ok(None);
        }
        value.parse().map(Some)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .trim_start_matches('#')
            .parse::<i64>()
            .map(SessionId)
            .map_err(|_| Error::validation(format!("invalid session id: {s:?}"), None))
    }
}

impl From<i64> for SessionId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

/// A conversation session as listed by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatSession {
    /// Server-assigned identifier.
    pub id: SessionId,

    /// Display title.  Project chats use the `Project: {name}` convention.
    pub title: String,

    /// When the session was created.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,

    /// When the session last changed.
    #[serde(with = "crate::utils::time")]
    pub updated_at: OffsetDateTime,
}

/// A session together with its stored message history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionDetail {
    /// Server-assigned identifier.
    pub id: SessionId,

    /// Display title.
    pub title: String,

    /// When the session was created.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,

    /// When the session last changed.
    #[serde(with = "crate::utils::time")]
    pub updated_at: OffsetDateTime,

    /// Stored messages in conversation order.
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
}

impl SessionDetail {
    /// Drops the history, keeping the listing fields.
    pub fn summary(&self) -> ChatSession {
        ChatSession {
            id: self.id,
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
