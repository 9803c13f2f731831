use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::TaskId;

/// Identifier of a calendar event.
pub type EventId = i64;

fn default_kind() -> String {
    "event".to_string()
}

/// A calendar event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Server-assigned identifier.
    pub id: EventId,

    /// Short title.
    pub title: String,

    /// Optional longer description.
    #[serde(default)]
    pub description: Option<String>,

    /// Start of the event.
    #[serde(with = "crate::utils::time")]
    pub start_time: OffsetDateTime,

    /// End of the event.
    #[serde(with = "crate::utils::time")]
    pub end_time: OffsetDateTime,

    /// Whether the event spans whole days.
    #[serde(default)]
    pub all_day: bool,

    /// Event category (`event`, `meeting`, `work`, ...).
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,

    /// Task this event was scheduled for, if any.
    #[serde(default)]
    pub task_id: Option<TaskId>,

    /// When the event was created.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,
}

/// Payload for creating an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventCreate {
    /// Short title.
    pub title: String,

    /// Optional longer description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Start of the event.
    #[serde(with = "crate::utils::time")]
    pub start_time: OffsetDateTime,

    /// End of the event.
    #[serde(with = "crate::utils::time")]
    pub end_time: OffsetDateTime,

    /// Whether the event spans whole days.
    pub all_day: bool,

    /// Event category.
    #[serde(rename = "type")]
    pub kind: String,

    /// Task this event is scheduled for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
}

impl EventCreate {
    /// Creates a plain event between two instants.
    pub fn new(title: impl Into<String>, start_time: OffsetDateTime, end_time: OffsetDateTime) -> Self {
        Self {
            title: title.into(),
            description: None,
            start_time,
            end_time,
            all_day: false,
            kind: default_kind(),
            task_id: None,
        }
    }
}

/// Partial update of an event.  Only fields that are `Some` are sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EventUpdate {
    /// New title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// New description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// New start.
    #[serde(
        with = "crate::utils::time::option",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub start_time: Option<OffsetDateTime>,

    /// New end.
    #[serde(
        with = "crate::utils::time::option",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub end_time: Option<OffsetDateTime>,

    /// New all-day flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_day: Option<bool>,
}

impl EventUpdate {
    /// Writes every present field onto `event`.
    pub fn apply_to(&self, event: &mut Event) {
        if let Some(title) = &self.title {
            event.title = title.clone();
        }
        if let Some(description) = &self.description {
            event.description = Some(description.clone());
        }
        if let Some(start_time) = self.start_time {
            event.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            event.end_time = end_time;
        }
        if let Some(all_day) = self.all_day {
            event.all_day = all_day;
        }
    }
}
