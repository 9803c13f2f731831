//! The ordered log of one conversation.
//!
//! A [`Timeline`] holds user, assistant, and tool entries in conversation
//! order.  At most one entry is growing at a time and it is always the last
//! one: [`Timeline::accumulate`] extends it in place, and anything else that
//! is appended ends it first.  The transport never says when a reply is done,
//! so a turn ends only when the next entry is appended or the session is torn
//! down; [`MessageEntry::is_growing`] is the single place that decision is read.

use time::OffsetDateTime;

use crate::types::{Role, StoredMessage};

/// One entry of a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEntry {
    role: Role,
    content: String,
    tool_call_id: Option<String>,
    timestamp: Option<OffsetDateTime>,
    streaming: bool,
}

impl MessageEntry {
    /// A finished message typed by the user.
    pub fn user(content: impl Into<String>) -> Self {
        Self::finished(Role::User, content.into(), None)
    }

    /// A finished assistant message, as loaded from history.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::finished(Role::Assistant, content.into(), None)
    }

    /// The recorded result of invoking `tool_call_id`.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::finished(Role::Tool, content.into(), Some(tool_call_id.into()))
    }

    fn finished(role: Role, content: String, tool_call_id: Option<String>) -> Self {
        Self {
            role,
            content,
            tool_call_id,
            timestamp: Some(OffsetDateTime::now_utc()),
            streaming: false,
        }
    }

    fn streaming_assistant(content: String) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_call_id: None,
            timestamp: None,
            streaming: true,
        }
    }

    /// Who authored the entry.
    pub fn role(&self) -> Role {
        self.role
    }

    /// The text received so far, including any reasoning markers.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// The invoked tool, for tool entries.
    pub fn tool_call_id(&self) -> Option<&str> {
        self.tool_call_id.as_deref()
    }

    /// When the entry was finished; `None` while it is still growing.
    pub fn timestamp(&self) -> Option<OffsetDateTime> {
        self.timestamp
    }

    /// Whether more fragments may still be appended to this entry.
    pub fn is_growing(&self) -> bool {
        self.role == Role::Assistant && self.streaming
    }

    fn finish(&mut self) {
        if self.streaming {
            self.streaming = false;
            self.timestamp = Some(OffsetDateTime::now_utc());
        }
    }
}

impl From<StoredMessage> for MessageEntry {
    fn from(message: StoredMessage) -> Self {
        Self {
            role: message.role,
            content: message.content,
            tool_call_id: message.tool_call_id,
            timestamp: message.timestamp,
            streaming: false,
        }
    }
}

/// Ordered, append-only sequence of [`MessageEntry`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    entries: Vec<MessageEntry>,
}

impl Timeline {
    /// An empty timeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// A timeline seeded with stored history.
    pub fn from_history(messages: impl IntoIterator<Item = StoredMessage>) -> Self {
        Self {
            entries: messages.into_iter().map(MessageEntry::from).collect(),
        }
    }

    /// Appends a finished entry, ending any reply still growing.
    pub fn append(&mut self, mut entry: MessageEntry) {
        self.end_turn();
        entry.finish();
        self.entries.push(entry);
    }

    /// Appends an empty growing assistant entry.
    ///
    /// Does nothing if the last entry is already growing.
    pub fn begin_streaming_assistant_entry(&mut self) {
        if self.growing().is_some() {
            return;
        }
        self.entries
            .push(MessageEntry::streaming_assistant(String::new()));
    }

    /// Adds a received fragment to the conversation.
    ///
    /// The fragment extends the growing assistant entry if there is one, and
    /// starts a new growing assistant entry otherwise.
    pub fn accumulate(&mut self, fragment: &str) {
        match self.growing_mut() {
            Some(entry) => entry.content.push_str(fragment),
            None => self
                .entries
                .push(MessageEntry::streaming_assistant(fragment.to_string())),
        }
    }

    /// Marks the growing entry, if any, as finished.
    pub fn end_turn(&mut self) {
        if let Some(entry) = self.growing_mut() {
            entry.finish();
        }
    }

    /// The growing entry, if the last entry is one.
    pub fn growing(&self) -> Option<&MessageEntry> {
        self.entries.last().filter(|e| e.is_growing())
    }

    fn growing_mut(&mut self) -> Option<&mut MessageEntry> {
        self.entries.last_mut().filter(|e| e.is_growing())
    }

    /// The entries in conversation order.
    pub fn snapshot(&self) -> &[MessageEntry] {
        &self.entries
    }

    /// The most recent entry.
    pub fn last(&self) -> Option<&MessageEntry> {
        self.entries.last()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the timeline has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionId;

    fn growing_count(timeline: &Timeline) -> usize {
        timeline.snapshot().iter().filter(|e| e.is_growing()).count()
    }

    #[test]
    fn accumulate_on_empty_timeline_builds_one_entry() {
        let mut timeline = Timeline::new();
        let fragments = ["Hel", "lo", ", ", "<think>", "world"];
        for fragment in fragments {
            timeline.accumulate(fragment);
            assert_eq!(timeline.len(), 1);
            assert!(timeline.snapshot()[0].is_growing());
        }
        let entry = &timeline.snapshot()[0];
        assert_eq!(entry.role(), Role::Assistant);
        assert_eq!(entry.content(), fragments.concat());
        assert_eq!(entry.timestamp(), None);
    }

    #[test]
    fn accumulate_after_user_entry_starts_reply() {
        let mut timeline = Timeline::new();
        timeline.append(MessageEntry::user("hi"));
        timeline.accumulate("hello");
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.snapshot()[0].content(), "hi");
        assert!(!timeline.snapshot()[0].is_growing());
        assert!(timeline.snapshot()[1].is_growing());
    }

    #[test]
    fn accumulate_after_finished_assistant_starts_new_entry() {
        let mut timeline = Timeline::new();
        timeline.accumulate("first");
        timeline.end_turn();
        timeline.accumulate("second");
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.snapshot()[0].content(), "first");
        assert_eq!(timeline.snapshot()[1].content(), "second");
    }

    #[test]
    fn begin_is_a_no_op_while_growing() {
        let mut timeline = Timeline::new();
        timeline.begin_streaming_assistant_entry();
        timeline.begin_streaming_assistant_entry();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.snapshot()[0].content(), "");
        timeline.accumulate("abc");
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.snapshot()[0].content(), "abc");
    }

    #[test]
    fn append_ends_the_growing_entry() {
        let mut timeline = Timeline::new();
        timeline.accumulate("partial");
        timeline.append(MessageEntry::user("next"));
        let entries = timeline.snapshot();
        assert!(!entries[0].is_growing());
        assert!(entries[0].timestamp().is_some());
        assert_eq!(entries[1].role(), Role::User);
        assert_eq!(growing_count(&timeline), 0);
    }

    #[test]
    fn at_most_one_growing_entry_and_it_is_last() {
        let mut timeline = Timeline::new();
        timeline.append(MessageEntry::user("a"));
        timeline.begin_streaming_assistant_entry();
        timeline.accumulate("x");
        timeline.append(MessageEntry::tool("create_task", "done"));
        timeline.accumulate("y");
        timeline.append(MessageEntry::user("b"));
        timeline.begin_streaming_assistant_entry();
        assert_eq!(growing_count(&timeline), 1);
        assert!(timeline.last().is_some_and(|e| e.is_growing()));
    }

    #[test]
    fn finished_entries_are_never_touched() {
        let mut timeline = Timeline::new();
        timeline.append(MessageEntry::user("question"));
        timeline.accumulate("answer");
        timeline.end_turn();
        let before = timeline.snapshot()[..2].to_vec();
        timeline.accumulate("more");
        timeline.end_turn();
        timeline.end_turn();
        assert_eq!(&timeline.snapshot()[..2], before.as_slice());
    }

    #[test]
    fn appended_entries_are_finished() {
        let mut timeline = Timeline::new();
        let entry = MessageEntry::streaming_assistant("x".to_string());
        timeline.append(entry);
        assert!(!timeline.snapshot()[0].is_growing());
    }

    #[test]
    fn tool_entries_carry_the_tool_name() {
        let entry = MessageEntry::tool("create_event", "Created event 4");
        assert_eq!(entry.role(), Role::Tool);
        assert_eq!(entry.tool_call_id(), Some("create_event"));
        assert!(!entry.is_growing());
    }

    #[test]
    fn history_is_loaded_finished_and_in_order() {
        let messages = vec![
            StoredMessage {
                id: 1,
                session_id: SessionId::new(9),
                role: Role::User,
                content: "hi".to_string(),
                kind: "text".to_string(),
                timestamp: None,
                tool_call_id: None,
            },
            StoredMessage {
                id: 2,
                session_id: SessionId::new(9),
                role: Role::Assistant,
                content: "<think>greet</think>Hello!".to_string(),
                kind: "text".to_string(),
                timestamp: None,
                tool_call_id: None,
            },
        ];
        let mut timeline = Timeline::from_history(messages);
        assert_eq!(timeline.len(), 2);
        assert_eq!(growing_count(&timeline), 0);
        timeline.accumulate("new");
        assert_eq!(timeline.len(), 3);
    }
}
