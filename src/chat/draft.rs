//! The pending input line, which dictation appends to.

use crate::error::Result;

/// Text waiting to be edited and sent at the next prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    text: String,
}

impl Draft {
    /// An empty draft.
    pub fn new() -> Self {
        Self::default()
    }

    /// The draft text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Appends `text`, separated from existing text by a space.
    pub fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(text);
    }

    /// Appends a transcription result.
    ///
    /// A failed transcription leaves the draft as it was and hands the error back.
    pub fn apply_transcription(&mut self, result: Result<String>) -> Result<()> {
        let text = result?;
        self.append(text.trim());
        Ok(())
    }

    /// Takes the draft, leaving it empty.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn transcription_fills_an_empty_draft() {
        let mut draft = Draft::new();
        draft.apply_transcription(Ok("remind me at noon".to_string())).unwrap();
        assert_eq!(draft.text(), "remind me at noon");
    }

    #[test]
    fn transcription_appends_with_a_space() {
        let mut draft = Draft::new();
        draft.append("Add a task:");
        draft.apply_transcription(Ok(" buy milk\n".to_string())).unwrap();
        assert_eq!(draft.text(), "Add a task: buy milk");
    }

    #[test]
    fn failed_transcription_keeps_the_draft() {
        let mut draft = Draft::new();
        draft.append("half a thought");
        let result = draft.apply_transcription(Err(Error::service_unavailable("whisper down")));
        assert!(result.is_err());
        assert_eq!(draft.text(), "half a thought");
    }

    #[test]
    fn empty_transcription_changes_nothing() {
        let mut draft = Draft::new();
        draft.append("hello");
        draft.apply_transcription(Ok(String::new())).unwrap();
        assert_eq!(draft.text(), "hello");
    }

    #[test]
    fn take_empties() {
        let mut draft = Draft::new();
        draft.append("send me");
        assert_eq!(draft.take(), "send me");
        assert!(draft.is_empty());
    }
}
