//! Separating reasoning from answer text in assistant replies.
//!
//! Reasoning models wrap their deliberation in literal markers (`<think>` and
//! `</think>` by default) inside the same text stream as the answer.  The
//! markers are not real markup: they arrive split across fragments, a reply
//! may contain several pairs, and one known backend defect drops the opening
//! marker entirely.  [`ThoughtParser::parse`] classifies the *whole* current
//! content of an entry on every call; nothing is carried between calls.
//!
//! The rules, applied to the full content string:
//!
//! - If an opening marker is present, each opener is matched with the nearest
//!   following closer.  The text between them is one complete reasoning span
//!   (trimmed, with any nested openers removed).  Text outside the pairs is
//!   answer text and is kept verbatim.  An opener with no closer yields a
//!   reasoning span holding everything after it; it is incomplete while the
//!   entry streams.
//! - If no opener is present but a closer is, everything before the first
//!   closer is one complete reasoning span and everything after it is answer
//!   text (both trimmed).  This recovers replies whose opening marker was
//!   dropped upstream.
//! - Otherwise the whole content is a single answer span.
//!
//! Whitespace-only answer text is never emitted.

use crate::error::{Error, Result};

/// Default opening marker.
pub const DEFAULT_OPEN_MARKER: &str = "<think>";

/// Default closing marker.
pub const DEFAULT_CLOSE_MARKER: &str = "</think>";

/// What a span of an assistant reply represents.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SpanKind {
    /// Internal deliberation, displayed apart from the reply.
    Reasoning,

    /// The user-facing reply.
    Answer,
}

/// One labeled piece of an assistant reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// Reasoning or answer.
    pub kind: SpanKind,

    /// The text to display, without markers.
    pub text: String,

    /// False while more text may still be added to this span.
    pub complete: bool,
}

impl Span {
    /// Creates a reasoning span.
    pub fn reasoning(text: impl Into<String>, complete: bool) -> Self {
        Self {
            kind: SpanKind::Reasoning,
            text: text.into(),
            complete,
        }
    }

    /// Creates an answer span.
    pub fn answer(text: impl Into<String>, complete: bool) -> Self {
        Self {
            kind: SpanKind::Answer,
            text: text.into(),
            complete,
        }
    }

    /// Returns true for reasoning spans.
    pub fn is_reasoning(&self) -> bool {
        self.kind == SpanKind::Reasoning
    }
}

/// Splits assistant text into reasoning and answer spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThoughtParser {
    open: String,
    close: String,
}

impl ThoughtParser {
    /// Creates a parser for a custom marker pair.
    ///
    /// Markers must be non-empty and distinct, and neither may contain the other.
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Result<Self> {
        let open = open.into();
        let close = close.into();
        if open.is_empty() || close.is_empty() {
            return Err(Error::config("reasoning markers must not be empty"));
        }
        if open.contains(&close) || close.contains(&open) {
            return Err(Error::config(format!(
                "reasoning markers {open:?} and {close:?} overlap"
            )));
        }
        Ok(Self { open, close })
    }

    /// The opening marker.
    pub fn open_marker(&self) -> &str {
        &self.open
    }

    /// The closing marker.
    pub fn close_marker(&self) -> &str {
        &self.close
    }

    /// Classifies `content` into an ordered sequence of spans.
    ///
    /// `streaming` says whether the entry may still grow.  It decides whether
    /// an unterminated reasoning span and a trailing answer span are reported
    /// as incomplete.
    pub fn parse(&self, content: &str, streaming: bool) -> Vec<Span> {
        let mut spans = Vec::new();
        if content.contains(self.open.as_str()) {
            self.parse_pairs(content, streaming, &mut spans);
        } else if let Some((thought, rest)) = content.split_once(self.close.as_str()) {
            // Opening marker lost upstream: everything before the closer is reasoning.
            spans.push(Span::reasoning(thought.trim(), true));
            push_answer(&mut spans, rest.trim());
        } else {
            push_answer(&mut spans, content);
        }
        if streaming {
            if let Some(last) = spans.last_mut() {
                if last.kind == SpanKind::Answer {
                    last.complete = false;
                }
            }
        }
        spans
    }

    fn parse_pairs(&self, content: &str, streaming: bool, spans: &mut Vec<Span>) {
        let mut rest = content;
        loop {
            let Some(start) = rest.find(self.open.as_str()) else {
                push_answer(spans, rest);
                return;
            };
            push_answer(spans, &rest[..start]);
            let body = &rest[start + self.open.len()..];
            match body.find(self.close.as_str()) {
                Some(end) => {
                    let inner = body[..end].replace(self.open.as_str(), "");
                    spans.push(Span::reasoning(inner.trim(), true));
                    rest = &body[end + self.close.len()..];
                }
                None if streaming => {
                    spans.push(Span::reasoning(body, false));
                    return;
                }
                None => {
                    // The reply ended without closing its reasoning.
                    spans.push(Span::reasoning(body.trim(), true));
                    return;
                }
            }
        }
    }
}

impl Default for ThoughtParser {
    fn default() -> Self {
        Self {
            open: DEFAULT_OPEN_MARKER.to_string(),
            close: DEFAULT_CLOSE_MARKER.to_string(),
        }
    }
}

/// Parses `content` with the default `<think>` markers.
pub fn parse_thoughts(content: &str, streaming: bool) -> Vec<Span> {
    ThoughtParser::default().parse(content, streaming)
}

fn push_answer(spans: &mut Vec<Span>, text: &str) {
    if !text.trim().is_empty() {
        spans.push(Span::answer(text, true));
    }
}
