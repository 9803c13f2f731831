//! Terminal rendering of conversations.
//!
//! [`Renderer`] is the output seam; [`PlainTextRenderer`] writes to a
//! terminal with optional ANSI styling, showing reasoning dimmed and italic.
//! [`StreamPrinter`] turns the repeatedly re-parsed content of a growing
//! reply into incremental output.

use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::connection::ConnectionStatus;
use crate::thought::{Span, SpanKind, ThoughtParser};
use crate::timeline::MessageEntry;
use crate::types::Role;

/// ANSI escape code for dim text (used for reasoning).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for italic text (used for reasoning).
const ANSI_ITALIC: &str = "\x1b[3m";

/// ANSI escape code for bold text (used for the user's messages).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for tool names).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (used while connecting).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for green text (used when connected).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used when disconnected).
const ANSI_RED: &str = "\x1b[31m";

/// Trait for rendering conversation output.
pub trait Renderer: Send {
    /// Print a chunk of answer text.
    fn print_text(&mut self, text: &str);

    /// Print a chunk of reasoning text.
    ///
    /// Reasoning is displayed differently (dim/italic) to distinguish it
    /// from the answer.
    fn print_thinking(&mut self, text: &str);

    /// Print a message the user sent.
    fn print_user(&mut self, text: &str);

    /// Print the recorded result of a tool the assistant invoked.
    fn print_tool(&mut self, tool: Option<&str>, content: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Print the connection state.
    fn print_status(&mut self, status: ConnectionStatus);

    /// End the current line and styling so the next output starts fresh.
    fn break_line(&mut self);

    /// Called when a reply is complete.
    fn finish_response(&mut self);

    /// Called when waiting for a reply is interrupted by the user.
    fn print_interrupted(&mut self) {}

    /// Returns true if waiting should be interrupted.
    fn should_interrupt(&self) -> bool {
        false
    }
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
    in_thinking: bool,
    line_start: bool,
    interrupted: Option<Arc<AtomicBool>>,
}

impl PlainTextRenderer<Stdout> {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer writing to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            in_thinking: false,
            line_start: true,
            interrupted: None,
        }
    }

    /// Attaches an interrupt flag to the renderer.
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(interrupted);
        self
    }

    /// Returns the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
        self.line_start = text.ends_with('\n');
    }

    fn style(&mut self, code: &str) {
        if self.use_color {
            let _ = self.out.write_all(code.as_bytes());
        }
    }

    fn reset_thinking(&mut self) {
        if self.in_thinking {
            self.style(ANSI_RESET);
            self.in_thinking = false;
        }
    }
}

impl Default for PlainTextRenderer<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn print_text(&mut self, text: &str) {
        self.reset_thinking();
        self.write(text);
    }

    fn print_thinking(&mut self, text: &str) {
        if !self.in_thinking {
            if self.use_color {
                self.style(ANSI_DIM);
                self.style(ANSI_ITALIC);
            } else {
                self.write("[thinking] ");
            }
            self.in_thinking = true;
        }
        self.write(text);
    }

    fn print_user(&mut self, text: &str) {
        self.break_line();
        if self.use_color {
            self.write(&format!("{ANSI_BOLD}You:{ANSI_RESET} {text}\n"));
        } else {
            self.write(&format!("You: {text}\n"));
        }
    }

    fn print_tool(&mut self, tool: Option<&str>, content: &str) {
        self.break_line();
        let tool = tool.unwrap_or("tool");
        if self.use_color {
            self.write(&format!("{ANSI_CYAN}[tool: {tool}]{ANSI_RESET} {content}\n"));
        } else {
            self.write(&format!("[tool: {tool}] {content}\n"));
        }
    }

    fn print_error(&mut self, error: &str) {
        self.break_line();
        eprintln!("Error: {error}");
    }

    fn print_info(&mut self, info: &str) {
        self.break_line();
        self.write(&format!("{info}\n"));
    }

    fn print_status(&mut self, status: ConnectionStatus) {
        self.break_line();
        if self.use_color {
            let color = match status {
                ConnectionStatus::Connecting => ANSI_YELLOW,
                ConnectionStatus::Connected => ANSI_GREEN,
                ConnectionStatus::Disconnected => ANSI_RED,
            };
            self.write(&format!("{color}[{status}]{ANSI_RESET}\n"));
        } else {
            self.write(&format!("[{status}]\n"));
        }
    }

    fn break_line(&mut self) {
        self.reset_thinking();
        if !self.line_start {
            self.write("\n");
        }
    }

    fn finish_response(&mut self) {
        self.break_line();
    }

    fn print_interrupted(&mut self) {
        self.break_line();
        self.write("[interrupted]\n");
    }

    fn should_interrupt(&self) -> bool {
        self.interrupted
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// What a [`StreamPrinter::update`] did.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PrintUpdate {
    /// Nothing new to show.
    Unchanged,
    /// New text was appended to what was already shown.
    Appended,
    /// Text already shown was reclassified, so the reply was shown again in full.
    Reprinted,
}

/// Prints a growing reply incrementally.
///
/// Every update re-parses the whole entry and prints only text not yet
/// shown.  If text already shown changes kind or content, as when a late
/// closing marker turns earlier answer text into reasoning, the reply is
/// printed again from the start.  While the entry grows, a trailing partial
/// marker is held back so it is never shown as text.
#[derive(Debug, Clone)]
pub struct StreamPrinter {
    parser: ThoughtParser,
    show_thinking: bool,
    printed: Vec<(SpanKind, String)>,
}

impl StreamPrinter {
    /// A printer for one reply.
    pub fn new(parser: ThoughtParser, show_thinking: bool) -> Self {
        Self {
            parser,
            show_thinking,
            printed: Vec::new(),
        }
    }

    /// Prints whatever of `entry` has not been shown yet.
    ///
    /// Only assistant entries are replies; anything else is ignored.
    pub fn update(&mut self, entry: &MessageEntry, renderer: &mut dyn Renderer) -> PrintUpdate {
        if entry.role() != Role::Assistant {
            return PrintUpdate::Unchanged;
        }
        let spans = self.parser.parse(entry.content(), entry.is_growing());
        let visible = self.visible(&spans, entry.is_growing());
        if !self.consistent(&visible) {
            renderer.break_line();
            renderer.print_info("[reply reclassified]");
            self.printed.clear();
            self.print_from(&visible, renderer);
            return PrintUpdate::Reprinted;
        }
        if self.print_from(&visible, renderer) {
            PrintUpdate::Appended
        } else {
            PrintUpdate::Unchanged
        }
    }

    /// Ends the reply's output.
    pub fn finish(&mut self, renderer: &mut dyn Renderer) {
        renderer.finish_response();
    }

    /// The spans' display text, minus leading whitespace and any held-back marker.
    fn visible<'a>(&self, spans: &'a [Span], growing: bool) -> Vec<(SpanKind, &'a str)> {
        let last = spans.len().saturating_sub(1);
        spans
            .iter()
            .enumerate()
            .map(|(i, span)| {
                let mut text = span.text.trim_start();
                if growing && i == last {
                    let held = self.partial_marker_len(text);
                    text = &text[..text.len() - held];
                }
                (span.kind, text)
            })
            .collect()
    }

    /// Length of the longest suffix of `text` that could begin a marker.
    fn partial_marker_len(&self, text: &str) -> usize {
        let markers = [self.parser.open_marker(), self.parser.close_marker()];
        (1..=text.len())
            .rev()
            .filter(|&n| text.is_char_boundary(text.len() - n))
            .find(|&n| {
                let suffix = &text[text.len() - n..];
                markers
                    .iter()
                    .any(|m| m.len() > n && m.starts_with(suffix))
            })
            .unwrap_or(0)
    }

    fn consistent(&self, visible: &[(SpanKind, &str)]) -> bool {
        self.printed.iter().enumerate().all(|(i, (kind, shown))| {
            let Some((new_kind, new_text)) = visible.get(i) else {
                return shown.trim().is_empty();
            };
            if kind != new_kind {
                return false;
            }
            new_text.starts_with(shown.as_str())
                || (shown.starts_with(new_text) && shown[new_text.len()..].trim().is_empty())
        })
    }

    /// Prints the unseen tail of every span; returns whether anything was printed.
    fn print_from(&mut self, visible: &[(SpanKind, &str)], renderer: &mut dyn Renderer) -> bool {
        let mut wrote = false;
        for (i, &(kind, text)) in visible.iter().enumerate() {
            let delta = match self.printed.get(i) {
                Some((_, shown)) if text.starts_with(shown.as_str()) => &text[shown.len()..],
                Some(_) => continue,
                None => {
                    if text.is_empty() && kind == SpanKind::Answer {
                        continue;
                    }
                    if !self.printed.is_empty() {
                        renderer.break_line();
                    }
                    self.printed.push((kind, String::new()));
                    text
                }
            };
            if delta.is_empty() {
                continue;
            }
            match kind {
                SpanKind::Answer => renderer.print_text(delta),
                SpanKind::Reasoning if self.show_thinking => renderer.print_thinking(delta),
                SpanKind::Reasoning => {}
            }
            self.printed[i].1.push_str(delta);
            wrote = true;
        }
        wrote
    }
}

/// Prints a finished entry in full.
pub fn render_entry(
    renderer: &mut dyn Renderer,
    parser: &ThoughtParser,
    entry: &MessageEntry,
    show_thinking: bool,
) {
    match entry.role() {
        Role::User => renderer.print_user(entry.content()),
        Role::Tool => renderer.print_tool(entry.tool_call_id(), entry.content()),
        Role::Assistant => {
            let mut printer = StreamPrinter::new(parser.clone(), show_thinking);
            printer.update(entry, renderer);
            printer.finish(renderer);
        }
    }
}
