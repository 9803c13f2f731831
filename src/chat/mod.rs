//! Chat application module for talking to the assistant from a terminal.
//!
//! This module provides the pieces of the `jarvis-chat` REPL built on top of
//! the jarvis client library. It supports:
//!
//! - Streaming replies with reasoning shown dimmed (or hidden)
//! - General, project, and task chat scopes
//! - Slash commands for sessions, tasks, and events
//! - Dictation by transcribing WAV files into the input line
//!
//! # Architecture
//!
//! The module is organized into several components:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`conversation`]: A scope's session list wired to the session manager
//! - [`commands`]: Slash command parsing
//! - [`draft`]: The pending input line

mod commands;
mod config;
mod conversation;
mod draft;

pub use crate::render::{PlainTextRenderer, PrintUpdate, Renderer, StreamPrinter, render_entry};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig, ChatScope};
pub use conversation::Conversation;
pub use draft::Draft;
