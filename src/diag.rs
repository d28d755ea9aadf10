//! The diagnostics channel.
//!
//! Every operation that takes a non-default branch (an unrecognised event, a
//! coerced column, a removed ratio group) says so here. Messages are kept so
//! callers can inspect them and are mirrored to `tracing` as they arrive.

use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub level: Level,
    pub text: String,
}

#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    messages: Vec<Message>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, text: impl Into<String>) {
        let text = text.into();
        info!("{}", text);
        self.messages.push(Message {
            level: Level::Info,
            text,
        });
    }

    pub fn warn(&mut self, text: impl Into<String>) {
        let text = text.into();
        warn!("{}", text);
        self.messages.push(Message {
            level: Level::Warning,
            text,
        });
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether any message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.messages.iter().any(|m| m.text.contains(needle))
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.level == Level::Warning)
    }
}
