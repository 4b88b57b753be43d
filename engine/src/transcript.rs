//! User-visible side of a session.
//!
//! The [`Agent`](crate::Agent) reports everything the user should see through a
//! [`Transcript`]. [`ConsoleTranscript`] prints to the terminal; [`RecordingTranscript`]
//! keeps events in memory for tests and embedding.

use std::io::{self, Write};

use crossterm::style::Stylize;

pub const BANNER: &str = "Chat with Claude (use 'ctrl-c' to quit)";
pub const USER_PROMPT: &str = "You: ";
pub const ASSISTANT_PREFIX: &str = "Claude: ";

pub trait Transcript: Send {
    fn banner(&mut self);
    /// Shown before each read of user input.
    fn prompt(&mut self);
    fn assistant_text(&mut self, text: &str);
    fn tool_use(&mut self, name: &str, input: &serde_json::Value);
    /// The assistant produced a turn without further tool calls.
    fn turn_complete(&mut self);
    fn error(&mut self, message: &str);
}

/// Colored terminal output. Write failures are ignored; a closed stdout must not end
/// the session.
#[derive(Debug, Default)]
pub struct ConsoleTranscript {
    color: bool,
}

impl ConsoleTranscript {
    #[must_use]
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn styled_label(&self, label: &str, paint: fn(&str) -> String) -> String {
        if self.color {
            paint(label)
        } else {
            label.to_string()
        }
    }
}

impl Transcript for ConsoleTranscript {
    fn banner(&mut self) {
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{BANNER}");
    }

    fn prompt(&mut self) {
        let label = self.styled_label(USER_PROMPT, |s| s.blue().to_string());
        let mut out = io::stdout().lock();
        let _ = write!(out, "{label}");
        let _ = out.flush();
    }

    fn assistant_text(&mut self, text: &str) {
        let label = self.styled_label(ASSISTANT_PREFIX, |s| s.yellow().to_string());
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{label}{text}");
    }

    fn tool_use(&mut self, name: &str, input: &serde_json::Value) {
        let line = format!("tool: {name}({input})");
        let line = self.styled_label(&line, |s| s.green().to_string());
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{line}");
    }

    fn turn_complete(&mut self) {}

    fn error(&mut self, message: &str) {
        let label = self.styled_label("Error: ", |s| s.red().to_string());
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "{label}{message}");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    Banner,
    Prompt,
    AssistantText(String),
    ToolUse { name: String, input: String },
    TurnComplete,
    Error(String),
}

#[derive(Debug, Default)]
pub struct RecordingTranscript {
    pub events: Vec<TranscriptEvent>,
}

impl RecordingTranscript {
    pub fn assistant_texts(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter_map(|event| match event {
            TranscriptEvent::AssistantText(text) => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter_map(|event| match event {
            TranscriptEvent::Error(message) => Some(message.as_str()),
            _ => None,
        })
    }
}

impl Transcript for RecordingTranscript {
    fn banner(&mut self) {
        self.events.push(TranscriptEvent::Banner);
    }

    fn prompt(&mut self) {
        self.events.push(TranscriptEvent::Prompt);
    }

    fn assistant_text(&mut self, text: &str) {
        self.events
            .push(TranscriptEvent::AssistantText(text.to_string()));
    }

    fn tool_use(&mut self, name: &str, input: &serde_json::Value) {
        self.events.push(TranscriptEvent::ToolUse {
            name: name.to_string(),
            input: input.to_string(),
        });
    }

    fn turn_complete(&mut self) {
        self.events.push(TranscriptEvent::TurnComplete);
    }

    fn error(&mut self, message: &str) {
        self.events.push(TranscriptEvent::Error(message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{RecordingTranscript, Transcript, TranscriptEvent};

    #[test]
    fn recording_transcript_keeps_order() {
        let mut transcript = RecordingTranscript::default();
        transcript.banner();
        transcript.assistant_text("hi");
        transcript.tool_use("grep", &json!({"pattern": "x"}));
        transcript.error("boom");

        assert_eq!(
            transcript.events,
            vec![
                TranscriptEvent::Banner,
                TranscriptEvent::AssistantText("hi".into()),
                TranscriptEvent::ToolUse {
                    name: "grep".into(),
                    input: r#"{"pattern":"x"}"#.into(),
                },
                TranscriptEvent::Error("boom".into()),
            ]
        );
        assert_eq!(transcript.assistant_texts().collect::<Vec<_>>(), ["hi"]);
        assert_eq!(transcript.errors().collect::<Vec<_>>(), ["boom"]);
    }
}
