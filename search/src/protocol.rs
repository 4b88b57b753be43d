//! Typed view of ripgrep's `--json` output.
//!
//! Every stdout line is one [`ProtocolMessage`]. The four shapes are validated field by
//! field; a line with an unknown `type` or a missing field is an error rather than
//! something to skip.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ProtocolMessage {
    Begin(Begin),
    Match(MatchData),
    End(End),
    Summary(Summary),
}

impl ProtocolMessage {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    #[must_use]
    pub fn into_match(self) -> Option<MatchData> {
        match self {
            Self::Match(data) => Some(data),
            _ => None,
        }
    }
}

/// ripgrep's wrapper for UTF-8 payloads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Text {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Begin {
    pub path: Text,
}

/// One matching line. This is the caller-facing search result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MatchData {
    pub path: Text,
    pub lines: Text,
    pub line_number: u64,
    pub absolute_offset: u64,
    pub submatches: Vec<SubMatch>,
}

impl MatchData {
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path.text
    }

    /// The matched line without its line terminator.
    #[must_use]
    pub fn line_text(&self) -> &str {
        let text = self.lines.text.as_str();
        let text = text.strip_suffix('\n').unwrap_or(text);
        text.strip_suffix('\r').unwrap_or(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubMatch {
    #[serde(rename = "match")]
    pub matched: Text,
    /// Byte offset into `lines.text`.
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct End {
    pub path: Text,
    pub binary_offset: Option<u64>,
    pub stats: Stats,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Summary {
    pub elapsed_total: Elapsed,
    pub stats: Stats,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Elapsed {
    pub secs: u64,
    pub nanos: u32,
    pub human: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Stats {
    pub elapsed: Elapsed,
    pub searches: u64,
    pub searches_with_match: u64,
    pub bytes_searched: u64,
    pub bytes_printed: u64,
    pub matched_lines: u64,
    pub matches: u64,
}
