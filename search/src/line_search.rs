//! Plain-text line search ordered by file recency.
//!
//! Runs ripgrep with a custom field separator, stats every matched file, and keeps the
//! most recently modified matches first. This is what the `grep` tool renders.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use crate::SearchError;
use crate::files::NO_CONFIG;
use crate::process;

pub const MAX_LINE_SEARCH_MATCHES: usize = 100;
pub const MAX_LINE_LENGTH: usize = 2000;

const FIELD_SEPARATOR: char = '|';
const NO_MATCHES: &str = "No matches found.";
const TRUNCATION_NOTICE: &str =
    "(Results are truncated. Consider using a more specific path or pattern.)";

#[derive(Debug, Clone)]
pub struct LineSearchOptions {
    pub pattern: String,
    /// File or directory to search.
    pub path: PathBuf,
    /// Optional include glob, e.g. `*.{ts,tsx}`.
    pub include: Option<String>,
    pub limit: usize,
}

impl LineSearchOptions {
    pub fn new(pattern: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            pattern: pattern.into(),
            path: path.into(),
            include: None,
            limit: MAX_LINE_SEARCH_MATCHES,
        }
    }

    pub fn include(mut self, glob: impl Into<String>) -> Self {
        self.include = Some(glob.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub(crate) fn args(&self) -> Vec<String> {
        let mut args = vec![
            NO_CONFIG.to_string(),
            "-nH".to_string(),
            format!("--field-match-separator={FIELD_SEPARATOR}"),
            "--regexp".to_string(),
            self.pattern.clone(),
        ];
        if let Some(include) = &self.include {
            args.push("--glob".to_string());
            args.push(include.clone());
        }
        args.push(self.path.to_string_lossy().into_owned());
        args
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    pub path: String,
    pub line_number: u64,
    pub line_text: String,
    pub modified: SystemTime,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineSearchOutcome {
    /// Newest file first; ties broken by path then line number.
    pub matches: Vec<SearchMatch>,
    /// More matches existed than the limit allowed.
    pub truncated: bool,
}

impl LineSearchOutcome {
    /// Order `matches` by recency and apply `limit`.
    #[must_use]
    pub fn from_matches(mut matches: Vec<SearchMatch>, limit: usize) -> Self {
        matches.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| a.path.cmp(&b.path))
                .then_with(|| a.line_number.cmp(&b.line_number))
        });
        let truncated = matches.len() > limit;
        matches.truncate(limit);
        Self { matches, truncated }
    }

    #[must_use]
    pub fn render(&self) -> String {
        if self.matches.is_empty() {
            return NO_MATCHES.to_string();
        }

        let mut lines = vec![format!(
            "Found {} matches{}",
            self.matches.len(),
            if self.truncated { " (truncated)" } else { "" }
        )];

        let mut current: Option<&str> = None;
        for m in &self.matches {
            if current != Some(m.path.as_str()) {
                if current.is_some() {
                    lines.push(String::new());
                }
                current = Some(&m.path);
                lines.push(format!("{}:", m.path));
            }
            lines.push(format!(
                "  Line {}: {}",
                m.line_number,
                clip_line(&m.line_text)
            ));
        }

        if self.truncated {
            lines.push(String::new());
            lines.push(TRUNCATION_NOTICE.to_string());
        }

        lines.join("\n")
    }
}

fn clip_line(text: &str) -> String {
    match text.char_indices().nth(MAX_LINE_LENGTH) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Split one `path|line|text` record. The text may itself contain the separator.
pub(crate) fn parse_record(line: &str) -> Option<(&str, u64, &str)> {
    let mut fields = line.splitn(3, FIELD_SEPARATOR);
    let path = fields.next().filter(|path| !path.is_empty())?;
    let line_number = fields.next()?.parse().ok()?;
    let text = fields.next()?;
    Some((path, line_number, text))
}

pub async fn line_search(
    binary: &Path,
    options: &LineSearchOptions,
) -> Result<LineSearchOutcome, SearchError> {
    let finished = process::run_to_end(binary, &options.args(), Path::new(".")).await?;

    match finished.status.code() {
        Some(0) => {}
        Some(1) => return Ok(LineSearchOutcome::default()),
        code => {
            return Err(SearchError::Failed {
                code,
                stderr: finished.stderr.trim().to_string(),
            });
        }
    }

    let mut modified_at: HashMap<String, Option<SystemTime>> = HashMap::new();
    let mut matches = Vec::new();
    for line in &finished.lines {
        let Some((path, line_number, text)) = parse_record(line) else {
            debug!(line, "Skipping malformed search record");
            continue;
        };

        if !modified_at.contains_key(path) {
            let stamp = match tokio::fs::metadata(path).await {
                Ok(meta) => meta.modified().ok(),
                Err(err) => {
                    debug!(path, "Skipping match whose file could not be stat'd: {err}");
                    None
                }
            };
            modified_at.insert(path.to_string(), stamp);
        }
        let Some(modified) = modified_at.get(path).copied().flatten() else {
            continue;
        };

        matches.push(SearchMatch {
            path: path.to_string(),
            line_number,
            line_text: text.to_string(),
            modified,
        });
    }

    Ok(LineSearchOutcome::from_matches(matches, options.limit))
}
