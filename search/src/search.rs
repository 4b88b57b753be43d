//! Structured content search (`rg --json`).

use std::path::{Path, PathBuf};

use crate::SearchError;
use crate::files::{EXCLUDE_GIT_GLOB, NO_CONFIG};
use crate::process;
use crate::protocol::{MatchData, ProtocolMessage};

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub cwd: PathBuf,
    pub pattern: String,
    pub globs: Vec<String>,
    /// Per-file match cap (`--max-count`). Zero means uncapped.
    pub limit: Option<usize>,
}

impl SearchOptions {
    pub fn new(cwd: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            cwd: cwd.into(),
            pattern: pattern.into(),
            globs: Vec::new(),
            limit: None,
        }
    }

    pub fn glob(mut self, glob: impl Into<String>) -> Self {
        self.globs.push(glob.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn args(&self) -> Vec<String> {
        let mut args = vec![
            NO_CONFIG.to_string(),
            "--json".to_string(),
            "--hidden".to_string(),
            EXCLUDE_GIT_GLOB.to_string(),
        ];
        args.extend(self.globs.iter().map(|glob| format!("--glob={glob}")));
        if let Some(limit) = self.limit.filter(|limit| *limit > 0) {
            args.push(format!("--max-count={limit}"));
        }
        args.push("--".to_string());
        args.push(self.pattern.clone());
        args
    }
}

/// Run a search and return the match payloads in output order.
///
/// Exit code 1, or any failure that produced no output, means no matches. Any other
/// failure carries ripgrep's stderr.
pub async fn search(binary: &Path, options: &SearchOptions) -> Result<Vec<MatchData>, SearchError> {
    let finished = process::run_to_end(binary, &options.args(), &options.cwd).await?;

    if !finished.status.success() {
        let code = finished.status.code();
        if code == Some(1) || finished.lines.is_empty() {
            return Ok(Vec::new());
        }
        return Err(SearchError::Failed {
            code,
            stderr: finished.stderr.trim().to_string(),
        });
    }

    decode_matches(&finished.lines)
}

pub(crate) fn decode_matches(lines: &[String]) -> Result<Vec<MatchData>, SearchError> {
    let mut matches = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        let message = ProtocolMessage::parse(line).map_err(|source| SearchError::Protocol {
            line: index + 1,
            source,
        })?;
        matches.extend(message.into_match());
    }
    Ok(matches)
}
