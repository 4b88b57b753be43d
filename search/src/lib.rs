//! ripgrep-backed search for trawl.
//!
//! - [`provision`]: find or install the `rg` binary.
//! - [`files`]: stream the file paths under a directory.
//! - [`search`] and [`line_search`]: content search, structured and line-oriented.
//! - [`tree`]: render a listing as a breadth-limited tree.
//!
//! [`Ripgrep`] ties these together behind one lazily provisioned binary.

mod process;

pub mod files;
pub mod line_search;
pub mod lines;
pub mod protocol;
pub mod provision;
pub mod search;
pub mod tree;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use files::{FileListing, FilesOptions};
pub use line_search::{LineSearchOptions, LineSearchOutcome, SearchMatch};
pub use protocol::{MatchData, ProtocolMessage};
pub use provision::{ProvisionConfig, Provisioner};
pub use search::SearchOptions;
pub use tree::{DEFAULT_TREE_LIMIT, FileTree, render_tree};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Unsupported platform: {key}")]
    UnsupportedPlatform { key: String },
    #[error("failed to download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to download {url}: HTTP {status}")]
    DownloadStatus { url: String, status: u16 },
    #[error("failed to extract ripgrep: {message}")]
    Extract { message: String },
    #[error("No such file or directory: '{}'", path.display())]
    NoSuchDirectory { path: PathBuf },
    #[error("failed to spawn {}: {source}", binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("child process has no {pipe} pipe")]
    MissingPipe { pipe: &'static str },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("ripgrep failed: {stderr}")]
    Failed { code: Option<i32>, stderr: String },
    #[error("malformed ripgrep output on line {line}: {source}")]
    Protocol {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// A provisioned ripgrep and the operations built on it.
///
/// The binary is resolved on first use; every later call reuses the same path.
#[derive(Debug)]
pub struct Ripgrep {
    provisioner: Provisioner,
}

impl Ripgrep {
    #[must_use]
    pub fn new(provisioner: Provisioner) -> Self {
        Self { provisioner }
    }

    pub async fn binary(&self) -> Result<&Path, SearchError> {
        self.provisioner.resolve().await
    }

    pub async fn files(&self, options: &FilesOptions) -> Result<FileListing, SearchError> {
        FileListing::start(self.binary().await?, options).await
    }

    /// Render the files under `cwd` as a tree of at most `limit` nodes.
    pub async fn tree(&self, cwd: &Path, limit: usize) -> Result<String, SearchError> {
        let paths = self.files(&FilesOptions::new(cwd)).await?.collect().await?;
        Ok(render_tree(&paths, limit))
    }

    pub async fn search(&self, options: &SearchOptions) -> Result<Vec<MatchData>, SearchError> {
        search::search(self.binary().await?, options).await
    }

    pub async fn line_search(
        &self,
        options: &LineSearchOptions,
    ) -> Result<LineSearchOutcome, SearchError> {
        line_search::line_search(self.binary().await?, options).await
    }
}
