//! Streaming recursive file listing (`rg --files`).

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use tokio::io::AsyncReadExt;
use tokio::process::ChildStdout;
use tracing::debug;

use crate::SearchError;
use crate::lines::LineDecoder;
use crate::process::{self, ChildGuard, READ_CHUNK};

/// Glob that keeps version-control metadata out of every listing and search.
pub(crate) const EXCLUDE_GIT_GLOB: &str = "--glob=!.git/*";

/// Ignore `RIPGREP_CONFIG_PATH`; output formats must not depend on user flags.
pub(crate) const NO_CONFIG: &str = "--no-config";

#[derive(Debug, Clone)]
pub struct FilesOptions {
    pub cwd: PathBuf,
    pub globs: Vec<String>,
    /// Include dotfiles. Defaults to true.
    pub hidden: bool,
    /// Follow symlinks. Defaults to true.
    pub follow: bool,
    pub max_depth: Option<usize>,
}

impl FilesOptions {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            globs: Vec::new(),
            hidden: true,
            follow: true,
            max_depth: None,
        }
    }

    pub fn glob(mut self, glob: impl Into<String>) -> Self {
        self.globs.push(glob.into());
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub(crate) fn args(&self) -> Vec<String> {
        let mut args = vec![
            NO_CONFIG.to_string(),
            "--files".to_string(),
            EXCLUDE_GIT_GLOB.to_string(),
        ];
        if self.follow {
            args.push("--follow".to_string());
        }
        if self.hidden {
            args.push("--hidden".to_string());
        }
        if let Some(depth) = self.max_depth {
            args.push(format!("--max-depth={depth}"));
        }
        args.extend(self.globs.iter().map(|glob| format!("--glob={glob}")));
        args
    }
}

/// Lazy sequence of root-relative paths produced by a running `rg --files`.
///
/// Exhausting the listing reaps the process. To stop early, call
/// [`FileListing::close`], which kills and awaits the process before returning.
/// Dropping an unfinished listing also kills the process, but reaping then happens in
/// a task on the current runtime after the drop.
#[derive(Debug)]
pub struct FileListing {
    guard: ChildGuard,
    stdout: ChildStdout,
    decoder: LineDecoder,
    ready: VecDeque<String>,
    chunk: Vec<u8>,
    finished: bool,
}

impl FileListing {
    /// Validate `options.cwd` and start listing it.
    ///
    /// A missing or non-directory root fails before anything is spawned.
    pub async fn start(binary: &Path, options: &FilesOptions) -> Result<Self, SearchError> {
        let is_dir = tokio::fs::metadata(&options.cwd)
            .await
            .is_ok_and(|meta| meta.is_dir());
        if !is_dir {
            return Err(SearchError::NoSuchDirectory {
                path: options.cwd.clone(),
            });
        }

        let mut guard = process::spawn(binary, &options.args(), &options.cwd, false)?;
        let stdout = guard.take_stdout()?;
        Ok(Self {
            guard,
            stdout,
            decoder: LineDecoder::new(),
            ready: VecDeque::new(),
            chunk: vec![0u8; READ_CHUNK],
            finished: false,
        })
    }

    /// Next path, or `None` once the listing is exhausted.
    pub async fn next_path(&mut self) -> Result<Option<String>, SearchError> {
        loop {
            if let Some(path) = self.ready.pop_front() {
                return Ok(Some(path));
            }
            if self.finished {
                return Ok(None);
            }

            let n = self.stdout.read(&mut self.chunk).await?;
            if n == 0 {
                self.ready.extend(self.decoder.finish());
                self.finished = true;
                let status = self.guard.wait().await?;
                debug!(code = ?status.code(), "File listing finished");
                continue;
            }
            let lines = self.decoder.push(&self.chunk[..n]);
            self.ready.extend(lines);
        }
    }

    /// OS id of the listing process while it is still unreaped.
    #[must_use]
    pub fn process_id(&self) -> Option<u32> {
        self.guard.id()
    }

    /// Drain the remaining paths.
    pub async fn collect(mut self) -> Result<Vec<String>, SearchError> {
        let mut paths = Vec::new();
        while let Some(path) = self.next_path().await? {
            paths.push(path);
        }
        Ok(paths)
    }

    /// Stop listing early and reap the process.
    pub async fn close(mut self) -> Result<(), SearchError> {
        if !self.finished {
            self.finished = true;
            self.guard.terminate().await?;
        }
        Ok(())
    }
}
