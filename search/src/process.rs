//! Subprocess plumbing shared by the enumerator and the executors.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;

use crate::SearchError;
use crate::lines::LineDecoder;

pub(crate) const READ_CHUNK: usize = 8 * 1024;
const MAX_STDERR: u64 = 64 * 1024;

/// RAII guard that kills a child process on drop.
///
/// Wrap a spawned child immediately after `spawn()` so that abandoning the owning
/// future or iterator cannot leave a running process behind. Call [`ChildGuard::wait`]
/// to reap the process normally; a reaped guard does nothing on drop. An unreaped
/// child is killed on drop and awaited on the current runtime.
#[derive(Debug)]
pub(crate) struct ChildGuard {
    child: Option<Child>,
}

impl ChildGuard {
    pub(crate) fn new(child: Child) -> Self {
        Self { child: Some(child) }
    }

    fn child_mut(&mut self) -> Result<&mut Child, SearchError> {
        self.child
            .as_mut()
            .ok_or_else(|| std::io::Error::other("search process already reaped").into())
    }

    pub(crate) fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    pub(crate) fn take_stdout(&mut self) -> Result<ChildStdout, SearchError> {
        self.child_mut()?
            .stdout
            .take()
            .ok_or(SearchError::MissingPipe { pipe: "stdout" })
    }

    pub(crate) fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.as_mut().and_then(|child| child.stderr.take())
    }

    pub(crate) async fn wait(&mut self) -> Result<ExitStatus, SearchError> {
        let status = self.child_mut()?.wait().await?;
        self.child = None;
        Ok(status)
    }

    /// Kill the process and reap it.
    pub(crate) async fn terminate(&mut self) -> Result<(), SearchError> {
        if let Some(child) = self.child.as_mut() {
            // Already exited is fine; wait() still reaps.
            let _ = child.start_kill();
            self.wait().await?;
        }
        Ok(())
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        let _ = child.start_kill();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = child.wait().await {
                        tracing::debug!("Failed to reap abandoned search process: {e}");
                    }
                });
            }
            Err(_) => {
                let _ = child.try_wait();
            }
        }
    }
}

/// Spawn `binary` with `args` in `cwd`, stdout piped.
pub(crate) fn spawn(
    binary: &Path,
    args: &[String],
    cwd: &Path,
    capture_stderr: bool,
) -> Result<ChildGuard, SearchError> {
    let mut cmd = Command::new(binary);
    cmd.args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(if capture_stderr {
            Stdio::piped()
        } else {
            Stdio::null()
        });

    tracing::debug!(binary = %binary.display(), ?args, cwd = %cwd.display(), "Spawning search process");
    let child = cmd.spawn().map_err(|source| SearchError::Spawn {
        binary: binary.to_path_buf(),
        source,
    })?;
    Ok(ChildGuard::new(child))
}

/// Collect stderr in the background, capped so a chatty process cannot exhaust memory.
pub(crate) fn collect_stderr(stderr: Option<ChildStderr>) -> JoinHandle<String> {
    tokio::spawn(async move {
        let Some(stderr) = stderr else {
            return String::new();
        };
        let mut buf = Vec::with_capacity(1024);
        let _ = stderr.take(MAX_STDERR).read_to_end(&mut buf).await;
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Drain a reader to completion, returning its non-empty lines.
pub(crate) async fn read_lines<R>(mut reader: R) -> Result<Vec<String>, SearchError>
where
    R: AsyncRead + Unpin,
{
    let mut decoder = LineDecoder::new();
    let mut lines = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        lines.extend(decoder.push(&chunk[..n]));
    }
    lines.extend(decoder.finish());
    Ok(lines)
}

/// Output of a process run to completion.
#[derive(Debug)]
pub(crate) struct Finished {
    pub(crate) status: ExitStatus,
    pub(crate) lines: Vec<String>,
    pub(crate) stderr: String,
}

/// Run `binary` to completion, collecting stdout lines and stderr text.
pub(crate) async fn run_to_end(
    binary: &Path,
    args: &[String],
    cwd: &Path,
) -> Result<Finished, SearchError> {
    let mut guard = spawn(binary, args, cwd, true)?;
    let stdout = guard.take_stdout()?;
    let stderr_task = collect_stderr(guard.take_stderr());

    let lines = read_lines(stdout).await?;
    let status = guard.wait().await?;
    let stderr = stderr_task
        .await
        .unwrap_or_else(|e| format!("[stderr task failed: {e}]"));

    tracing::debug!(code = ?status.code(), lines = lines.len(), "Search process exited");
    Ok(Finished {
        status,
        lines,
        stderr,
    })
}
