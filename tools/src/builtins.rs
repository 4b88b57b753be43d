//! Built-in tool executors.

use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use trawl_utils::{AtomicWriteOptions, FileSyncPolicy, PersistMode, atomic_write_with_options};

use super::{DetectedShell, ToolCtx, ToolError, ToolExecutor, ToolFut, ToolRegistry, parse_args};
use crate::edit::apply_edit;
use crate::search::{GrepTool, ListFilesTool, TreeTool};

#[derive(Debug, Default)]
pub struct ReadFileTool;

#[derive(Debug, Clone)]
pub struct BashTool {
    shell: DetectedShell,
}

impl BashTool {
    #[must_use]
    pub fn new(shell: DetectedShell) -> Self {
        Self { shell }
    }
}

#[derive(Debug, Default)]
pub struct EditFileTool;

#[derive(Debug, Deserialize)]
struct ReadFileArgs {
    path: String,
}

#[derive(Debug, Deserialize)]
struct BashArgs {
    command: String,
}

#[derive(Debug, Deserialize)]
struct EditFileArgs {
    file_path: String,
    old_string: String,
    new_string: String,
    #[serde(default)]
    replace_all: bool,
}

impl ToolExecutor for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read the contents of a given relative file path. Use this when you want to see what's \
         inside a file. Do not use this with directory names."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Path to the file to read" }
            },
            "required": ["path"]
        })
    }

    fn execute<'a>(&'a self, args: serde_json::Value, ctx: &'a mut ToolCtx) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: ReadFileArgs = parse_args(&args)?;
            let resolved = ctx.resolve_path(&typed.path);
            tokio::fs::read_to_string(&resolved)
                .await
                .map_err(|e| ToolError::failed(self.name(), format!("{}: {e}", typed.path)))
        })
    }
}

impl ToolExecutor for BashTool {
    fn name(&self) -> &'static str {
        "bash"
    }

    fn description(&self) -> &'static str {
        "Execute a shell command in the working directory and return its output. A command \
         that exits with a non-zero status returns its exit code and combined output."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "Command to run" }
            },
            "required": ["command"]
        })
    }

    fn execute<'a>(&'a self, args: serde_json::Value, ctx: &'a mut ToolCtx) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: BashArgs = parse_args(&args)?;
            if typed.command.trim().is_empty() {
                return Err(ToolError::BadArgs {
                    message: "command must not be empty".to_string(),
                });
            }

            debug!(shell = %self.shell, command = %typed.command, "Running shell command");
            let output = self
                .shell
                .command(&typed.command)
                .current_dir(&ctx.working_dir)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|e| ToolError::failed(self.name(), e))?;

            let stdout = String::from_utf8_lossy(&output.stdout);
            if output.status.success() {
                return Ok(stdout.trim().to_string());
            }

            let stderr = String::from_utf8_lossy(&output.stderr);
            let headline = match output.status.code() {
                Some(code) => format!("Command failed with exit code {code}"),
                None => "Command was terminated by a signal".to_string(),
            };
            Ok(format!("{headline}\nOutput: {stdout}{stderr}")
                .trim()
                .to_string())
        })
    }
}

impl ToolExecutor for EditFileTool {
    fn name(&self) -> &'static str {
        "edit_file"
    }

    fn description(&self) -> &'static str {
        "Make edits to a text file. Replaces 'old_string' with 'new_string' in the given file. \
         'old_string' must match exactly and occur once unless 'replace_all' is true. If the \
         file does not exist and 'old_string' is empty, the file is created. An empty \
         'old_string' on an existing file appends 'new_string'."
    }

    fn schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": { "type": "string", "description": "Path to the file to edit" },
                "old_string": { "type": "string", "description": "Text to search for. Must match exactly and only once. Empty value to append." },
                "new_string": { "type": "string", "description": "Text to replace old_string with" },
                "replace_all": { "type": "boolean", "default": false, "description": "Replace every occurrence of old_string" }
            },
            "required": ["file_path", "old_string", "new_string"]
        })
    }

    fn execute<'a>(&'a self, args: serde_json::Value, ctx: &'a mut ToolCtx) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: EditFileArgs = parse_args(&args)?;
            if typed.file_path.is_empty() || typed.old_string == typed.new_string {
                return Err(ToolError::InvalidInput {
                    message: "file_path must be specified and strings must be different."
                        .to_string(),
                });
            }

            let resolved = ctx.resolve_path(&typed.file_path);
            let fail = |e: std::io::Error| {
                ToolError::failed(self.name(), format!("{}: {e}", typed.file_path))
            };

            let content = match tokio::fs::read_to_string(&resolved).await {
                Ok(content) => content,
                Err(err) if err.kind() == ErrorKind::NotFound && typed.old_string.is_empty() => {
                    if let Some(parent) = resolved.parent() {
                        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
                    }
                    persist(&resolved, &typed.new_string, PersistMode::Default).map_err(fail)?;
                    return Ok(format!("Successfully created file {}", typed.file_path));
                }
                Err(err) => return Err(fail(err)),
            };

            let updated = apply_edit(
                &content,
                &typed.old_string,
                &typed.new_string,
                typed.replace_all,
            )
            .map_err(|e| ToolError::EditFailed {
                file: resolved.clone(),
                message: e.to_string(),
            })?;

            persist(&resolved, &updated, PersistMode::preserving(&resolved)).map_err(fail)?;
            Ok("OK".to_string())
        })
    }
}

fn persist(path: &Path, content: &str, mode: PersistMode) -> std::io::Result<()> {
    atomic_write_with_options(
        path,
        content.as_bytes(),
        AtomicWriteOptions {
            file_sync: FileSyncPolicy::SyncAll,
            mode,
        },
    )
}

/// Register every built-in tool, in the order the model sees them.
pub fn register_builtins(registry: &mut ToolRegistry, shell: DetectedShell) -> Result<(), ToolError> {
    registry.register(Box::new(ListFilesTool))?;
    registry.register(Box::new(ReadFileTool))?;
    registry.register(Box::new(BashTool::new(shell)))?;
    registry.register(Box::new(EditFileTool))?;
    registry.register(Box::new(GrepTool))?;
    registry.register(Box::new(TreeTool))?;
    Ok(())
}
