//! Tool executor framework: the capability trait, the ordered registry, and the
//! built-in tools.

pub mod builtins;
pub mod config;
pub mod edit;
pub mod search;
pub mod shell;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use trawl_search::{DEFAULT_TREE_LIMIT, Ripgrep, SearchError};
use trawl_types::ToolDefinition;

pub use builtins::register_builtins;
pub use config::ShellConfig;
pub use shell::{DetectedShell, detect_shell};

/// Tool execution future type alias.
pub type ToolFut<'a> = Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + 'a>>;

/// Error types for tool execution.
///
/// The `Display` text is what the model sees in the error result.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Bad tool args: {message}")]
    BadArgs { message: String },
    #[error("{0} is required")]
    Required(&'static str),
    #[error("Invalid input parameters: {message}")]
    InvalidInput { message: String },
    #[error("{tool} failed: {message}")]
    ExecutionFailed { tool: String, message: String },
    #[error("{message}")]
    EditFailed { file: PathBuf, message: String },
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error("Tool not found: {name}")]
    UnknownTool { name: String },
    #[error("Duplicate tool registered: {name}")]
    DuplicateTool { name: String },
}

impl ToolError {
    pub(crate) fn failed(tool: &str, err: impl std::fmt::Display) -> Self {
        Self::ExecutionFailed {
            tool: tool.to_string(),
            message: err.to_string(),
        }
    }
}

/// Proof that a tool executor is safe for dynamic dispatch.
pub trait ToolExecutor: Send + Sync + std::panic::UnwindSafe {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn schema(&self) -> Value;
    fn execute<'a>(&'a self, args: Value, ctx: &'a mut ToolCtx) -> ToolFut<'a>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.schema())
    }
}

pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(args: &Value) -> Result<T, ToolError> {
    serde_json::from_value(args.clone()).map_err(|e| ToolError::BadArgs {
        message: e.to_string(),
    })
}

/// Tools in registration order. Lookup returns the first executor with a matching
/// name; names are unique, so that is the only one.
#[derive(Default)]
pub struct ToolRegistry {
    executors: Vec<Box<dyn ToolExecutor>>,
}

impl ToolRegistry {
    pub fn register(&mut self, executor: Box<dyn ToolExecutor>) -> Result<(), ToolError> {
        let name = executor.name();
        if self.executors.iter().any(|e| e.name() == name) {
            return Err(ToolError::DuplicateTool {
                name: name.to_string(),
            });
        }
        self.executors.push(executor);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&dyn ToolExecutor, ToolError> {
        self.executors
            .iter()
            .find(|e| e.name() == name)
            .map(AsRef::as_ref)
            .ok_or_else(|| ToolError::UnknownTool {
                name: name.to_string(),
            })
    }

    /// Declared capabilities, in registration order.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.executors.iter().map(|e| e.definition()).collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.executors.iter().map(|e| e.name())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.executors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Per-run tool context.
#[derive(Debug, Clone)]
pub struct ToolCtx {
    /// Relative tool paths resolve against this directory.
    pub working_dir: PathBuf,
    pub ripgrep: Arc<Ripgrep>,
    /// Default node budget for the `tree` tool.
    pub tree_limit: usize,
}

impl ToolCtx {
    pub fn new(working_dir: impl Into<PathBuf>, ripgrep: Arc<Ripgrep>) -> Self {
        Self {
            working_dir: working_dir.into(),
            ripgrep,
            tree_limit: DEFAULT_TREE_LIMIT,
        }
    }

    #[must_use]
    pub fn with_tree_limit(mut self, tree_limit: usize) -> Self {
        self.tree_limit = tree_limit;
        self
    }

    /// Resolve a tool-supplied path. Absolute paths are kept as given.
    #[must_use]
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }
}
