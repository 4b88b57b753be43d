//! Core engine for trawl: configuration and the tool-augmented conversation loop.
//!
//! [`build_agent`] assembles the pieces named by a [`TrawlConfig`]: the ripgrep
//! provisioner, the built-in tool registry and the Claude client. [`Agent::run`]
//! then drives a session over any line-oriented input.

mod agent;
mod config;
pub mod transcript;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use trawl_providers::{ClaudeClient, ClaudeConfig, InferenceError};
use trawl_search::{Provisioner, Ripgrep};
use trawl_tools::{ToolCtx, ToolError, ToolRegistry, detect_shell, register_builtins};

pub use agent::{Agent, SessionEnd, SessionReport};
pub use config::{
    ANTHROPIC_API_KEY_ENV, AnthropicConfig, ApiKeys, AppConfig, ConfigError, SearchConfig,
    ToolsConfig, TrawlConfig, config_path, expand_env_vars,
};
pub use transcript::{ConsoleTranscript, RecordingTranscript, Transcript, TranscriptEvent};
pub use trawl_providers;
pub use trawl_tools;
pub use trawl_types;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("no Anthropic API key: set [api_keys].anthropic or {ANTHROPIC_API_KEY_ENV}")]
    MissingApiKey,
    #[error(transparent)]
    Tools(#[from] ToolError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// Per-run overrides taken from the command line.
#[derive(Debug, Default, Clone)]
pub struct RunOptions {
    pub model: Option<String>,
    /// Relative tool paths resolve here. Defaults to the process working directory.
    pub working_dir: Option<PathBuf>,
}

/// The six built-in tools, in their declared order.
pub fn builtin_registry(config: &TrawlConfig) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::default();
    register_builtins(&mut registry, detect_shell(config.shell()))?;
    Ok(registry)
}

pub fn build_agent(
    config: &TrawlConfig,
    options: RunOptions,
) -> Result<Agent<ClaudeClient>, StartupError> {
    let api_key = config
        .anthropic_api_key()
        .ok_or(StartupError::MissingApiKey)?;
    let model = options
        .model
        .unwrap_or_else(|| config.model().to_string());

    let claude = ClaudeClient::new(
        ClaudeConfig::new(api_key)
            .with_model(model)
            .with_max_tokens(config.max_tokens())
            .with_base_url(config.anthropic_base_url()),
    )?;

    let ripgrep = Arc::new(Ripgrep::new(Provisioner::new(config.provision_config())));
    let working_dir = options
        .working_dir
        .unwrap_or_else(|| PathBuf::from("."));
    let ctx = ToolCtx::new(working_dir, ripgrep).with_tree_limit(config.tree_limit());

    tracing::info!(
        model = %claude.config().model,
        tree_limit = config.tree_limit(),
        "Agent configured"
    );
    Ok(Agent::new(claude, builtin_registry(config)?, ctx))
}
