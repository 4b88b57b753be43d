//! Configuration types consumed by tool executors.

use serde::Deserialize;

/// Shell override for the `bash` tool.
///
/// ```toml
/// [tools.shell]
/// binary = "zsh"
/// args = ["-c"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShellConfig {
    pub binary: Option<String>,
    /// Arguments placed before the command. Inferred from the binary name when unset.
    pub args: Option<Vec<String>>,
}
