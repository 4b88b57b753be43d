//! Shell detection for the `bash` tool.

use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::config::ShellConfig;

#[derive(Debug, Clone)]
pub struct DetectedShell {
    pub binary: PathBuf,
    /// Arguments placed before the command, e.g. `["-c"]`.
    pub args: Vec<String>,
    /// Short name for logging.
    pub name: String,
}

impl DetectedShell {
    /// A command that runs `script` through this shell.
    #[must_use]
    pub fn command(&self, script: &str) -> Command {
        let mut command = Command::new(&self.binary);
        command.args(&self.args).arg(script);
        command
    }
}

impl std::fmt::Display for DetectedShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// The configured shell if one is set, otherwise the platform default.
#[must_use]
pub fn detect_shell(config: Option<&ShellConfig>) -> DetectedShell {
    if let Some(cfg) = config
        && let Some(binary) = &cfg.binary
    {
        let args = cfg.args.clone().unwrap_or_else(|| default_args_for(binary));
        return DetectedShell {
            binary: PathBuf::from(binary),
            args,
            name: "configured".into(),
        };
    }

    platform_shell()
}

fn default_args_for(binary: &str) -> Vec<String> {
    let stem = Path::new(binary)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(binary)
        .to_ascii_lowercase();

    match stem.as_str() {
        "cmd" => vec!["/C".to_string()],
        "pwsh" | "powershell" => vec!["-NoProfile".to_string(), "-Command".to_string()],
        _ => vec!["-c".to_string()],
    }
}

#[cfg(windows)]
fn platform_shell() -> DetectedShell {
    let binary = std::env::var("ComSpec")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(r"C:\Windows\System32\cmd.exe"));
    DetectedShell {
        binary,
        args: vec!["/C".to_string()],
        name: "cmd".into(),
    }
}

#[cfg(not(windows))]
fn platform_shell() -> DetectedShell {
    let (binary, name) = match which::which("bash") {
        Ok(path) => (path, "bash"),
        Err(_) => (PathBuf::from("/bin/sh"), "sh"),
    };
    DetectedShell {
        binary,
        args: vec!["-c".to_string()],
        name: name.into(),
    }
}
