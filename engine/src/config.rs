use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use trawl_providers::ANTHROPIC_BASE_URL;
use trawl_providers::claude::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use trawl_search::DEFAULT_TREE_LIMIT;
use trawl_search::provision::{DEFAULT_RELEASE_BASE_URL, DEFAULT_RIPGREP_VERSION};
use trawl_search::ProvisionConfig;
use trawl_tools::ShellConfig;

/// Environment variable consulted when no key is configured.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

#[derive(Debug, Default, Deserialize)]
pub struct TrawlConfig {
    pub app: Option<AppConfig>,
    pub api_keys: Option<ApiKeys>,
    pub anthropic: Option<AnthropicConfig>,
    pub search: Option<SearchConfig>,
    pub tools: Option<ToolsConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
}

#[derive(Default, Deserialize)]
pub struct ApiKeys {
    /// May reference the environment, e.g. `"${ANTHROPIC_API_KEY}"`.
    pub anthropic: Option<String>,
}

// Manual Debug impl to prevent leaking API keys in logs.
impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let anthropic = if self.anthropic.is_some() {
            "[REDACTED]"
        } else {
            "None"
        };
        f.debug_struct("ApiKeys")
            .field("anthropic", &anthropic)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AnthropicConfig {
    pub base_url: Option<String>,
}

/// ```toml
/// [search]
/// cache_dir = "~/.trawl/bin"
/// ripgrep_version = "14.1.0"
/// tree_limit = 50
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct SearchConfig {
    pub cache_dir: Option<PathBuf>,
    pub ripgrep_version: Option<String>,
    pub release_base_url: Option<String>,
    pub tree_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ToolsConfig {
    pub shell: Option<ShellConfig>,
}

/// Replace `${VAR}` references with the variable's value.
///
/// Unset variables expand to nothing; an unterminated `${` is kept literally.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

impl TrawlConfig {
    /// Load the default config file. A missing file is not an error.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::read(&path).map(Some)
    }

    /// Read and parse the config file at `path`.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            tracing::warn!("Failed to read config at {}: {source}", path.display());
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        toml::from_str(&content).map_err(|source| {
            tracing::warn!("Failed to parse config at {}: {source}", path.display());
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    #[must_use]
    pub fn model(&self) -> &str {
        self.app
            .as_ref()
            .and_then(|app| app.model.as_deref())
            .unwrap_or(DEFAULT_MODEL)
    }

    #[must_use]
    pub fn max_tokens(&self) -> u32 {
        self.app
            .as_ref()
            .and_then(|app| app.max_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS)
    }

    #[must_use]
    pub fn anthropic_base_url(&self) -> &str {
        self.anthropic
            .as_ref()
            .and_then(|cfg| cfg.base_url.as_deref())
            .unwrap_or(ANTHROPIC_BASE_URL)
    }

    /// The configured key after `${VAR}` expansion, else `ANTHROPIC_API_KEY`.
    #[must_use]
    pub fn anthropic_api_key(&self) -> Option<String> {
        self.api_keys
            .as_ref()
            .and_then(|keys| keys.anthropic.as_deref())
            .map(expand_env_vars)
            .filter(|key| !key.trim().is_empty())
            .or_else(|| {
                env::var(ANTHROPIC_API_KEY_ENV)
                    .ok()
                    .filter(|key| !key.trim().is_empty())
            })
    }

    #[must_use]
    pub fn provision_config(&self) -> ProvisionConfig {
        let search = self.search.as_ref();
        let mut config = ProvisionConfig::default();
        if let Some(dir) = search.and_then(|s| s.cache_dir.as_ref()) {
            config.cache_dir = expand_home(dir);
        }
        config.version = search
            .and_then(|s| s.ripgrep_version.clone())
            .unwrap_or_else(|| DEFAULT_RIPGREP_VERSION.to_string());
        config.release_base_url = search
            .and_then(|s| s.release_base_url.clone())
            .unwrap_or_else(|| DEFAULT_RELEASE_BASE_URL.to_string());
        config
    }

    #[must_use]
    pub fn tree_limit(&self) -> usize {
        self.search
            .as_ref()
            .and_then(|s| s.tree_limit)
            .unwrap_or(DEFAULT_TREE_LIMIT)
    }

    #[must_use]
    pub fn shell(&self) -> Option<&ShellConfig> {
        self.tools.as_ref().and_then(|tools| tools.shell.as_ref())
    }
}

/// `~/x` becomes `<home>/x`; other paths are unchanged.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".trawl").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::{ApiKeys, ConfigError, TrawlConfig, expand_env_vars, expand_home};

    #[test]
    fn expand_env_vars_no_vars() {
        assert_eq!(expand_env_vars("hello world"), "hello world");
    }

    #[test]
    fn expand_env_vars_single_var() {
        unsafe {
            std::env::set_var("TRAWL_TEST_CONFIG_VAR", "replaced");
        }
        let result = expand_env_vars("prefix ${TRAWL_TEST_CONFIG_VAR} suffix");
        assert_eq!(result, "prefix replaced suffix");
        unsafe {
            std::env::remove_var("TRAWL_TEST_CONFIG_VAR");
        }
    }

    #[test]
    fn expand_env_vars_missing_var_becomes_empty() {
        unsafe {
            std::env::remove_var("TRAWL_MISSING_VAR_FOR_TEST");
        }
        let result = expand_env_vars("before ${TRAWL_MISSING_VAR_FOR_TEST} after");
        assert_eq!(result, "before  after");
    }

    #[test]
    fn expand_env_vars_adjacent_vars() {
        unsafe {
            std::env::set_var("TRAWL_ADJ_A", "X");
            std::env::set_var("TRAWL_ADJ_B", "Y");
        }
        assert_eq!(expand_env_vars("${TRAWL_ADJ_A}${TRAWL_ADJ_B}"), "XY");
        unsafe {
            std::env::remove_var("TRAWL_ADJ_A");
            std::env::remove_var("TRAWL_ADJ_B");
        }
    }

    #[test]
    fn expand_env_vars_unclosed_brace_preserved() {
        assert_eq!(expand_env_vars("test ${UNCLOSED"), "test ${UNCLOSED");
    }

    #[test]
    fn expand_env_vars_empty_var_name_dropped() {
        assert_eq!(expand_env_vars("test ${} more"), "test  more");
    }

    #[test]
    fn expand_env_vars_keeps_multibyte_text() {
        assert_eq!(expand_env_vars("héllo ${} wörld"), "héllo  wörld");
    }

    #[test]
    fn parse_empty_config_uses_defaults() {
        let config: TrawlConfig = toml::from_str("").unwrap();
        assert!(config.app.is_none());
        assert_eq!(config.model(), "claude-3-5-haiku-latest");
        assert_eq!(config.max_tokens(), 1024);
        assert_eq!(config.anthropic_base_url(), "https://api.anthropic.com");
        assert_eq!(config.tree_limit(), 50);
        assert!(config.shell().is_none());

        let provision = config.provision_config();
        assert_eq!(provision.version, "14.1.0");
        assert!(provision.cache_dir.ends_with(".trawl/bin"));
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
[app]
model = "claude-sonnet-4-5"
max_tokens = 4096

[api_keys]
anthropic = "sk-ant-test"

[anthropic]
base_url = "http://localhost:8080"

[search]
cache_dir = "/opt/trawl/bin"
ripgrep_version = "14.0.3"
release_base_url = "https://mirror.example/rg"
tree_limit = 120

[tools.shell]
binary = "zsh"
"#;
        let config: TrawlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.model(), "claude-sonnet-4-5");
        assert_eq!(config.max_tokens(), 4096);
        assert_eq!(config.anthropic_api_key().as_deref(), Some("sk-ant-test"));
        assert_eq!(config.anthropic_base_url(), "http://localhost:8080");
        assert_eq!(config.tree_limit(), 120);

        let provision = config.provision_config();
        assert_eq!(provision.cache_dir, PathBuf::from("/opt/trawl/bin"));
        assert_eq!(provision.version, "14.0.3");
        assert_eq!(provision.release_base_url, "https://mirror.example/rg");

        let shell = config.shell().unwrap();
        assert_eq!(shell.binary.as_deref(), Some("zsh"));
        assert!(shell.args.is_none());
    }

    #[test]
    fn api_key_expands_environment_reference() {
        unsafe {
            std::env::set_var("TRAWL_TEST_KEY", "sk-from-env");
        }
        let config: TrawlConfig =
            toml::from_str("[api_keys]\nanthropic = \"${TRAWL_TEST_KEY}\"").unwrap();
        assert_eq!(config.anthropic_api_key().as_deref(), Some("sk-from-env"));
        unsafe {
            std::env::remove_var("TRAWL_TEST_KEY");
        }
    }

    #[test]
    fn api_keys_debug_redacts_values() {
        let keys = ApiKeys {
            anthropic: Some("sk-ant-secret123".to_string()),
        };
        let debug_output = format!("{keys:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk-ant-secret123"));
    }

    #[test]
    fn api_keys_debug_shows_none() {
        let debug_output = format!("{:?}", ApiKeys::default());
        assert!(debug_output.contains("None"));
        assert!(!debug_output.contains("[REDACTED]"));
    }

    #[test]
    fn read_reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[app\nmodel = 1").unwrap();

        let err = TrawlConfig::read(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(err.path(), path.as_path());
    }

    #[test]
    fn read_missing_file_is_read_error() {
        let err = TrawlConfig::read(Path::new("/definitely/not/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn expand_home_only_touches_tilde_prefix() {
        assert_eq!(expand_home(Path::new("/abs/bin")), PathBuf::from("/abs/bin"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/bin")), home.join("bin"));
        }
    }
}
