use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    pub project: ProjectConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Deserialize, Clone)]
pub struct ModelConfig {
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

// Manual Debug impl to avoid leaking the API key
impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Bounds on the engine's loops and external calls.
#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Model round-trips allowed inside one tool-calling loop.
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,
    /// Repair attempts after the first edit before the run is abandoned.
    #[serde(default = "default_max_edit_attempts")]
    pub max_edit_attempts: u32,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_max_file_lines")]
    pub max_file_lines: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_max_tool_iterations(),
            max_edit_attempts: default_max_edit_attempts(),
            call_timeout_secs: default_call_timeout_secs(),
            max_file_lines: default_max_file_lines(),
        }
    }
}

impl EngineConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProjectConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub build_commands: Vec<String>,
    #[serde(default)]
    pub test_commands: Vec<String>,
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

impl ProjectConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContextConfig {
    /// Retrieval service endpoint. Local keyword search is used when unset.
    pub endpoint: Option<String>,
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            max_search_results: default_max_search_results(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CheckpointConfig {
    /// Directory for per-thread checkpoint files. In-memory when unset.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    16384
}

fn default_api_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_max_tool_iterations() -> u32 {
    30
}

fn default_max_edit_attempts() -> u32 {
    3
}

fn default_call_timeout_secs() -> u64 {
    300
}

fn default_max_file_lines() -> usize {
    1000
}

fn default_command_timeout_secs() -> u64 {
    1800
}

fn default_max_search_results() -> usize {
    50
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("hypha").required(false));
        }

        // Environment variable overrides with HYPHA_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("HYPHA")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let config: AppConfig = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.engine.max_tool_iterations == 0 {
            return Err(AppError::Config(
                "engine.max_tool_iterations must be at least 1".to_string(),
            ));
        }
        if self.engine.call_timeout_secs == 0 {
            return Err(AppError::Config(
                "engine.call_timeout_secs must be at least 1".to_string(),
            ));
        }
        if !self.project.path.is_dir() {
            return Err(AppError::Config(format!(
                "project.path is not a directory: {}",
                self.project.path.display()
            )));
        }
        Ok(())
    }
}
