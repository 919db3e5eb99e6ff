//! Configuration management for Reportsmith.
//!
//! Handles loading and validating configuration from TOML files.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Name of the project-local config file.
pub const LOCAL_CONFIG_FILE: &str = ".reportsmith.toml";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Text-generation provider settings
    pub ai: AiConfig,

    /// Pipeline tuning
    pub pipeline: PipelineConfig,

    /// Output document settings
    pub output: OutputConfig,

    /// Checkpoint store settings
    pub store: StoreConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default log filter when neither `--verbose` nor `RUST_LOG` is given
    pub log_level: String,
}

/// Text-generation provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Primary provider (claude, openai, ollama)
    pub provider: String,

    /// Model override for the primary provider
    pub model: Option<String>,

    /// Providers tried in order when the primary one fails
    pub fallback: Vec<String>,

    /// Upper bound for a single generation call, in seconds
    pub request_timeout_secs: u64,

    /// Token budget per generation call
    pub max_tokens: u32,

    /// Ollama-specific settings
    pub ollama: OllamaConfig,

    /// OpenAI-compatible endpoint settings
    pub openai: OpenAiConfig,
}

/// Ollama configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Ollama server URL
    pub base_url: String,

    /// Model to use
    pub model: String,
}

/// OpenAI-compatible endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API base URL (override for Azure or compatible gateways)
    pub base_url: String,

    /// Model to use
    pub model: String,
}

/// Pipeline tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Analyst count used when the caller does not give one
    pub default_analysts: usize,

    /// Largest analyst count accepted by `start`
    pub max_analysts: usize,

    /// Question/answer turns per interview
    pub interview_turns: usize,

    /// Re-prompts allowed after a validation failure
    pub validation_retries: u32,

    /// Interviews (and section writes) running at the same time
    pub max_concurrent_interviews: usize,

    /// Soft word limit passed to the section writer
    pub section_max_words: usize,
}

/// Output document settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root directory for generated reports (`~` is expanded)
    pub dir: String,
}

/// Checkpoint store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// One JSON checkpoint per thread on disk
    File,
    /// Process-local map; checkpoints vanish on exit
    Memory,
}

/// Checkpoint store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend to use
    pub backend: StoreBackend,

    /// Checkpoint directory for the file backend (defaults to the data dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `.reportsmith.toml` in current directory
    /// 2. `~/.config/reportsmith/config.toml`
    /// 3. Falls back to defaults
    pub fn load() -> anyhow::Result<Self> {
        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(global_config) = Self::global_config_path() {
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {e}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let p = &self.pipeline;
        if p.default_analysts == 0 || p.default_analysts > p.max_analysts {
            anyhow::bail!(
                "pipeline.default_analysts must be between 1 and max_analysts ({})",
                p.max_analysts
            );
        }
        if p.interview_turns == 0 {
            anyhow::bail!("pipeline.interview_turns must be at least 1");
        }
        if p.max_concurrent_interviews == 0 {
            anyhow::bail!("pipeline.max_concurrent_interviews must be at least 1");
        }
        if self.ai.request_timeout_secs == 0 {
            anyhow::bail!("ai.request_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Get the global config file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("reportsmith"))
    }

    /// Get the data directory path (for checkpoints).
    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("reportsmith"))
    }

    /// Resolve the directory generated reports are written under.
    pub fn output_dir(&self) -> PathBuf {
        expand_path(&self.output.dir)
    }

    /// Resolve the checkpoint directory for the file backend.
    pub fn store_dir(&self) -> PathBuf {
        match &self.store.dir {
            Some(dir) => expand_path(dir),
            None => Self::data_dir()
                .map(|d| d.join("threads"))
                .unwrap_or_else(|| PathBuf::from(".reportsmith").join("threads")),
        }
    }
}

/// Expand `~` and environment variables in a configured path.
fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(raw),
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { log_level: "warn".to_string() }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "claude".to_string(),
            model: None,
            fallback: vec!["ollama".to_string()],
            request_timeout_secs: 120,
            max_tokens: 2048,
            ollama: OllamaConfig::default(),
            openai: OpenAiConfig::default(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self { base_url: "http://localhost:11434".to_string(), model: "llama3.2".to_string() }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self { base_url: "https://api.openai.com/v1".to_string(), model: "gpt-4o".to_string() }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_analysts: 3,
            max_analysts: 10,
            interview_turns: 2,
            validation_retries: 1,
            max_concurrent_interviews: 4,
            section_max_words: 400,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { dir: "reports".to_string() }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { backend: StoreBackend::File, dir: None }
    }
}
