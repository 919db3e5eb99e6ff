//! Text-generation capability.
//!
//! The pipeline talks to language models through one narrow interface,
//! [`TextGenerator`]: a prompt goes in, text comes out. Structured output is
//! layered on top by [`generate_structured`]. Which provider answers is
//! decided by configuration when the [`GeneratorChain`] is built.

mod structured;

#[cfg(feature = "ai")]
mod claude;
#[cfg(feature = "ai")]
mod ollama;
#[cfg(feature = "ai")]
mod openai;

pub use structured::{extract_json, generate_structured, json_candidates, StructuredError};

#[cfg(feature = "ai")]
pub use claude::ClaudeProvider;
#[cfg(feature = "ai")]
pub use ollama::OllamaProvider;
#[cfg(feature = "ai")]
pub use openai::OpenAIProvider;

use std::time::Duration;

use async_trait::async_trait;

/// A single generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// System instructions
    pub system: String,

    /// User prompt
    pub prompt: String,

    /// JSON schema the response must satisfy, if structured output is wanted
    pub schema: Option<serde_json::Value>,

    /// Token budget override
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    /// Create a free-text request.
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self { system: system.into(), prompt: prompt.into(), schema: None, max_tokens: None }
    }

    /// Ask for JSON matching `schema`.
    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Override the token budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// System prompt with the schema instructions appended.
    pub fn system_prompt(&self) -> String {
        match &self.schema {
            Some(schema) => format!(
                "{}\n\nRespond with a single JSON value that matches this JSON schema. \
                 Output only the JSON, no commentary.\n{}",
                self.system, schema
            ),
            None => self.system.clone(),
        }
    }
}

/// Trait for text-generation providers.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Run one generation call.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;

    /// Get the provider name.
    fn name(&self) -> &str;
}

/// Generation error types.
///
/// Provider failures, timeouts and unreadable responses all belong to the
/// same failure category as far as the pipeline is concerned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("Provider not available: {0}")]
    ProviderNotAvailable(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("No response from provider")]
    NoResponse,
}

#[cfg(feature = "ai")]
impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(0)
        } else if e.is_decode() {
            Self::MalformedResponse(e.to_string())
        } else {
            Self::Api(e.to_string())
        }
    }
}

/// Provider chain with fallback support.
///
/// Tries providers in configuration order; each attempt is bounded by the
/// chain's timeout.
pub struct GeneratorChain {
    providers: Vec<Box<dyn TextGenerator>>,
    timeout: Duration,
}

impl GeneratorChain {
    /// Create an empty chain.
    pub fn new(timeout: Duration) -> Self {
        Self { providers: Vec::new(), timeout }
    }

    /// Append a provider.
    pub fn with_provider(mut self, provider: Box<dyn TextGenerator>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Build the chain described by configuration: primary provider first,
    /// then fallbacks. Providers without credentials are skipped.
    #[cfg(feature = "ai")]
    pub fn from_config(config: &crate::core::AiConfig) -> anyhow::Result<Self> {
        let mut chain = Self::new(Duration::from_secs(config.request_timeout_secs));
        let mut names: Vec<&str> = vec![config.provider.as_str()];
        for name in &config.fallback {
            if !names.contains(&name.as_str()) {
                names.push(name.as_str());
            }
        }

        for (i, name) in names.into_iter().enumerate() {
            let model = if i == 0 { config.model.clone() } else { None };
            match name {
                "claude" => match ClaudeProvider::new() {
                    Ok(p) => {
                        let p = p.with_max_tokens(config.max_tokens);
                        let p = match model {
                            Some(m) => p.with_model(m),
                            None => p,
                        };
                        chain = chain.with_provider(Box::new(p));
                    }
                    Err(e) => tracing::warn!(provider = name, error = %e, "Skipping provider"),
                },
                "openai" => match OpenAIProvider::new() {
                    Ok(p) => {
                        let p = p
                            .with_base_url(&config.openai.base_url)
                            .with_model(model.unwrap_or_else(|| config.openai.model.clone()))
                            .with_max_tokens(config.max_tokens);
                        chain = chain.with_provider(Box::new(p));
                    }
                    Err(e) => tracing::warn!(provider = name, error = %e, "Skipping provider"),
                },
                "ollama" => {
                    let p = OllamaProvider::new()
                        .with_base_url(&config.ollama.base_url)
                        .with_model(model.unwrap_or_else(|| config.ollama.model.clone()));
                    chain = chain.with_provider(Box::new(p));
                }
                other => tracing::warn!(provider = other, "Unknown provider in config"),
            }
        }

        if chain.is_empty() {
            anyhow::bail!(
                "No AI provider available.\n\
                 Set ANTHROPIC_API_KEY for Claude, OPENAI_API_KEY for OpenAI, or configure Ollama."
            );
        }

        Ok(chain)
    }

    /// Check if the chain has no providers.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Names of the providers in try order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Get the primary provider name.
    pub fn active_provider(&self) -> Option<&str> {
        self.providers.first().map(|p| p.name())
    }
}

#[async_trait]
impl TextGenerator for GeneratorChain {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let mut last_error = GenerationError::ProviderNotAvailable("no providers configured".into());

        for provider in &self.providers {
            let outcome = tokio::time::timeout(self.timeout, provider.generate(request)).await;
            let error = match outcome {
                Ok(Ok(text)) => return Ok(text),
                Ok(Err(GenerationError::Timeout(_))) | Err(_) => {
                    GenerationError::Timeout(self.timeout.as_secs())
                }
                Ok(Err(e)) => e,
            };
            tracing::warn!(provider = provider.name(), error = %error, "Provider failed, trying next");
            last_error = error;
        }

        Err(last_error)
    }

    fn name(&self) -> &str {
        self.active_provider().unwrap_or("none")
    }
}
