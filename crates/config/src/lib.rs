//! Configuration loading, validation, and management for slidesmith.
//!
//! Loads configuration from a TOML file with environment variable
//! overrides. Validates all settings at load time so misconfiguration
//! surfaces at startup rather than mid-turn.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the default provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Base URL of the default provider's OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Default model for orchestration turns
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Maximum tool-calling iterations per orchestrator turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Research gateway configuration
    #[serde(default)]
    pub research: ResearchConfig,

    /// Prompt refinement configuration
    #[serde(default)]
    pub refine: RefineConfig,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_max_iterations() -> u32 {
    25
}

/// Research gateway settings.
///
/// The enhanced backend only activates when `enhanced = true` **and** a
/// credential is present; otherwise the baseline model-call backend is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Opt in to the live search-augmented backend
    #[serde(default)]
    pub enhanced: bool,

    /// Credential for the enhanced backend (env `XAI_API_KEY` overrides)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Enhanced backend endpoint
    #[serde(default = "default_research_base_url")]
    pub base_url: String,

    /// Enhanced backend model
    #[serde(default = "default_research_model")]
    pub model: String,

    /// Ask for market statistics and projections
    #[serde(default = "default_true")]
    pub include_stats: bool,

    /// Ask for social trend search
    #[serde(default = "default_true")]
    pub include_social_search: bool,

    /// Ask for competitor landscape
    #[serde(default = "default_true")]
    pub include_competitors: bool,

    /// Ask for expert quotes and case studies
    #[serde(default = "default_true")]
    pub include_experts: bool,
}

fn default_research_base_url() -> String {
    "https://api.x.ai/v1".into()
}
fn default_research_model() -> String {
    "grok-4-1-fast-reasoning".into()
}
fn default_true() -> bool {
    true
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            enhanced: false,
            api_key: None,
            base_url: default_research_base_url(),
            model: default_research_model(),
            include_stats: true,
            include_social_search: true,
            include_competitors: true,
            include_experts: true,
        }
    }
}

/// Prompt refinement engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineConfig {
    /// Minimum validation score for a prompt to be accepted (0-100)
    #[serde(default = "default_acceptance_threshold")]
    pub acceptance_threshold: u8,

    /// Maximum validate/rewrite iterations per item
    #[serde(default = "default_refine_iterations")]
    pub max_iterations: u32,

    /// Refine items in parallel
    #[serde(default = "default_true")]
    pub parallel: bool,
}

fn default_acceptance_threshold() -> u8 {
    70
}
fn default_refine_iterations() -> u32 {
    3
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: default_acceptance_threshold(),
            max_iterations: default_refine_iterations(),
            parallel: true,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            base_url: default_base_url(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            max_iterations: default_max_iterations(),
            research: ResearchConfig::default(),
            refine: RefineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, then apply env overrides and
    /// validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let mut config: AppConfig = toml::from_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        debug!(
            provider = %config.default_provider,
            model = %config.default_model,
            enhanced_research = config.research.enhanced,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Defaults plus env overrides, for running without a config file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = AppConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment variables override file values.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("SLIDESMITH_API_KEY") {
            self.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("SLIDESMITH_MODEL") {
            self.default_model = model;
        }
        if let Ok(key) = std::env::var("XAI_API_KEY") {
            self.research.api_key = Some(key);
        }
    }

    /// Validate all settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::Invalid(format!(
                "default_temperature must be in [0.0, 2.0], got {}",
                self.default_temperature
            )));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "max_iterations must be at least 1".into(),
            ));
        }
        if self.refine.acceptance_threshold > 100 {
            return Err(ConfigError::Invalid(format!(
                "refine.acceptance_threshold must be in [0, 100], got {}",
                self.refine.acceptance_threshold
            )));
        }
        if self.refine.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "refine.max_iterations must be at least 1".into(),
            ));
        }
        if self.base_url.is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".into()));
        }
        Ok(())
    }

    /// Whether the enhanced research backend can be used: explicitly
    /// enabled and a credential present.
    pub fn enhanced_research_available(&self) -> bool {
        self.research.enhanced && self.research.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}
