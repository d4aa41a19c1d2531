use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::http::HttpClientConfig;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an experienced LinkedIn content strategist. \
Write only the post itself, with no introduction or explanation. Do not use markdown; \
structure the text with short paragraphs and line breaks instead. \
End the post with 3 to 5 relevant hashtags.";

/// Main configuration structure for Post Pilot
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PostPilotConfig {
    /// Language model settings
    pub generation: GenerationConfig,
    /// Web search tool settings
    pub search: SearchConfig,
    /// LinkedIn publishing settings
    pub linkedin: LinkedInConfig,
    /// Review loop limits and prompt
    pub workflow: WorkflowConfig,
    /// Session storage settings
    pub persistence: PersistenceConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Base URL of an OpenAI-compatible API
    pub base_url: String,
    /// API key (falls back to GROQ_API_KEY, then OPENAI_API_KEY)
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub http: HttpClientConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key: None,
            model: "llama-3.1-8b-instant".to_string(),
            temperature: None,
            max_tokens: None,
            http: HttpClientConfig {
                max_retries: 2,
                ..HttpClientConfig::default()
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Offer the search tool to the model
    pub enabled: bool,
    pub base_url: String,
    /// API key (falls back to TAVILY_API_KEY)
    pub api_key: Option<String>,
    pub max_results: u32,
    /// How long results for a query are reused
    pub cache_ttl_seconds: u64,
    pub http: HttpClientConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.tavily.com".to_string(),
            api_key: None,
            max_results: 5,
            cache_ttl_seconds: 300,
            http: HttpClientConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LinkedInConfig {
    pub base_url: String,
    /// OAuth access token (falls back to LINKEDIN_ACCESS_TOKEN)
    pub access_token: Option<String>,
    /// Author URN, e.g. urn:li:person:abc (falls back to PROFILE_URN)
    pub author_urn: Option<String>,
    /// Value of the LinkedIn-Version header
    pub api_version: String,
    pub http: HttpClientConfig,
}

impl Default for LinkedInConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.linkedin.com".to_string(),
            access_token: None,
            author_urn: None,
            api_version: "202506".to_string(),
            http: HttpClientConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Instruction placed at the start of every conversation
    pub system_prompt: String,
    /// Revision requests allowed before a session is abandoned
    pub max_revisions: Option<u32>,
    /// Consecutive tool rounds allowed before a session is abandoned
    pub max_tool_rounds: Option<u32>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_revisions: Some(10),
            max_tool_rounds: Some(8),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Directory holding one JSON file per session
    pub state_directory: PathBuf,
    pub enable_integrity_checks: bool,
    /// Stage transitions kept per session record
    pub max_transition_history: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            state_directory: PathBuf::from(".post-pilot/sessions"),
            enable_integrity_checks: true,
            max_transition_history: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter when RUST_LOG is unset
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl PostPilotConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (post-pilot.toml, .post-pilot-rc)
    /// 3. Environment variables (prefixed with POST_PILOT_, `__` between sections)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if Path::new("post-pilot.toml").exists() {
            builder = builder.add_source(File::with_name("post-pilot"));
        }

        if Path::new(".post-pilot-rc").exists() {
            builder = builder.add_source(File::new(".post-pilot-rc", FileFormat::Toml));
        }

        builder = builder.add_source(Self::environment());

        let mut config: PostPilotConfig = builder.build()?.try_deserialize()?;
        config.apply_credential_fallbacks();
        Ok(config)
    }

    /// Load defaults, then the given TOML file, then the environment
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::from(path).format(FileFormat::Toml))
            .add_source(Self::environment())
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        let mut config: PostPilotConfig = config.try_deserialize()?;
        config.apply_credential_fallbacks();
        Ok(config)
    }

    fn environment() -> Environment {
        Environment::with_prefix("POST_PILOT")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    /// Fill unset credentials from the conventional provider variables
    fn apply_credential_fallbacks(&mut self) {
        if self.generation.api_key.is_none() {
            self.generation.api_key = std::env::var("GROQ_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .ok();
        }
        if self.search.api_key.is_none() {
            self.search.api_key = std::env::var("TAVILY_API_KEY").ok();
        }
        if self.linkedin.access_token.is_none() {
            self.linkedin.access_token = std::env::var("LINKEDIN_ACCESS_TOKEN").ok();
        }
        if self.linkedin.author_urn.is_none() {
            self.linkedin.author_urn = std::env::var("PROFILE_URN").ok();
        }
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}
