use crate::core::compatibility::{default_rules, FieldRule};
use crate::models::RankingMode;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::Path;
use validator::{Validate, ValidationError};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct Settings {
    #[serde(default)]
    #[validate(nested)]
    pub llm: LlmSettings,
    #[serde(default)]
    #[validate(nested)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    #[validate(nested)]
    pub matching: MatchingSettings,
    #[serde(default)]
    #[validate(nested)]
    pub compatibility: CompatibilitySettings,
    #[serde(default)]
    #[validate(nested)]
    pub generation: GenerationSettings,
    #[serde(default)]
    #[validate(nested)]
    pub cache: CacheSettings,
    #[serde(default)]
    #[validate(nested)]
    pub session: SessionSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// OpenAI-compatible chat completion endpoint
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LlmSettings {
    #[serde(default = "default_api_base")]
    #[validate(url)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_llm_model")]
    #[validate(length(min = 1))]
    pub model: String,
    #[serde(default = "default_temperature")]
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f64,
    #[serde(default = "default_llm_timeout")]
    #[validate(range(min = 1, max = 600))]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    #[validate(range(min = 1, max = 10))]
    pub max_retries: u32,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: default_api_base(),
            api_key: String::new(),
            model: default_llm_model(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_api_base() -> String { "https://api.openai.com/v1".to_string() }
fn default_llm_model() -> String { "gpt-4o-mini".to_string() }
fn default_temperature() -> f64 { 0.3 }
fn default_llm_timeout() -> u64 { 60 }
fn default_max_retries() -> u32 { 3 }

/// OpenAI-compatible embedding endpoint
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EmbeddingSettings {
    #[serde(default = "default_api_base")]
    #[validate(url)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_embedding_model")]
    #[validate(length(min = 1))]
    pub model: String,
    #[serde(default = "default_dimension")]
    #[validate(range(min = 1))]
    pub dimension: usize,
    #[serde(default = "default_embedding_timeout")]
    #[validate(range(min = 1, max = 600))]
    pub timeout_secs: u64,
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1, max = 2048))]
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            base_url: default_api_base(),
            api_key: String::new(),
            model: default_embedding_model(),
            dimension: default_dimension(),
            timeout_secs: default_embedding_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_dimension() -> usize { 1536 }
fn default_embedding_timeout() -> u64 { 30 }
fn default_batch_size() -> usize { 100 }

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MatchingSettings {
    #[serde(default = "default_alpha")]
    #[validate(range(min = 0.0, max = 10.0))]
    pub alpha: f64,
    #[serde(default = "default_beta")]
    #[validate(range(min = 0.0, max = 10.0))]
    pub beta: f64,
    #[serde(default = "default_top_n")]
    #[validate(range(min = 1))]
    pub default_top_n: usize,
    #[serde(default)]
    pub mode: RankingMode,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            beta: default_beta(),
            default_top_n: default_top_n(),
            mode: RankingMode::default(),
        }
    }
}

fn default_alpha() -> f64 { 0.7 }
fn default_beta() -> f64 { 0.3 }
fn default_top_n() -> usize { 20 }

/// Per-field rules of the compatibility evaluator
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CompatibilitySettings {
    /// Configured fields replace the built-in rule of the same name; others keep their default
    #[serde(default = "default_rules", deserialize_with = "merge_with_default_rules")]
    #[validate(custom(function = "validate_rules"))]
    pub rules: BTreeMap<String, FieldRule>,
}

fn merge_with_default_rules<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, FieldRule>, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = BTreeMap::<String, FieldRule>::deserialize(deserializer)?;
    let mut rules = default_rules();
    rules.extend(overrides);
    Ok(rules)
}

fn validate_rules(rules: &BTreeMap<String, FieldRule>) -> Result<(), ValidationError> {
    if rules.values().all(|r| r.importance.is_finite() && r.importance >= 0.0) {
        Ok(())
    } else {
        Err(ValidationError::new("importance_must_be_non_negative"))
    }
}

impl Default for CompatibilitySettings {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerationSettings {
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1, max = 20))]
    pub max_attempts: u32,
    #[serde(default = "default_call_timeout")]
    #[validate(range(min = 1, max = 600))]
    pub call_timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

fn default_max_attempts() -> u32 { 5 }
fn default_call_timeout() -> u64 { 90 }

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CacheSettings {
    /// Shared L2 cache; explanations are cached in memory only when unset
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_cache_ttl")]
    #[validate(range(min = 1))]
    pub ttl_secs: u64,
    #[serde(default = "default_l1_size")]
    #[validate(range(min = 1))]
    pub l1_cache_size: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl_secs: default_cache_ttl(),
            l1_cache_size: default_l1_size(),
        }
    }
}

fn default_cache_ttl() -> u64 { 86_400 }
fn default_l1_size() -> u64 { 10_000 }

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SessionSettings {
    #[serde(default = "default_session_ttl")]
    #[validate(range(min = 1))]
    pub ttl_secs: u64,
    #[serde(default = "default_max_sessions")]
    #[validate(range(min = 1))]
    pub max_sessions: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl(),
            max_sessions: default_max_sessions(),
        }
    }
}

fn default_session_ttl() -> u64 { 3_600 }
fn default_max_sessions() -> u64 { 10_000 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration files (config/default.toml, config/local.toml)
    /// 3. Environment variables (prefixed with TALENT)
    /// 4. Well-known provider variables (OPENAI_API_KEY, REDIS_URL) for keys still unset
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        Self::finish(builder)
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let builder = Config::builder().add_source(File::from(path.as_ref()));
        Self::finish(builder)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        // e.g., TALENT__LLM__MODEL -> llm.model
        let settings = builder
            .add_source(
                Environment::with_prefix("TALENT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = substitute_env_vars(settings)?.try_deserialize()?;
        settings
            .validate()
            .map_err(|e| ConfigError::Message(format!("Invalid configuration: {}", e)))?;

        Ok(settings)
    }
}

/// Override provider credentials from their conventional variables
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(api_key) = env::var("OPENAI_API_KEY") {
        builder = builder
            .set_default("llm.api_key", api_key.clone())?
            .set_default("embedding.api_key", api_key)?;
    }
    if let Ok(redis_url) = env::var("REDIS_URL") {
        builder = builder.set_default("cache.redis_url", redis_url)?;
    }

    builder.build()
}
