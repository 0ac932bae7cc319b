//! Configuration system for riskql.
//!
//! TOML-based configuration. LLM providers are declared as partial overrides
//! that are merged over per-provider defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dialect::DialectKind;
use crate::error::{Result, RiskqlError};
use crate::llm::Provider;
use crate::templates::SchemaBinding;

/// Environment variable consulted for a fine-tuned model id when the config
/// file does not name one.
pub const CUSTOM_MODEL_ENV: &str = "OPENAI_CUSTOM_MODEL";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RiskqlConfig {
    pub query: QueryConfig,
    pub schema_cache: SchemaCacheConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub generation: GenerationConfig,
    /// Identifiers the SQL templates are rendered against.
    pub binding: SchemaBinding,
    pub server: ServerConfig,
    pub validation: ValidationConfig,
}

/// Query execution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Query timeout in milliseconds (default: 30000).
    pub timeout_ms: u64,
    /// Maximum rows returned to the caller (default: 50).
    pub row_limit: usize,
}

/// Schema cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchemaCacheConfig {
    /// Cache TTL in seconds (default: 300).
    pub ttl_secs: u64,
    /// Maximum cached snapshots (default: 16).
    pub max_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Duckdb,
    Postgres,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: BackendKind,
    /// DuckDB database file.
    pub path: PathBuf,
    /// PostgreSQL connection string (URL or key-value form).
    pub url: Option<String>,
    /// PostgreSQL schema to introspect (default: public).
    pub schema: String,
    /// Maximum concurrent DuckDB executions (default: 16).
    pub max_concurrency: usize,
}

/// LLM provider settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    pub openai: ProviderOverrides,
    pub local: ProviderOverrides,
    /// Fine-tuned model id served by the OpenAI provider.
    pub custom_model: Option<String>,
}

/// Partial provider settings as written in the config file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderOverrides {
    pub enabled: Option<bool>,
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    /// Model preferred over `model` when the server reports it as installed.
    pub preferred_model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_ms: Option<u64>,
    /// Extra attempts after the first failed call (default: 0).
    pub retries: Option<u32>,
    /// Base URL of the server's native API, used for the availability probe.
    pub probe_url: Option<String>,
}

/// Fully resolved provider configuration (no Option fields besides genuinely
/// optional ones).
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub enabled: bool,
    pub base_url: String,
    pub api_key_env: Option<String>,
    pub model: String,
    pub preferred_model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_ms: u64,
    pub retries: u32,
    pub probe_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Dialect used to render template SQL.
    pub dialect: DialectKind,
    /// Columns per table included in LLM prompts (default: 10).
    pub prompt_columns: usize,
    /// Generator used when a request does not name one.
    pub default_generator: String,
    /// Optional YAML file holding a `SchemaBinding`; replaces `[binding]`.
    pub binding_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

/// Binding validation configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Continue when bound tables or columns are missing (default: false).
    pub warn_only: bool,
}

// Default implementations

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            row_limit: 50,
        }
    }
}

impl Default for SchemaCacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            max_size: 16,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Duckdb,
            path: PathBuf::from("riskql.duckdb"),
            url: None,
            schema: "public".to_string(),
            max_concurrency: 16,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            dialect: DialectKind::default(),
            prompt_columns: 10,
            default_generator: "auto".to_string(),
            binding_file: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
        }
    }
}

impl ProviderConfig {
    /// Built-in settings for a provider before file overrides are applied.
    pub fn defaults(provider: Provider) -> Self {
        match provider {
            Provider::OpenAi => Self {
                provider,
                enabled: true,
                base_url: "https://api.openai.com/v1".to_string(),
                api_key_env: Some("OPENAI_API_KEY".to_string()),
                model: "gpt-3.5-turbo".to_string(),
                preferred_model: None,
                temperature: 0.0,
                max_tokens: 200,
                timeout_ms: 30_000,
                retries: 0,
                probe_url: None,
            },
            Provider::Local => Self {
                provider,
                enabled: true,
                base_url: "http://localhost:11434/v1".to_string(),
                api_key_env: None,
                model: "llama2".to_string(),
                preferred_model: Some("llama2-sql".to_string()),
                temperature: 0.1,
                max_tokens: 500,
                timeout_ms: 60_000,
                retries: 0,
                probe_url: Some("http://localhost:11434".to_string()),
            },
        }
    }

    fn merge(provider: Provider, overrides: &ProviderOverrides) -> Self {
        let base = Self::defaults(provider);
        Self {
            provider,
            enabled: overrides.enabled.unwrap_or(base.enabled),
            base_url: overrides.base_url.clone().unwrap_or(base.base_url),
            api_key_env: overrides.api_key_env.clone().or(base.api_key_env),
            model: overrides.model.clone().unwrap_or(base.model),
            preferred_model: overrides.preferred_model.clone().or(base.preferred_model),
            temperature: overrides.temperature.unwrap_or(base.temperature),
            max_tokens: overrides.max_tokens.unwrap_or(base.max_tokens),
            timeout_ms: overrides.timeout_ms.unwrap_or(base.timeout_ms),
            retries: overrides.retries.unwrap_or(base.retries),
            probe_url: overrides.probe_url.clone().or(base.probe_url),
        }
    }

    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

impl RiskqlConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| RiskqlError::Config(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| RiskqlError::Config(format!("failed to parse config: {e}")))
    }

    /// Load from default locations (env var, cwd, user config dir, or defaults).
    ///
    /// Search order:
    /// 1. `RISKQL_CONFIG` environment variable
    /// 2. `./riskql.toml` (current directory)
    /// 3. `~/.config/riskql/config.toml` (user config dir)
    /// 4. Built-in defaults
    pub fn load_default() -> Self {
        if let Ok(path) = std::env::var("RISKQL_CONFIG") {
            match Self::from_file(&path) {
                Ok(cfg) => {
                    tracing::info!(path = %path, "loaded config from RISKQL_CONFIG");
                    return cfg;
                }
                Err(e) => tracing::warn!(path = %path, error = %e, "ignoring RISKQL_CONFIG"),
            }
        }

        if let Ok(cfg) = Self::from_file("riskql.toml") {
            tracing::info!("loaded config from ./riskql.toml");
            return cfg;
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("riskql").join("config.toml");
            if let Ok(cfg) = Self::from_file(&user_config) {
                tracing::info!(path = %user_config.display(), "loaded config from user config dir");
                return cfg;
            }
        }

        tracing::debug!("no config file found, using defaults");
        Self::default()
    }

    /// Resolved settings for one LLM provider.
    pub fn provider(&self, provider: Provider) -> ProviderConfig {
        let overrides = match provider {
            Provider::OpenAi => &self.llm.openai,
            Provider::Local => &self.llm.local,
        };
        ProviderConfig::merge(provider, overrides)
    }

    /// Fine-tuned model id from the config file, else from `OPENAI_CUSTOM_MODEL`.
    pub fn custom_model(&self) -> Option<String> {
        self.llm
            .custom_model
            .clone()
            .or_else(|| std::env::var(CUSTOM_MODEL_ENV).ok())
            .filter(|model| !model.trim().is_empty())
    }

    /// The binding in effect: `generation.binding_file` when set, else `[binding]`.
    pub fn resolve_binding(&self) -> Result<SchemaBinding> {
        match &self.generation.binding_file {
            Some(path) => SchemaBinding::from_yaml_file(path),
            None => Ok(self.binding.clone()),
        }
    }
}
