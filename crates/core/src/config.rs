use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub vector: VectorConfig,
    pub catalog: CatalogConfig,
    pub ranking: RankingConfig,
    pub agent: AgentConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
}

#[derive(Clone, Debug)]
pub struct VectorConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub namespace: String,
    pub top_k: usize,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub apriori_path: PathBuf,
    pub popularity_path: PathBuf,
}

/// Ranking policy knobs. These are configuration, not structural
/// requirements: the defaults cap duplicate categories and keep the
/// suggestion list short.
#[derive(Clone, Copy, Debug)]
pub struct RankingConfig {
    pub top_k: usize,
    pub category_cap: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct AgentConfig {
    /// How many trailing dialog messages each classification prompt sees.
    pub context_window: usize,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub llm_base_url: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub apriori_path: Option<PathBuf>,
    pub popularity_path: Option<PathBuf>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                base_url: "http://localhost:11434/v1".to_string(),
                api_key: None,
                model: "llama3.1".to_string(),
                timeout_secs: 30,
            },
            embedding: EmbeddingConfig {
                base_url: "http://localhost:11434/v1".to_string(),
                api_key: None,
                model: "llama3.1".to_string(),
            },
            vector: VectorConfig {
                base_url: String::new(),
                api_key: None,
                namespace: "ns1".to_string(),
                top_k: 2,
            },
            catalog: CatalogConfig {
                apriori_path: PathBuf::from("catalog/apriori_rules.json"),
                popularity_path: PathBuf::from("catalog/popularity.csv"),
            },
            ranking: RankingConfig { top_k: 5, category_cap: 2 },
            agent: AgentConfig { context_window: 3 },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("brewline.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(embedding) = patch.embedding {
            if let Some(base_url) = embedding.base_url {
                self.embedding.base_url = base_url;
            }
            if let Some(api_key) = embedding.api_key {
                self.embedding.api_key = Some(secret_value(api_key));
            }
            if let Some(model) = embedding.model {
                self.embedding.model = model;
            }
        }

        if let Some(vector) = patch.vector {
            if let Some(base_url) = vector.base_url {
                self.vector.base_url = base_url;
            }
            if let Some(api_key) = vector.api_key {
                self.vector.api_key = Some(secret_value(api_key));
            }
            if let Some(namespace) = vector.namespace {
                self.vector.namespace = namespace;
            }
            if let Some(top_k) = vector.top_k {
                self.vector.top_k = top_k;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(apriori_path) = catalog.apriori_path {
                self.catalog.apriori_path = apriori_path;
            }
            if let Some(popularity_path) = catalog.popularity_path {
                self.catalog.popularity_path = popularity_path;
            }
        }

        if let Some(ranking) = patch.ranking {
            if let Some(top_k) = ranking.top_k {
                self.ranking.top_k = top_k;
            }
            if let Some(category_cap) = ranking.category_cap {
                self.ranking.category_cap = category_cap;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(context_window) = agent.context_window {
                self.agent.context_window = context_window;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("BREWLINE_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("BREWLINE_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("BREWLINE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("BREWLINE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("BREWLINE_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("BREWLINE_EMBEDDING_BASE_URL") {
            self.embedding.base_url = value;
        }
        if let Some(value) = read_env("BREWLINE_EMBEDDING_API_KEY") {
            self.embedding.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("BREWLINE_EMBEDDING_MODEL") {
            self.embedding.model = value;
        }

        if let Some(value) = read_env("BREWLINE_VECTOR_BASE_URL") {
            self.vector.base_url = value;
        }
        if let Some(value) = read_env("BREWLINE_VECTOR_API_KEY") {
            self.vector.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("BREWLINE_VECTOR_NAMESPACE") {
            self.vector.namespace = value;
        }
        if let Some(value) = read_env("BREWLINE_VECTOR_TOP_K") {
            self.vector.top_k = parse_usize("BREWLINE_VECTOR_TOP_K", &value)?;
        }

        if let Some(value) = read_env("BREWLINE_CATALOG_APRIORI_PATH") {
            self.catalog.apriori_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("BREWLINE_CATALOG_POPULARITY_PATH") {
            self.catalog.popularity_path = PathBuf::from(value);
        }

        if let Some(value) = read_env("BREWLINE_RANKING_TOP_K") {
            self.ranking.top_k = parse_usize("BREWLINE_RANKING_TOP_K", &value)?;
        }
        if let Some(value) = read_env("BREWLINE_RANKING_CATEGORY_CAP") {
            self.ranking.category_cap = parse_usize("BREWLINE_RANKING_CATEGORY_CAP", &value)?;
        }
        if let Some(value) = read_env("BREWLINE_AGENT_CONTEXT_WINDOW") {
            self.agent.context_window = parse_usize("BREWLINE_AGENT_CONTEXT_WINDOW", &value)?;
        }

        if let Some(value) = read_env("BREWLINE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("BREWLINE_SERVER_PORT") {
            self.server.port = parse_u16("BREWLINE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("BREWLINE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("BREWLINE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("BREWLINE_LOGGING_LEVEL").or_else(|| read_env("BREWLINE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("BREWLINE_LOGGING_FORMAT").or_else(|| read_env("BREWLINE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = llm_base_url;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(apriori_path) = overrides.apriori_path {
            self.catalog.apriori_path = apriori_path;
        }
        if let Some(popularity_path) = overrides.popularity_path {
            self.catalog.popularity_path = popularity_path;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_http_url("llm.base_url", &self.llm.base_url)?;
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
        }
        if self.llm.timeout_secs == 0 || self.llm.timeout_secs > 300 {
            return Err(ConfigError::Validation(
                "llm.timeout_secs must be in range 1..=300".to_string(),
            ));
        }

        validate_http_url("embedding.base_url", &self.embedding.base_url)?;
        if self.embedding.model.trim().is_empty() {
            return Err(ConfigError::Validation("embedding.model must not be empty".to_string()));
        }

        // The vector index is optional: a blank base_url means the Q&A
        // responder runs without grounding.
        if !self.vector.base_url.is_empty() {
            validate_http_url("vector.base_url", &self.vector.base_url)?;
            if self.vector.top_k == 0 {
                return Err(ConfigError::Validation(
                    "vector.top_k must be greater than zero".to_string(),
                ));
            }
        }

        if self.ranking.top_k == 0 {
            return Err(ConfigError::Validation(
                "ranking.top_k must be greater than zero".to_string(),
            ));
        }
        if self.ranking.category_cap == 0 {
            return Err(ConfigError::Validation(
                "ranking.category_cap must be greater than zero".to_string(),
            ));
        }
        if self.agent.context_window == 0 {
            return Err(ConfigError::Validation(
                "agent.context_window must be greater than zero".to_string(),
            ));
        }

        if self.server.bind_address.trim().is_empty() {
            return Err(ConfigError::Validation(
                "server.bind_address must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Redacted view for operator tooling; secrets never leave the process.
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "llm": {
                "base_url": self.llm.base_url,
                "api_key": self.llm.api_key.as_ref().map(|_| "***"),
                "model": self.llm.model,
                "timeout_secs": self.llm.timeout_secs,
            },
            "embedding": {
                "base_url": self.embedding.base_url,
                "api_key": self.embedding.api_key.as_ref().map(|_| "***"),
                "model": self.embedding.model,
            },
            "vector": {
                "base_url": self.vector.base_url,
                "api_key": self.vector.api_key.as_ref().map(|_| "***"),
                "namespace": self.vector.namespace,
                "top_k": self.vector.top_k,
            },
            "catalog": {
                "apriori_path": self.catalog.apriori_path.display().to_string(),
                "popularity_path": self.catalog.popularity_path.display().to_string(),
            },
            "ranking": { "top_k": self.ranking.top_k, "category_cap": self.ranking.category_cap },
            "agent": { "context_window": self.agent.context_window },
            "server": {
                "bind_address": self.server.bind_address,
                "port": self.server.port,
                "graceful_shutdown_secs": self.server.graceful_shutdown_secs,
            },
            "logging": { "level": self.logging.level, "format": self.logging.format },
        })
    }
}

impl LlmConfig {
    pub fn api_key_value(&self) -> Option<String> {
        self.api_key.as_ref().map(|key| key.expose_secret().to_string())
    }
}

impl EmbeddingConfig {
    pub fn api_key_value(&self) -> Option<String> {
        self.api_key.as_ref().map(|key| key.expose_secret().to_string())
    }
}

impl VectorConfig {
    pub fn api_key_value(&self) -> Option<String> {
        self.api_key.as_ref().map(|key| key.expose_secret().to_string())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("brewline.toml"), PathBuf::from("config/brewline.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{key} must be an http(s) URL, got `{value}`")))
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    embedding: Option<EmbeddingPatch>,
    vector: Option<VectorPatch>,
    catalog: Option<CatalogPatch>,
    ranking: Option<RankingPatch>,
    agent: Option<AgentPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Deserialize)]
struct LlmPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VectorPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    namespace: Option<String>,
    top_k: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct CatalogPatch {
    apriori_path: Option<PathBuf>,
    popularity_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RankingPatch {
    top_k: Option<usize>,
    category_cap: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct AgentPatch {
    context_window: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
