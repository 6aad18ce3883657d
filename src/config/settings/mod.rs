#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use url::Url;

pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_THRESHOLD: f32 = 0.7;
pub const DEFAULT_HASHING_DIMENSION: u32 = 384;

/// Application configuration, constructed once at startup and passed by
/// reference to the loader, embedding provider factory, engine and fallback.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseConfig,
    #[serde(default)]
    pub external_search: ExternalSearchConfig,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Ollama,
    Hashing,
}

impl fmt::Display for ProviderKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ollama => f.write_str("ollama"),
            Self::Hashing => f.write_str("hashing"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "hashing" => Ok(Self::Hashing),
            _ => Err(ConfigError::InvalidProvider(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub batch_size: u32,
    /// Output dimensionality of the hashing provider. Ollama models report
    /// their own dimension.
    pub dimension: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            model: "all-minilm:latest".to_string(),
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            batch_size: 16,
            dimension: DEFAULT_HASHING_DIMENSION,
        }
    }
}

/// Retrieval defaults. The threshold is an absolute squared-L2 distance cutoff
/// in the embedding space of the configured provider, so it has to be re-tuned
/// whenever the provider or model changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KnowledgeBaseConfig {
    pub path: PathBuf,
    pub title_column: String,
    pub description_column: String,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("kb_data/sap_kb.xlsx"),
            title_column: "Note Title".to_string(),
            description_column: "Description".to_string(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExternalSearchConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub endpoint: String,
    pub engine: String,
    pub num_results: u32,
    pub timeout_seconds: u64,
}

impl Default for ExternalSearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://serpapi.com/search".to_string(),
            engine: "google".to_string(),
            num_results: 3,
            timeout_seconds: 10,
        }
    }
}

// Keeps the key out of debug logs.
impl fmt::Debug for ExternalSearchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalSearchConfig")
            .field("api_key", &self.masked_api_key())
            .field("endpoint", &self.endpoint)
            .field("engine", &self.engine)
            .field("num_results", &self.num_results)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub title: String,
    pub description: String,
    pub query_timeout_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "SAP Intelligent Support Assistant".to_string(),
            description: "Knowledge base retrieval with external search fallback.".to_string(),
            query_timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding provider: {0} (must be 'ollama' or 'hashing')")]
    InvalidProvider(String),
    #[error("Invalid embedding dimension: {0} (must be between 8 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid top_k: {0} (must be between 1 and 100)")]
    InvalidTopK(usize),
    #[error("Invalid threshold: {0} (must be a positive finite number)")]
    InvalidThreshold(f32),
    #[error("Invalid column name for {0} (cannot be empty)")]
    InvalidColumn(&'static str),
    #[error("Invalid external result count: {0} (must be between 1 and 100)")]
    InvalidNumResults(u32),
    #[error("Invalid timeout: {0} (must be between 1 and 300 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid value for environment variable {var}: {value}")]
    InvalidEnvOverride { var: &'static str, value: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub const ENV_API_KEY: &str = "SERPAPI_KEY";
pub const ENV_KB_PATH: &str = "KB_DATA_PATH";
pub const ENV_MODEL: &str = "EMBEDDING_MODEL";
pub const ENV_THRESHOLD: &str = "SIMILARITY_THRESHOLD";
pub const ENV_TOP_K: &str = "TOP_K_RESULTS";
pub const ENV_OLLAMA_HOST: &str = "OLLAMA_HOST";

impl Config {
    /// Default configuration directory, e.g. `~/.config/kb-assist`
    #[inline]
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .or_else(dirs::home_dir)
            .map(|dir| dir.join("kb-assist"))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load `config.toml` from `config_dir`, falling back to defaults when the
    /// file does not exist.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config = Self::read(config_dir.as_ref())?;
        config
            .validate()
            .with_context(|| "Configuration validation failed")?;
        Ok(config)
    }

    /// Load from disk and then apply process environment overrides. Validation
    /// runs once, on the merged result.
    #[inline]
    pub fn load_with_env<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        Self::load_with_lookup(config_dir, |var| std::env::var(var).ok())
    }

    /// [`load_with_env`](Self::load_with_env) with an explicit variable lookup
    #[inline]
    pub fn load_with_lookup<P, F>(config_dir: P, lookup: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::read(config_dir.as_ref())?;
        config
            .apply_overrides(lookup)
            .context("Invalid environment override")?;
        config
            .validate()
            .context("Configuration validation failed after environment overrides")?;
        Ok(config)
    }

    fn read(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.to_path_buf();

        Ok(config)
    }

    /// Apply overrides from a variable lookup. Blank values are ignored except
    /// for the API key, where a blank value clears it.
    #[inline]
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_API_KEY) {
            let key = key.trim();
            self.external_search.api_key = (!key.is_empty()).then(|| key.to_string());
        }

        if let Some(path) = non_blank(lookup(ENV_KB_PATH)) {
            self.knowledge_base.path = PathBuf::from(path);
        }

        if let Some(model) = non_blank(lookup(ENV_MODEL)) {
            self.embedding.set_model(model)?;
        }

        if let Some(raw) = non_blank(lookup(ENV_OLLAMA_HOST)) {
            self.embedding
                .set_endpoint(&raw)
                .map_err(|_| ConfigError::InvalidEnvOverride {
                    var: ENV_OLLAMA_HOST,
                    value: raw.clone(),
                })?;
        }

        if let Some(raw) = non_blank(lookup(ENV_THRESHOLD)) {
            let threshold = raw
                .trim()
                .parse::<f32>()
                .map_err(|_| ConfigError::InvalidEnvOverride {
                    var: ENV_THRESHOLD,
                    value: raw.clone(),
                })?;
            self.retrieval.set_threshold(threshold)?;
        }

        if let Some(raw) = non_blank(lookup(ENV_TOP_K)) {
            let top_k = raw
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidEnvOverride {
                    var: ENV_TOP_K,
                    value: raw.clone(),
                })?;
            self.retrieval.set_top_k(top_k)?;
        }

        Ok(())
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Knowledge base path; relative paths resolve against the working directory.
    #[inline]
    pub fn knowledge_base_path(&self) -> &Path {
        &self.knowledge_base.path
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.embedding.validate()?;
        self.retrieval.validate()?;
        self.knowledge_base.validate()?;
        self.external_search.validate()?;

        if !(1..=3600).contains(&self.app.query_timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.app.query_timeout_seconds));
        }

        Ok(())
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.embedding.ollama_url()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        self.ollama_url()?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(8..=4096).contains(&self.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(self.dimension));
        }

        Ok(())
    }

    /// Stable identifier of the configured provider, used as the cache key
    /// when loading providers.
    pub fn provider_id(&self) -> String {
        match self.provider {
            ProviderKind::Ollama => format!("ollama:{}@{}:{}", self.model, self.host, self.port),
            ProviderKind::Hashing => format!("hashing:{}", self.dimension),
        }
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    pub fn set_provider(&mut self, provider: &str) -> Result<(), ConfigError> {
        self.provider = provider.parse()?;
        Ok(())
    }

    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }
        self.protocol = protocol;
        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let temp_config = EmbeddingConfig {
            host: host.clone(),
            ..self.clone()
        };
        temp_config.ollama_url()?;
        self.host = host;
        Ok(())
    }

    /// Accepts `host`, `host:port` or `scheme://host[:port]`, the forms
    /// Ollama itself understands in `OLLAMA_HOST`.
    pub fn set_endpoint(&mut self, endpoint: &str) -> Result<(), ConfigError> {
        let endpoint = endpoint.trim();
        let has_scheme = endpoint.contains("://");
        let url = if has_scheme {
            Url::parse(endpoint)
        } else {
            Url::parse(&format!("http://{endpoint}"))
        }
        .map_err(|_| ConfigError::InvalidUrl(endpoint.to_string()))?;

        let host = url
            .host_str()
            .ok_or_else(|| ConfigError::InvalidUrl(endpoint.to_string()))?
            .to_string();
        let port = if has_scheme {
            url.port_or_known_default()
        } else {
            url.port()
        };

        let mut updated = self.clone();
        updated.set_protocol(url.scheme().to_string())?;
        updated.set_host(host)?;
        if let Some(port) = port {
            updated.set_port(port)?;
        }
        *self = updated;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }

    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        if batch_size == 0 || batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(batch_size));
        }
        self.batch_size = batch_size;
        Ok(())
    }

    pub fn set_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        if !(8..=4096).contains(&dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(dimension));
        }
        self.dimension = dimension;
        Ok(())
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.top_k) {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }

        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(ConfigError::InvalidThreshold(self.threshold));
        }

        Ok(())
    }

    pub fn set_top_k(&mut self, top_k: usize) -> Result<(), ConfigError> {
        if !(1..=100).contains(&top_k) {
            return Err(ConfigError::InvalidTopK(top_k));
        }
        self.top_k = top_k;
        Ok(())
    }

    pub fn set_threshold(&mut self, threshold: f32) -> Result<(), ConfigError> {
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ConfigError::InvalidThreshold(threshold));
        }
        self.threshold = threshold;
        Ok(())
    }
}

impl KnowledgeBaseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.title_column.trim().is_empty() {
            return Err(ConfigError::InvalidColumn("title_column"));
        }
        if self.description_column.trim().is_empty() {
            return Err(ConfigError::InvalidColumn("description_column"));
        }
        Ok(())
    }
}

impl ExternalSearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.endpoint)
            .map_err(|_| ConfigError::InvalidUrl(self.endpoint.clone()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidProtocol(url.scheme().to_string()));
        }

        if !(1..=100).contains(&self.num_results) {
            return Err(ConfigError::InvalidNumResults(self.num_results));
        }

        if !(1..=300).contains(&self.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        Ok(())
    }

    /// The configured key, treating a blank key as not configured.
    #[inline]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// First eight characters of the key followed by `...`, for display.
    #[inline]
    pub fn masked_api_key(&self) -> Option<String> {
        self.api_key()
            .map(|key| format!("{}...", key.chars().take(8).collect::<String>()))
    }

    pub fn set_api_key(&mut self, api_key: Option<String>) {
        self.api_key = api_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
    }
}
