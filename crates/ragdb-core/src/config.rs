//! Layered configuration and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nesting levels, e.g.
//! `APP_HYBRID__ENABLED=false`). Provides helpers to expand `~` and `${VAR}`
//! and to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;
use crate::types::FusionWeights;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let config = Self::from_figment(Self::figment_for_env(&env_name));
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    pub fn figment_for_env(env_name: &str) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment.merge(Env::prefixed("APP_").split("__"))
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    /// Typed view of the whole configuration, validated.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self.figment.extract().map_err(|e| anyhow::anyhow!("Failed to extract settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        let settings = self.settings()?;
        match env {
            "prod" | "production" => {
                if settings.embedding.use_fake {
                    anyhow::bail!("fake embeddings are not allowed in production");
                }
                if settings.embedding.api_key.is_none() {
                    anyhow::bail!("embedding.api_key is required in production");
                }
            }
            "dev" | "development" | "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub hybrid: HybridSettings,
    pub rerank: RerankSettings,
    pub embedding: EmbeddingSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), Error> {
        self.hybrid
            .weights
            .validate()
            .map_err(|e| Error::InvalidConfig(format!("hybrid.weights: {e}")))?;
        if self.hybrid.over_fetch == 0 {
            return Err(Error::InvalidConfig("hybrid.over_fetch must be at least 1".to_string()));
        }
        if !(self.hybrid.rrf_k.is_finite() && self.hybrid.rrf_k > 0.0) {
            return Err(Error::InvalidConfig("hybrid.rrf_k must be positive".to_string()));
        }
        if self.embedding.dimension == 0 {
            return Err(Error::InvalidConfig("embedding.dimension must be positive".to_string()));
        }
        if self.embedding.max_batch == 0 {
            return Err(Error::InvalidConfig("embedding.max_batch must be positive".to_string()));
        }
        for (key, ms) in [
            ("hybrid.search_timeout_ms", self.hybrid.search_timeout_ms),
            ("embedding.timeout_ms", self.embedding.timeout_ms),
            ("rerank.timeout_ms", self.rerank.timeout_ms),
        ] {
            if ms == 0 {
                return Err(Error::InvalidConfig(format!("{key} must be positive")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridSettings {
    pub enabled: bool,
    pub weights: FusionWeights,
    pub rrf_k: f32,
    /// Candidates requested per signal = limit * over_fetch.
    pub over_fetch: usize,
    pub search_timeout_ms: u64,
}

impl Default for HybridSettings {
    fn default() -> Self {
        Self { enabled: true, weights: FusionWeights::default(), rrf_k: 60.0, over_fetch: 3, search_timeout_ms: 5_000 }
    }
}

impl HybridSettings {
    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankSettings {
    pub enabled: bool,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_ms: u64,
    pub max_candidates: usize,
}

impl Default for RerankSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            model: "rerank-english-v3.0".to_string(),
            api_key: None,
            base_url: "https://api.cohere.com/v2/rerank".to_string(),
            timeout_ms: 3_000,
            max_candidates: 50,
        }
    }
}

impl RerankSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub dimension: usize,
    pub timeout_ms: u64,
    pub max_batch: usize,
    pub max_retries: u32,
    /// Zero disables the in-process embedding cache.
    pub cache_capacity: usize,
    pub use_fake: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            api_key: None,
            base_url: "https://api.openai.com/v1/embeddings".to_string(),
            dimension: 1536,
            timeout_ms: 10_000,
            max_batch: 2048,
            max_retries: 3,
            cache_capacity: 1_000,
            use_fake: false,
        }
    }
}

impl EmbeddingSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub lancedb_dir: String,
    pub table: String,
    pub tantivy_dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { lancedb_dir: "data/lancedb".to_string(), table: "chunks".to_string(), tantivy_dir: "data/tantivy".to_string() }
    }
}

impl StorageSettings {
    pub fn lancedb_path(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.lancedb_dir)
    }

    pub fn tantivy_path(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.tantivy_dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
