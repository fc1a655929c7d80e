use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RecallConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Short model name from the registry: `minilm` (384 dims) or `mpnet` (768 dims).
    pub model: String,
    pub cache_dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
    pub default_threshold: f32,
    pub hybrid_weight: f32,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            embedding: EmbeddingConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 3847,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_recall_dir()
            .join("index.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_recall_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            model: "minilm".into(),
            cache_dir,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            default_threshold: 0.0,
            hybrid_weight: 0.7,
        }
    }
}

/// Returns `~/.aifbin-recall/`
pub fn default_recall_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".aifbin-recall")
}

/// Returns the default config file path: `~/.aifbin-recall/config.yaml`
pub fn default_config_path() -> PathBuf {
    default_recall_dir().join("config.yaml")
}

impl RecallConfig {
    /// Load config from the YAML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            serde_yaml::from_str(&contents).context("failed to parse config YAML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            RecallConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (AIFBIN_RECALL_DB, AIFBIN_RECALL_MODEL, AIFBIN_RECALL_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("AIFBIN_RECALL_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("AIFBIN_RECALL_MODEL") {
            self.embedding.model = val;
        }
        if let Ok(val) = std::env::var("AIFBIN_RECALL_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
