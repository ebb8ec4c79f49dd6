//! Configuration for the cairn CLI and embedders
//!
//! Default config location: ./cairn.toml

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::search::{DisabledIndex, MeilisearchIndex, SearchIndex};

pub const DEFAULT_CONFIG_FILE: &str = "cairn.toml";

/// Main configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub migrations: MigrationsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// SQLite database holding collections and the migration ledger
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("pb_data/cairn.db")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MigrationsConfig {
    #[serde(default = "default_migrations_dir")]
    pub dir: PathBuf,
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            dir: default_migrations_dir(),
        }
    }
}

/// External search index. Without a URL every index update fails.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SearchConfig {
    /// Meilisearch base URL. Override with MEILI_URL env var
    #[serde(default)]
    pub url: Option<String>,

    /// Override with MEILI_MASTER_KEY env var
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout; unset means wait indefinitely
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl SearchConfig {
    /// Build the index client this config describes
    pub fn build_index(&self) -> crate::Result<Arc<dyn SearchIndex>> {
        match self.url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => Ok(Arc::new(MeilisearchIndex::with_timeout(
                url,
                self.api_key.as_deref(),
                self.timeout_ms.map(Duration::from_millis),
            )?)),
            None => Ok(Arc::new(DisabledIndex)),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log output format: "pretty" or "json"
    /// Override with LOG_FORMAT env var
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter string
    /// Override with RUST_LOG env var
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_log_level() -> String {
    "info,cairn=debug".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &Path) -> Result<PathBuf> {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
        Ok(home.join(rest))
    } else if s == "~" {
        dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))
    } else {
        Ok(path.to_path_buf())
    }
}

impl Config {
    /// Load config from `config_path`, writing the defaults there if it is missing
    pub fn load_or_create(config_path: &Path) -> Result<Self> {
        let mut config: Config = if config_path.exists() {
            let content = fs::read_to_string(config_path)?;
            toml::from_str(&content)
                .map_err(|e| anyhow!("Invalid config {}: {}", config_path.display(), e))?
        } else {
            let config = Config::default();
            // Try to save default config
            if let Err(e) = config.save(config_path) {
                tracing::warn!(path = %config_path.display(), "Could not write default config: {}", e);
            }
            config
        };
        config.expand_paths()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Apply MEILI_URL, MEILI_MASTER_KEY and LOG_FORMAT from the environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("MEILI_URL").filter(|v| !v.is_empty()) {
            self.search.url = Some(url);
        }
        if let Some(key) = var("MEILI_MASTER_KEY").filter(|v| !v.is_empty()) {
            self.search.api_key = Some(key);
        }
        if let Some(format) = var("LOG_FORMAT").filter(|v| !v.is_empty()) {
            self.observability.log_format = format;
        }
    }

    /// Expand ~ in all paths
    fn expand_paths(&mut self) -> Result<()> {
        self.store.path = expand_tilde(&self.store.path)?;
        self.migrations.dir = expand_tilde(&self.migrations.dir)?;
        Ok(())
    }
}
