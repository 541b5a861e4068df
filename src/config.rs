//! Runtime configuration for the cache subsystem
//!
//! Loaded from a TOML file; every field has a default so an empty or missing
//! file yields a working configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_API_ROOT: &str = "https://api.are.na/v2";
pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_MAX_PAGES: u32 = 10;
pub const DEFAULT_STALE_AFTER_SECS: u64 = 60 * 60;

/// Environment variable overriding `api_root`
pub const API_ROOT_ENV: &str = "ARENA_API_ROOT";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Base URL every API path is appended to, without a trailing slash
    pub api_root: String,
    /// Items requested per channel page
    pub page_size: usize,
    /// Hard cap on pages fetched per channel; larger channels are truncated
    pub max_pages: u32,
    /// Age after which the cache is refreshed on the next view load
    pub stale_after_secs: u64,
    /// Where the file-backed store keeps its records
    pub data_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            api_root: DEFAULT_API_ROOT.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            stale_after_secs: DEFAULT_STALE_AFTER_SECS,
            data_dir: None,
        }
    }
}

impl CoreConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: CoreConfig = toml::from_str(content)?;
        Ok(config.normalized())
    }

    /// Load from a TOML file, applying the environment override
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&content)?.with_env_overrides())
    }

    /// Load from a TOML file, or fall back to defaults if it is missing or invalid
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("Using default config ({}): {}", path.display(), e);
                Self::default().with_env_overrides()
            }
        }
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(root) = std::env::var(API_ROOT_ENV) {
            if !root.trim().is_empty() {
                self.api_root = root;
                self = self.normalized();
            }
        }
        self
    }

    fn normalized(mut self) -> Self {
        self.api_root = self.api_root.trim().trim_end_matches('/').to_string();
        if self.page_size == 0 {
            self.page_size = DEFAULT_PAGE_SIZE;
        }
        if self.max_pages == 0 {
            self.max_pages = DEFAULT_MAX_PAGES;
        }
        self
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    /// Directory for the file-backed store: `data_dir` if set, else the
    /// platform data directory joined with `arena-cache`
    pub fn resolved_data_dir(&self) -> Option<PathBuf> {
        self.data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("arena-cache")))
    }
}
