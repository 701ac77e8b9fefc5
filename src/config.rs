//! Application configuration loaded from `config.yaml` with environment
//! overrides.
//!
//! Environment variables (a `.env` file is honored through `dotenvy`):
//! - `PORT`: overrides `server.port`
//! - `REDIS_URL`: Redis connection string; caching is disabled when unset
//! - `MARKETPLACE_API_URL`: overrides `upstream.base_url`
//! - `MARKETPLACE_API_KEY`: API key sent to the upstream marketplace

use crate::domain::CollectionConfig;
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;

/// Top-level application configuration.
#[derive(Deserialize, Clone)]
pub struct AppConfig {
    /// Server configuration (host, port, CORS origins)
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream marketplace events API
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Collections exposed through the API
    pub collections: Vec<CollectionConfig>,
    /// Redis connection string, from `REDIS_URL` only
    #[serde(skip)]
    pub redis_url: Option<String>,
}

/// Server configuration settings.
#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on (default: 3010)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Comma-separated list of allowed CORS origins (default: "*")
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// Upstream marketplace events API settings.
#[derive(Deserialize, Clone)]
pub struct UpstreamConfig {
    #[serde(default = "default_upstream_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// From `MARKETPLACE_API_KEY` only
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_url(),
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }
}

impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("api_key", &self.api_key.as_ref().map(|_| "***REDACTED***"))
            .finish()
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("server", &self.server)
            .field("upstream", &self.upstream)
            .field("collections", &self.collections.len())
            .field("redis_url", &self.redis_url.as_ref().map(|_| "***REDACTED***"))
            .finish()
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3010
}
fn default_allowed_origins() -> String {
    "*".to_string()
}
fn default_upstream_url() -> String {
    "https://api.nftmarket.example".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

impl AppConfig {
    /// Read `path`, parse it and apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).with_context(|| {
            format!(
                "Failed to read {} - ensure file exists in working directory",
                path.display()
            )
        })?;
        let mut config = Self::from_yaml(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse and validate YAML without touching the environment.
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .context("Failed to parse config.yaml - check YAML syntax and structure")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.collections.is_empty() {
            anyhow::bail!("At least one collection must be configured");
        }
        let mut slugs: Vec<String> = self
            .collections
            .iter()
            .map(|c| c.slug.to_ascii_lowercase())
            .collect();
        if let Some(empty) = self.collections.iter().find(|c| c.slug.trim().is_empty()) {
            anyhow::bail!("Collection '{}' has an empty slug", empty.name);
        }
        slugs.sort();
        if let Some(pair) = slugs.windows(2).find(|pair| pair[0] == pair[1]) {
            anyhow::bail!("Duplicate collection slug: {}", pair[0]);
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Some(port) = env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            self.server.port = port;
        }
        if let Ok(url) = env::var("MARKETPLACE_API_URL") {
            self.upstream.base_url = url;
        }
        self.upstream.api_key = env::var("MARKETPLACE_API_KEY").ok();
        self.redis_url = env::var("REDIS_URL").ok();
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
