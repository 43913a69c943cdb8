use anyhow::Context;
use serde::{Deserialize, Serialize};
use shared_types::Options;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::gateway::{SearchQuery, GMAIL_API_BASE, MAX_CANDIDATES};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub gmail: GmailConfig,

    #[serde(default)]
    pub state: StateConfig,

    /// User options; edits to this section are picked up while running
    #[serde(default)]
    pub options: Options,

    #[serde(default)]
    pub server: ServerConfig,

    /// Companion browser bridge for in-page toasts
    #[serde(default)]
    pub bridge: Option<BridgeConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GmailConfig {
    /// Path to Google OAuth client credentials JSON file
    pub credentials_path: PathBuf,

    /// Path to store the OAuth token cache
    #[serde(default = "default_token_cache")]
    pub token_cache_path: PathBuf,

    /// Address the security code emails come from
    pub sender: String,

    /// Subject phrase of the security code emails
    pub subject: String,

    /// Most recent messages to consider per poll (at most 5)
    #[serde(default = "default_max_results")]
    pub max_results: u32,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Origins allowed by CORS; empty means any
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            allowed_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub url: String,

    #[serde(default = "default_bridge_timeout")]
    pub timeout_secs: u64,
}

fn default_token_cache() -> PathBuf {
    PathBuf::from("gmail_token_cache.json")
}

fn default_max_results() -> u32 {
    MAX_CANDIDATES
}

fn default_api_base() -> String {
    GMAIL_API_BASE.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_state_path() -> PathBuf {
    PathBuf::from("seen_state.json")
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_bridge_timeout() -> u64 {
    5
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let mut config: Config = toml::from_str(content)?;
        config.options = config.options.normalized();
        Ok(config)
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn search_query(&self) -> SearchQuery {
        SearchQuery::new(
            self.gmail.sender.clone(),
            self.gmail.subject.clone(),
            self.gmail.max_results,
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.gmail.request_timeout_secs)
    }

    pub fn example() -> Self {
        Config {
            gmail: GmailConfig {
                credentials_path: PathBuf::from("client_secret.json"),
                token_cache_path: default_token_cache(),
                sender: "no-reply@us.greenhouse-mail.io".to_string(),
                subject: "Security code for your application".to_string(),
                max_results: MAX_CANDIDATES,
                api_base: default_api_base(),
                request_timeout_secs: default_request_timeout(),
            },
            state: StateConfig::default(),
            options: Options::default(),
            server: ServerConfig::default(),
            bridge: Some(BridgeConfig {
                url: "http://127.0.0.1:8788".to_string(),
                timeout_secs: default_bridge_timeout(),
            }),
        }
    }
}
