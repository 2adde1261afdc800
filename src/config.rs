use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::api_auth::{SkipRuleConfig, default_skip_rules};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// Live or test deployment, reported in auth logs
    #[serde(default)]
    pub livemode: bool,
    /// Host part of federated addresses (`username@mint_identity`)
    pub mint_identity: String,
    #[serde(default)]
    pub server: ServerConfig,
    /// PostgreSQL URL of the register store; in-memory when absent
    #[serde(default)]
    pub register_url: Option<String>,
    /// PostgreSQL URL of the mint store (also holds the replay ledger); in-memory when absent
    #[serde(default)]
    pub mint_url: Option<String>,
    pub auth: AuthConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 2406,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Authentication gate configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthConfig {
    /// Authority embedded in every issued challenge
    pub authority: String,
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
    #[serde(default = "default_max_future_skew_secs")]
    pub max_future_skew_secs: u64,
    #[serde(default = "default_challenge_batch_size")]
    pub challenge_batch_size: usize,
    /// Truncate challenge and signature in auth logs
    #[serde(default = "default_mask_credentials")]
    pub mask_credentials: bool,
    #[serde(default = "default_skip_rules")]
    pub skip_list: Vec<SkipRuleConfig>,
}

fn default_max_age_secs() -> u64 {
    3600
}

fn default_max_future_skew_secs() -> u64 {
    30
}

fn default_challenge_batch_size() -> usize {
    10
}

fn default_mask_credentials() -> bool {
    true
}

impl AppConfig {
    /// Load `config/<env>.yaml`.
    pub fn load(env: &str) -> anyhow::Result<Self> {
        Self::load_from(format!("config/{}.yaml", env))
    }

    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: AppConfig = serde_yaml::from_str(content)?;
        if config.auth.challenge_batch_size == 0 {
            anyhow::bail!("auth.challenge_batch_size must be at least 1");
        }
        Ok(config)
    }
}
