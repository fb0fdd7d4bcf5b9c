use std::fs;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

use crate::engine::bigquery::BigQueryEngineConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_POLKAHOLIC_URL: &str = "https://api.polkaholic.io";
pub const DEFAULT_STORE_PATH: &str = "hyperdot.redb";
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 30 * 60;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Parser, Debug)]
#[command(
    name = "Hyperdot Node",
    about = "Keeps the query engine chain metadata in sync."
)]
pub struct NodeArgs {
    #[arg(short, long, help = "Start log with debug.", default_value_t = false)]
    pub debug: bool,

    #[arg(short, long, help = "Path to the JSON config file.", default_value_t = String::from(DEFAULT_CONFIG_PATH))]
    pub config: String,
}

fn default_polkaholic_url() -> String {
    String::from(DEFAULT_POLKAHOLIC_URL)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolkaholicConfig {
    /// See https://polkaholic.io/login for more details.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_polkaholic_url")]
    pub base_url: String,
}

impl Default for PolkaholicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_polkaholic_url(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: String::from(DEFAULT_STORE_PATH),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerConfig {
    pub sync_interval_secs: u64,
    /// Run a sync as soon as the scheduler starts instead of waiting a
    /// full interval.
    pub run_on_start: bool,
    pub sync_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            run_on_start: true,
            sync_timeout_secs: DEFAULT_SYNC_TIMEOUT_SECS,
        }
    }
}

impl SchedulerConfig {
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    #[serde(default)]
    pub polkaholic: PolkaholicConfig,
    pub bigquery: BigQueryEngineConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl NodeConfig {
    /// Reads the config file and applies environment overrides.
    pub fn new(path: &str) -> Result<Self> {
        let mut config = Self::from_file(path)?;

        config.apply_overrides(|key| std::env::var(key).ok());

        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Unable to read config file {}", path))?;

        Self::from_json(&data).with_context(|| format!("Invalid config file {}", path))
    }

    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// Secrets may come from the environment instead of the config file.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(api_key) = var("POLKAHOLIC_API_KEY").filter(|v| !v.is_empty()) {
            self.polkaholic.api_key = api_key;
        }

        if let Some(path) = var("GOOGLE_APPLICATION_CREDENTIALS").filter(|v| !v.is_empty()) {
            self.bigquery.credentials_path = path;
        }
    }
}
