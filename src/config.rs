use std::collections::HashMap;

use tracing::trace;

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Config {
    /// Quota budget configuration (optional - defaults apply)
    #[serde(default)]
    pub quota: QuotaConfig,

    /// Monitoring loop configuration (optional - defaults apply)
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Upstream discovery feed configuration
    pub feed: Option<FeedConfig>,
}

/// Daily quota budget shared by every costed upstream call.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct QuotaConfig {
    /// Units available per identity per UTC day
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u64,

    /// Per-identity overrides of the daily limit
    #[serde(default)]
    pub overrides: HashMap<String, u64>,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_limit: default_daily_limit(),
            overrides: HashMap::new(),
        }
    }
}

impl QuotaConfig {
    /// Daily limit for an identity, falling back to the system default.
    pub fn limit_for(&self, owner: &str) -> u64 {
        self.overrides.get(owner).copied().unwrap_or(self.daily_limit)
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct MonitorConfig {
    /// Minutes between monitoring cycles for an identity
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,

    /// Maximum concurrent channel fetches within one cycle
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            fetch_concurrency: default_fetch_concurrency(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct FeedConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

fn default_daily_limit() -> u64 {
    10_000
}

fn default_interval_minutes() -> u64 {
    60
}

fn default_fetch_concurrency() -> usize {
    4
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
