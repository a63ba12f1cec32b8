use crate::agent::{CostTracker, RetryPolicy, cost};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const TABLETALK_DIR: &str = ".tabletalk";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

/// USD per million tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PricingConfig {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            input_per_million: cost::DEFAULT_INPUT_PER_MILLION,
            output_per_million: cost::DEFAULT_OUTPUT_PER_MILLION,
        }
    }
}

impl PricingConfig {
    /// List prices for the provider's usual models.
    pub fn for_provider(provider: Option<&str>) -> Self {
        match provider.map(str::to_lowercase).as_deref() {
            Some("bedrock") => Self {
                input_per_million: cost::BEDROCK_INPUT_PER_MILLION,
                output_per_million: cost::BEDROCK_OUTPUT_PER_MILLION,
            },
            _ => Self::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: Option<String>,
    pub api_key: String,
    pub base_url: Option<String>,
    /// Region for the bedrock provider.
    pub aws_region: Option<String>,
    pub model: String,
    pub data_dir: PathBuf,
    /// Markdown notes about the dataset, added to the system prompt.
    pub notes_file: Option<PathBuf>,
    pub max_iterations: usize,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Overrides the provider's list prices.
    pub pricing: Option<PricingConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: None,
            api_key: String::new(),
            base_url: None,
            aws_region: None,
            model: "gpt-4o-mini".to_string(),
            data_dir: get_tabletalk_dir().join("data"),
            notes_file: None,
            max_iterations: 10,
            request_timeout_secs: 60,
            retry: RetryConfig::default(),
            pricing: None,
        }
    }
}

pub fn get_tabletalk_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(TABLETALK_DIR)
}

pub fn get_config_path() -> PathBuf {
    get_tabletalk_dir().join("config.toml")
}

pub fn ensure_tabletalk_dir() -> Result<PathBuf> {
    let dir = get_tabletalk_dir();

    if !dir.exists() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create tabletalk directory at {}", dir.display()))?;
    }

    Ok(dir)
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        if config_exists() {
            load_config()
        } else {
            Ok(Config::default())
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.initial_backoff_ms),
            Duration::from_millis(self.retry.max_backoff_ms),
        )
    }

    pub fn pricing(&self) -> PricingConfig {
        self.pricing
            .unwrap_or_else(|| PricingConfig::for_provider(self.provider.as_deref()))
    }

    pub fn cost_tracker(&self) -> CostTracker {
        let pricing = self.pricing();
        CostTracker::new(pricing.input_per_million, pricing.output_per_million)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

pub fn load_config() -> Result<Config> {
    load_config_from(&get_config_path())
}

pub fn load_config_from(config_path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(config_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            anyhow::anyhow!(
                "Config file not found. Run 'tabletalk onboard' to set up your configuration."
            )
        } else {
            anyhow::anyhow!("Failed to read config from {}: {}", config_path.display(), e)
        }
    })?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", config_path.display()))
}

pub fn save_config(config: &Config) -> Result<()> {
    ensure_tabletalk_dir()?;
    save_config_to(config, &get_config_path())
}

pub fn save_config_to(config: &Config, config_path: &Path) -> Result<()> {
    let content =
        toml::to_string_pretty(config).with_context(|| "Failed to serialize config to TOML")?;

    std::fs::write(config_path, content)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    Ok(())
}

pub fn config_exists() -> bool {
    get_config_path().exists()
}
