use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{coinbase, defaults, polling};
use crate::error::{RunError, RunResult};
use crate::events::TriggerEvent;

/// One named section of the credentials file.
#[derive(Clone, Deserialize)]
pub struct ProfileConfig {
    #[serde(rename = "API_KEY")]
    pub api_key: String,
    #[serde(rename = "SECRET_KEY")]
    pub secret_key: String,
    /// Empty means notifications only go to the log.
    #[serde(rename = "SNS_TOPIC", default)]
    pub sns_topic: String,
    #[serde(rename = "BASE_URL", default)]
    pub base_url: Option<String>,
    #[serde(rename = "AWS_REGION", default)]
    pub aws_region: Option<String>,
}

// Secrets stay out of logs
impl std::fmt::Debug for ProfileConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileConfig")
            .field("api_key", &"***")
            .field("secret_key", &"***")
            .field("sns_topic", &self.sns_topic)
            .field("base_url", &self.base_url)
            .field("aws_region", &self.aws_region)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct CoinbaseConfig {
    pub api_key: String,
    pub secret_key: String,
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub profile: String,
    pub credentials: ProfileConfig,
}

impl AppConfig {
    pub fn load(path: &Path, profile: &str) -> RunResult<Self> {
        tracing::info!("[CONFIG] Reading config file: {}", path.display());
        let content = fs::read_to_string(path)
            .map_err(|e| RunError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml(&content, profile)
    }

    pub fn from_yaml(content: &str, profile: &str) -> RunResult<Self> {
        // Strip BOM if present
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);

        let mut profiles: HashMap<String, ProfileConfig> =
            serde_yaml::from_str(content).map_err(|e| RunError::Config(format!("invalid config: {}", e)))?;

        let credentials = profiles
            .remove(profile)
            .ok_or_else(|| RunError::Config(format!("profile '{}' not found in config", profile)))?;

        Ok(Self {
            profile: profile.to_string(),
            credentials,
        })
    }

    /// Exchange connection details; `BASE_URL` wins over the sandbox switch.
    pub fn coinbase(&self, sandbox: bool) -> CoinbaseConfig {
        let default_url = if sandbox { coinbase::SANDBOX_URL } else { coinbase::PRODUCTION_URL };
        CoinbaseConfig {
            api_key: self.credentials.api_key.clone(),
            secret_key: self.credentials.secret_key.clone(),
            base_url: self
                .credentials
                .base_url
                .clone()
                .unwrap_or_else(|| default_url.to_string()),
        }
    }
}

/// Everything a single run needs, merged once from CLI defaults and the
/// trigger payload. Never mutated after the run starts.
#[derive(Clone, Debug)]
pub struct RunSettings {
    pub market_name: String,
    pub order_side: String,
    pub amount: String,
    pub amount_currency: String,
    pub config_file: PathBuf,
    pub profile: String,
    pub sandbox: bool,
    pub job: bool,
    pub warn_after: Duration,
    pub poll_interval: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            market_name: defaults::MARKET_NAME.to_string(),
            order_side: defaults::ORDER_SIDE.to_string(),
            amount: defaults::AMOUNT.to_string(),
            amount_currency: defaults::AMOUNT_CURRENCY.to_string(),
            config_file: PathBuf::from(defaults::CONFIG_FILE),
            profile: defaults::PROFILE.to_string(),
            sandbox: false,
            job: false,
            warn_after: polling::WARN_AFTER,
            poll_interval: polling::POLL_INTERVAL,
        }
    }
}

impl RunSettings {
    /// Payload attributes override whatever came from the command line.
    pub fn with_event(mut self, event: &TriggerEvent) -> Self {
        if let Some(v) = event.attribute("market_name") {
            self.market_name = v;
        }
        if let Some(v) = event.attribute("order_side") {
            self.order_side = v;
        }
        if let Some(v) = event.attribute("amount") {
            self.amount = v;
        }
        if let Some(v) = event.attribute("amount_currency") {
            self.amount_currency = v;
        }
        if let Some(v) = event.attribute("config_file") {
            self.config_file = PathBuf::from(v);
        }
        if event.requests_job() {
            self.job = true;
        }
        self
    }
}
