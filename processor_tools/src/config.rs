use std::time::Duration;

use log::*;
use yv_common::Secret;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Connection settings for one external payment processor. Build one per processor with
/// [`ProcessorConfig::card_from_env_or_default`] / [`ProcessorConfig::wallet_from_env_or_default`].
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Short name used in log lines, e.g. "card" or "wallet".
    pub name: String,
    pub base_url: String,
    pub api_key: Secret<String>,
    /// Hard cap on any single request to the processor.
    pub timeout: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            name: "card".to_string(),
            base_url: "https://api.example-processor.test".to_string(),
            api_key: Secret::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ProcessorConfig {
    pub fn card_from_env_or_default() -> Self {
        Self::from_env_or_default("card", "YV_CARD_PROCESSOR_URL", "YV_CARD_PROCESSOR_API_KEY")
    }

    pub fn wallet_from_env_or_default() -> Self {
        Self::from_env_or_default("wallet", "YV_WALLET_PROCESSOR_URL", "YV_WALLET_PROCESSOR_API_KEY")
    }

    fn from_env_or_default(name: &str, url_var: &str, key_var: &str) -> Self {
        let base_url = std::env::var(url_var).unwrap_or_else(|_| {
            warn!("{url_var} not set, using (probably useless) default");
            format!("https://{name}.example-processor.test")
        });
        let api_key = Secret::new(std::env::var(key_var).unwrap_or_else(|_| {
            warn!("{key_var} not set, using (probably useless) default");
            "pk_00000000000000".to_string()
        }));
        let timeout = std::env::var("YV_PROCESSOR_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        Self { name: name.to_string(), base_url, api_key, timeout }
    }
}
