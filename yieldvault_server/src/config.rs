use std::{env, io::Write};

use chrono::Duration;
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde_json::json;
use tempfile::NamedTempFile;
use yieldvault_engine::adapters::ManualChannelDefaults;
use yv_common::Secret;

use crate::errors::ServerError;

const DEFAULT_YV_HOST: &str = "127.0.0.1";
const DEFAULT_YV_PORT: u16 = 8360;
const DEFAULT_HOLDING_WINDOW: Duration = Duration::days(14);
const DEFAULT_PENDING_EXPIRY: Duration = Duration::days(7);
const DEFAULT_VALUATION_INTERVAL_SECS: u64 = 3600;
const DEFAULT_WITHDRAWAL_FEE_BPS: i64 = 0;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// Secret each processor signs its webhook bodies with (HMAC-SHA256 over the raw body).
    pub card_webhook_secret: Secret<String>,
    pub wallet_webhook_secret: Secret<String>,
    /// If false, webhook signature checks are skipped. **DANGER** — only for local development.
    pub webhook_hmac_checks: bool,
    /// Minimum time a position must be held before a withdrawal request is accepted. Distinct
    /// from (and typically much shorter than) maturity.
    pub holding_window: Duration,
    /// How long a manual-channel position may sit awaiting payment before it is auto-rejected.
    pub pending_expiry: Duration,
    /// Seconds between valuation-scheduler runs.
    pub valuation_interval_secs: u64,
    /// Withdrawal processing fee in basis points of the payout. Zero disables the fee event.
    pub withdrawal_fee_bps: i64,
    /// Platform deposit details handed out for manual channels.
    pub manual_defaults: ManualChannelDefaults,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_YV_HOST.to_string(),
            port: DEFAULT_YV_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            card_webhook_secret: Secret::default(),
            wallet_webhook_secret: Secret::default(),
            webhook_hmac_checks: true,
            holding_window: DEFAULT_HOLDING_WINDOW,
            pending_expiry: DEFAULT_PENDING_EXPIRY,
            valuation_interval_secs: DEFAULT_VALUATION_INTERVAL_SECS,
            withdrawal_fee_bps: DEFAULT_WITHDRAWAL_FEE_BPS,
            manual_defaults: ManualChannelDefaults::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("YV_HOST").ok().unwrap_or_else(|| DEFAULT_YV_HOST.into());
        let port = env::var("YV_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid port for YV_PORT. {e} Using the default, {DEFAULT_YV_PORT}, instead.");
                    DEFAULT_YV_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_YV_PORT);
        let database_url = env::var("YV_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ YV_DATABASE_URL is not set. Please set it to the URL for the YieldVault database.");
            String::default()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        let card_webhook_secret = Secret::new(env::var("YV_CARD_WEBHOOK_SECRET").unwrap_or_else(|_| {
            error!("🪛️ YV_CARD_WEBHOOK_SECRET is not set. Card webhook signatures cannot be verified.");
            String::default()
        }));
        let wallet_webhook_secret = Secret::new(env::var("YV_WALLET_WEBHOOK_SECRET").unwrap_or_else(|_| {
            error!("🪛️ YV_WALLET_WEBHOOK_SECRET is not set. Wallet webhook signatures cannot be verified.");
            String::default()
        }));
        let webhook_hmac_checks =
            env::var("YV_WEBHOOK_HMAC_CHECKS").map(|s| &s != "0" && &s != "false").unwrap_or(true);
        if !webhook_hmac_checks {
            warn!("🚨️ Webhook HMAC checks are disabled. Unsigned payment confirmations will be accepted!");
        }
        let holding_window = duration_days_from_env("YV_HOLDING_WINDOW_DAYS", DEFAULT_HOLDING_WINDOW);
        let pending_expiry = duration_days_from_env("YV_PENDING_EXPIRY_DAYS", DEFAULT_PENDING_EXPIRY);
        let valuation_interval_secs = env::var("YV_VALUATION_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_VALUATION_INTERVAL_SECS);
        let withdrawal_fee_bps = env::var("YV_WITHDRAWAL_FEE_BPS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(DEFAULT_WITHDRAWAL_FEE_BPS);
        let manual_defaults = ManualChannelDefaults::from_env_or_default();
        Self {
            host,
            port,
            database_url,
            auth,
            card_webhook_secret,
            wallet_webhook_secret,
            webhook_hmac_checks,
            holding_window,
            pending_expiry,
            valuation_interval_secs,
            withdrawal_fee_bps,
            manual_defaults,
        }
    }
}

fn duration_days_from_env(var: &str, default: Duration) -> Duration {
    env::var(var)
        .map_err(|_| info!("🪛️ {var} is not set. Using the default value of {} days.", default.num_days()))
        .and_then(|s| {
            s.parse::<i64>()
                .map(Duration::days)
                .map_err(|e| warn!("🪛️ Invalid configuration value for {var}. {e}"))
        })
        .ok()
        .unwrap_or(default)
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
/// Bearer-token verification settings. Token *issuance* belongs to the external identity
/// provider; the server only needs the shared secret to verify signatures.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub token_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let mut tmpfile = NamedTempFile::new().ok().and_then(|f| f.keep().ok());
        warn!(
            "🚨️🚨️🚨️ The token signing secret has not been set. I'm using a random value for this session. DO NOT \
             operate on production like this since every restart invalidates all tokens. 🚨️🚨️🚨️"
        );
        let secret: String = thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect();
        match &mut tmpfile {
            Some((f, p)) => {
                let key_data = json!({ "token_secret": secret }).to_string();
                match writeln!(f, "{key_data}") {
                    Ok(()) => warn!(
                        "🚨️🚨️🚨️ The token secret for this session was written to {}. If this is a production \
                         instance, you are doing it wrong! Set the YV_TOKEN_SECRET environment variable instead. \
                         🚨️🚨️🚨️",
                        p.to_str().unwrap_or("???")
                    ),
                    Err(e) => warn!("🪛️ Could not write the token secret to the temporary file. {e}"),
                }
            },
            None => {
                warn!("🪛️ Could not create a temporary file to store the token secret.");
            },
        }
        Self { token_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("YV_TOKEN_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [YV_TOKEN_SECRET]")))?;
        if secret.len() < 32 {
            return Err(ServerError::ConfigurationError(
                "YV_TOKEN_SECRET must be at least 32 characters long.".to_string(),
            ));
        }
        Ok(Self { token_secret: Secret::new(secret) })
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// The subset of configuration the request handlers need. Kept small and free of secrets so it
/// can be cloned into application data without passing sensitive information around.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub holding_window: Duration,
    pub withdrawal_fee_bps: i64,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { holding_window: config.holding_window, withdrawal_fee_bps: config.withdrawal_fee_bps }
    }
}
