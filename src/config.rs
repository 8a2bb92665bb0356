use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::env as std_env;
use thiserror::Error;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_STORE_PATH: &str = "kitchen-checkout.json";
const DEFAULT_OBSCURE_KEY: &str = "kitchen-checkout-local-obscure-key";
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_LOCKOUT_MINUTES: i64 = 15;
const DEFAULT_SESSION_TIMEOUT_MINUTES: i64 = 30;
const DEFAULT_STAGE_DELAY_MS: u64 = 1500;
const CONFIG_DIR: &str = "config";

/// Engine configuration.
///
/// Values come from `config/default.toml` (optional) overlaid with
/// `CHECKOUT__`-prefixed environment variables; anything absent falls back
/// to the defaults below.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CheckoutConfig {
    /// Sales tax applied to the cart subtotal.
    #[serde(default = "default_tax_rate")]
    pub tax_rate: Decimal,

    /// Flat fee charged for delivery orders.
    #[serde(default = "default_delivery_fee")]
    pub delivery_fee: Decimal,

    /// Validation attempts allowed before the lockout window engages.
    #[validate(range(min = 1))]
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// How long a tripped lockout lasts.
    #[validate(range(min = 1))]
    #[serde(default = "default_lockout_minutes")]
    pub lockout_minutes: i64,

    /// How long a checkout session stays usable.
    #[validate(range(min = 1))]
    #[serde(default = "default_session_timeout_minutes")]
    pub session_timeout_minutes: i64,

    /// Pacing applied per payment pipeline stage. Zero disables pacing.
    #[serde(default = "default_stage_delay_ms")]
    pub stage_delay_ms: u64,

    /// Key for the reversible at-rest obscuring transform.
    #[validate(length(min = 16))]
    #[serde(default = "default_obscure_key")]
    pub obscure_key: String,

    /// Path of the durable JSON store.
    #[validate(length(min = 1))]
    #[serde(default = "default_store_path")]
    pub store_path: String,

    /// Log level when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text.
    #[serde(default)]
    pub log_json: bool,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            tax_rate: default_tax_rate(),
            delivery_fee: default_delivery_fee(),
            max_attempts: default_max_attempts(),
            lockout_minutes: default_lockout_minutes(),
            session_timeout_minutes: default_session_timeout_minutes(),
            stage_delay_ms: default_stage_delay_ms(),
            obscure_key: default_obscure_key(),
            store_path: default_store_path(),
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

fn default_tax_rate() -> Decimal {
    dec!(0.08)
}

fn default_delivery_fee() -> Decimal {
    dec!(3.99)
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_lockout_minutes() -> i64 {
    DEFAULT_LOCKOUT_MINUTES
}

fn default_session_timeout_minutes() -> i64 {
    DEFAULT_SESSION_TIMEOUT_MINUTES
}

fn default_stage_delay_ms() -> u64 {
    DEFAULT_STAGE_DELAY_MS
}

fn default_obscure_key() -> String {
    DEFAULT_OBSCURE_KEY.to_string()
}

fn default_store_path() -> String {
    DEFAULT_STORE_PATH.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),
    #[error("configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Loads configuration from `config/default.toml` (if present) and
/// `CHECKOUT__*` environment variables, then validates it.
pub fn load_config() -> Result<CheckoutConfig, AppConfigError> {
    let builder = Config::builder()
        .set_default("tax_rate", "0.08")?
        .set_default("delivery_fee", "3.99")?
        .set_default("max_attempts", DEFAULT_MAX_ATTEMPTS as i64)?
        .set_default("lockout_minutes", DEFAULT_LOCKOUT_MINUTES)?
        .set_default("session_timeout_minutes", DEFAULT_SESSION_TIMEOUT_MINUTES)?
        .set_default("stage_delay_ms", DEFAULT_STAGE_DELAY_MS as i64)?
        .set_default("obscure_key", DEFAULT_OBSCURE_KEY)?
        .set_default("store_path", DEFAULT_STORE_PATH)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
        .add_source(Environment::with_prefix("CHECKOUT").separator("__"));

    let config: CheckoutConfig = builder.build()?.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

/// Initializes the global tracing subscriber. `RUST_LOG`, when set,
/// overrides the configured level.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("kitchen_checkout={level}");
    let filter_directive = std_env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}
