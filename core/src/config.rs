// core/src/config.rs

//! Tunables for the checkout flow: money constants, poll cadence, webhook retry policy.

use crate::error::{CheckoutError, CheckoutResult};
use dotenvy::dotenv;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CheckoutConfig {
  /// Base URL of the shop backend, e.g. `http://localhost:5000`.
  pub api_base_url: String,
  pub http_timeout: Duration,

  pub delivery_fee: Decimal,
  pub currency: String,

  pub poll_interval: Duration,
  /// Poll ceiling. Reaching it without a terminal answer declares `timeout`.
  pub max_polls: u32,

  pub webhook_max_retries: u32,
  pub webhook_retry_backoff: Duration,
  /// Jitter window for each simulated webhook attempt. `min == max` disables jitter.
  pub webhook_delay_min: Duration,
  pub webhook_delay_max: Duration,

  /// Capacity of the persisted payment log ring.
  pub log_capacity: usize,
}

impl Default for CheckoutConfig {
  fn default() -> Self {
    Self {
      api_base_url: "http://localhost:5000".to_string(),
      http_timeout: Duration::from_secs(10),
      delivery_fee: dec!(2.50),
      currency: "eur".to_string(),
      poll_interval: Duration::from_secs(30),
      max_polls: 20,
      webhook_max_retries: 3,
      webhook_retry_backoff: Duration::from_secs(10),
      webhook_delay_min: Duration::from_secs(5),
      webhook_delay_max: Duration::from_secs(15),
      log_capacity: 100,
    }
  }
}

impl CheckoutConfig {
  /// Loads `.env` if present, then overrides the defaults with any `CHECKOUT_*` variables set.
  pub fn from_env() -> CheckoutResult<Self> {
    dotenv().ok();
    let cfg = Self::from_lookup(|name| env::var(name).ok())?;
    tracing::info!(api_base_url = %cfg.api_base_url, "Checkout configuration loaded.");
    Ok(cfg)
  }

  /// Same as [`CheckoutConfig::from_env`] but reads variables through `lookup`.
  pub fn from_lookup<F>(lookup: F) -> CheckoutResult<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    let defaults = Self::default();

    let parse = |name: &str| -> CheckoutResult<Option<u64>> {
      match lookup(name) {
        Some(raw) => raw
          .trim()
          .parse::<u64>()
          .map(Some)
          .map_err(|e| CheckoutError::Config(format!("Invalid {}: {}", name, e))),
        None => Ok(None),
      }
    };
    let millis = |name: &str, fallback: Duration| -> CheckoutResult<Duration> {
      Ok(parse(name)?.map(Duration::from_millis).unwrap_or(fallback))
    };

    let delivery_fee = match lookup("CHECKOUT_DELIVERY_FEE") {
      Some(raw) => Decimal::from_str(raw.trim())
        .map_err(|e| CheckoutError::Config(format!("Invalid CHECKOUT_DELIVERY_FEE: {}", e)))?,
      None => defaults.delivery_fee,
    };
    if delivery_fee.is_sign_negative() {
      return Err(CheckoutError::Config("CHECKOUT_DELIVERY_FEE must not be negative".to_string()));
    }

    let max_polls = match parse("CHECKOUT_MAX_POLLS")? {
      Some(n) => u32::try_from(n).map_err(|e| CheckoutError::Config(format!("Invalid CHECKOUT_MAX_POLLS: {}", e)))?,
      None => defaults.max_polls,
    };
    if max_polls == 0 {
      return Err(CheckoutError::Config("CHECKOUT_MAX_POLLS must be at least 1".to_string()));
    }

    let webhook_max_retries = match parse("CHECKOUT_WEBHOOK_MAX_RETRIES")? {
      Some(n) => u32::try_from(n)
        .map_err(|e| CheckoutError::Config(format!("Invalid CHECKOUT_WEBHOOK_MAX_RETRIES: {}", e)))?,
      None => defaults.webhook_max_retries,
    };

    let poll_interval = millis("CHECKOUT_POLL_INTERVAL_MS", defaults.poll_interval)?;
    if poll_interval.is_zero() {
      return Err(CheckoutError::Config("CHECKOUT_POLL_INTERVAL_MS must be positive".to_string()));
    }

    let webhook_delay_min = millis("CHECKOUT_WEBHOOK_DELAY_MIN_MS", defaults.webhook_delay_min)?;
    let webhook_delay_max = millis("CHECKOUT_WEBHOOK_DELAY_MAX_MS", defaults.webhook_delay_max)?;
    if webhook_delay_min > webhook_delay_max {
      return Err(CheckoutError::Config(
        "CHECKOUT_WEBHOOK_DELAY_MIN_MS must not exceed CHECKOUT_WEBHOOK_DELAY_MAX_MS".to_string(),
      ));
    }

    let log_capacity = match parse("CHECKOUT_LOG_CAPACITY")? {
      Some(0) => return Err(CheckoutError::Config("CHECKOUT_LOG_CAPACITY must be at least 1".to_string())),
      Some(n) => usize::try_from(n)
        .map_err(|e| CheckoutError::Config(format!("Invalid CHECKOUT_LOG_CAPACITY: {}", e)))?,
      None => defaults.log_capacity,
    };

    Ok(Self {
      api_base_url: lookup("CHECKOUT_API_BASE_URL")
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or(defaults.api_base_url),
      http_timeout: millis("CHECKOUT_HTTP_TIMEOUT_MS", defaults.http_timeout)?,
      delivery_fee,
      currency: lookup("CHECKOUT_CURRENCY").unwrap_or(defaults.currency),
      poll_interval,
      max_polls,
      webhook_max_retries,
      webhook_retry_backoff: millis("CHECKOUT_WEBHOOK_RETRY_BACKOFF_MS", defaults.webhook_retry_backoff)?,
      webhook_delay_min,
      webhook_delay_max,
      log_capacity,
    })
  }
}
