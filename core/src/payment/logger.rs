// core/src/payment/logger.rs

//! Best-effort diagnostic log of payment events.
//!
//! Every entry goes to `tracing` (target `payment_log`) and to a capped list persisted in
//! [`SessionStorage`]. Storage problems are reported as warnings and never reach the caller.

use crate::error::{CheckoutError, CheckoutResult};
use crate::storage::SessionStorage;
use chrono::Utc;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use tracing::{info, warn};

pub const PAYMENT_LOG_KEY: &str = "payment-logs";
pub const DEFAULT_LOG_CAPACITY: usize = 100;

#[derive(Clone)]
pub struct PaymentLogger {
  storage: Arc<dyn SessionStorage>,
  capacity: usize,
}

impl PaymentLogger {
  pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
    Self::with_capacity(storage, DEFAULT_LOG_CAPACITY)
  }

  pub fn with_capacity(storage: Arc<dyn SessionStorage>, capacity: usize) -> Self {
    Self {
      storage,
      capacity: capacity.max(1),
    }
  }

  /// Records `event`. `data` should be a JSON object; any other value is stored under `data`.
  pub fn log(&self, event: &str, data: JsonValue) {
    let entry = build_entry(event, data);
    let rendered = JsonValue::Object(entry.clone()).to_string();
    info!(target: "payment_log", event = %event, entry = %rendered, "Payment event.");

    if let Err(e) = self.append(entry) {
      warn!(target: "payment_log", event = %event, error = %e, "Payment log not persisted; trace only.");
    }
  }

  /// The persisted entries, oldest first. Empty if storage is unreadable.
  pub fn entries(&self) -> Vec<JsonValue> {
    match self.load() {
      Ok(entries) => entries,
      Err(e) => {
        warn!(target: "payment_log", error = %e, "Payment log could not be read.");
        Vec::new()
      }
    }
  }

  pub fn clear(&self) {
    if let Err(e) = self.storage.remove(PAYMENT_LOG_KEY) {
      warn!(target: "payment_log", error = %e, "Payment log could not be cleared.");
    }
  }

  fn load(&self) -> CheckoutResult<Vec<JsonValue>> {
    match self.storage.get(PAYMENT_LOG_KEY)? {
      Some(raw) => serde_json::from_str::<Vec<JsonValue>>(&raw)
        .map_err(|e| CheckoutError::Storage(format!("stored payment log is not a JSON array: {}", e))),
      None => Ok(Vec::new()),
    }
  }

  fn append(&self, entry: Map<String, JsonValue>) -> CheckoutResult<()> {
    // A corrupt stored log is replaced rather than blocking new entries.
    let mut entries = self.load().unwrap_or_default();
    entries.push(JsonValue::Object(entry));
    if entries.len() > self.capacity {
      let overflow = entries.len() - self.capacity;
      entries.drain(..overflow);
    }
    let serialized =
      serde_json::to_string(&entries).map_err(|e| CheckoutError::Storage(format!("serialize payment log: {}", e)))?;
    self.storage.set(PAYMENT_LOG_KEY, serialized)
  }
}

fn build_entry(event: &str, data: JsonValue) -> Map<String, JsonValue> {
  let mut entry = Map::new();
  entry.insert("event".to_string(), JsonValue::String(event.to_string()));
  entry.insert("timestamp".to_string(), JsonValue::String(Utc::now().to_rfc3339()));
  entry.insert("orderId".to_string(), JsonValue::Null);
  match data {
    JsonValue::Object(fields) => entry.extend(fields),
    JsonValue::Null => {}
    other => {
      entry.insert("data".to_string(), other);
    }
  }
  entry
}
