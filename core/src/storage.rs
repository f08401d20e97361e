// core/src/storage.rs

//! Key/value persistence capability for client-held checkout state.
//!
//! Plays the role of the browser's session storage: string values under string keys,
//! scoped to one page session. Implementations must be cheap to share (`Arc<dyn SessionStorage>`).

use crate::error::{CheckoutError, CheckoutResult};
use parking_lot::Mutex;
use std::collections::HashMap;

pub trait SessionStorage: Send + Sync {
  fn get(&self, key: &str) -> CheckoutResult<Option<String>>;
  fn set(&self, key: &str, value: String) -> CheckoutResult<()>;
  fn remove(&self, key: &str) -> CheckoutResult<()>;
}

/// A thread-safe in-memory session store.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
  entries: Mutex<HashMap<String, String>>,
  quota_bytes: Option<usize>,
}

impl InMemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  /// A store that rejects writes once the total stored bytes would exceed `quota_bytes`,
  /// like a browser storage quota.
  pub fn with_quota(quota_bytes: usize) -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
      quota_bytes: Some(quota_bytes),
    }
  }

  pub fn len(&self) -> usize {
    self.entries.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.lock().is_empty()
  }
}

impl SessionStorage for InMemoryStorage {
  fn get(&self, key: &str) -> CheckoutResult<Option<String>> {
    Ok(self.entries.lock().get(key).cloned())
  }

  fn set(&self, key: &str, value: String) -> CheckoutResult<()> {
    let mut entries = self.entries.lock();
    if let Some(quota) = self.quota_bytes {
      let others: usize = entries
        .iter()
        .filter(|(k, _)| k.as_str() != key)
        .map(|(k, v)| k.len() + v.len())
        .sum();
      if others + key.len() + value.len() > quota {
        return Err(CheckoutError::Storage(format!(
          "quota of {} bytes exceeded while writing '{}'",
          quota, key
        )));
      }
    }
    entries.insert(key.to_string(), value);
    Ok(())
  }

  fn remove(&self, key: &str) -> CheckoutResult<()> {
    self.entries.lock().remove(key);
    Ok(())
  }
}
