// core/src/checkout/navigator.rs

use parking_lot::Mutex;
use tracing::info;

/// Hands the customer over to an external page, e.g. the provider-hosted checkout.
pub trait Navigator: Send + Sync {
  fn redirect(&self, url: &str);
}

/// Remembers every redirect instead of performing it.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
  visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn visited(&self) -> Vec<String> {
    self.visited.lock().clone()
  }

  pub fn last(&self) -> Option<String> {
    self.visited.lock().last().cloned()
  }
}

impl Navigator for RecordingNavigator {
  fn redirect(&self, url: &str) {
    info!(url = %url, "Redirecting customer.");
    self.visited.lock().push(url.to_string());
  }
}
