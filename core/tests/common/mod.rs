// tests/common/mod.rs
#![allow(dead_code)] // Not every test file uses every fixture

use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use sunsano_checkout::{
  CheckoutConfig, CheckoutSystem, Customer, FakePaymentProvider, InMemoryStorage, LineItem, RecordingNavigator,
  SessionStorage,
};
use tracing::Level;

// --- Fixtures ---
pub fn sample_items() -> Vec<LineItem> {
  vec![LineItem::new("sunrise-boost", "Sunrise Boost", dec!(3.90), 2)]
}

pub fn sample_customer() -> Customer {
  Customer {
    firstname: "Mara".to_string(),
    lastname: "Sonne".to_string(),
    email: "mara@example.com".to_string(),
    phone: None,
    address: "Saftweg 7".to_string(),
    zipcode: "10115".to_string(),
    city: "Berlin".to_string(),
    notes: None,
  }
}

/// Defaults, but with a fixed webhook delay so timer tests are deterministic.
pub fn test_config() -> CheckoutConfig {
  CheckoutConfig {
    webhook_delay_min: Duration::from_secs(5),
    webhook_delay_max: Duration::from_secs(5),
    ..CheckoutConfig::default()
  }
}

pub struct Harness {
  pub system: CheckoutSystem,
  pub provider: Arc<FakePaymentProvider>,
  pub storage: Arc<InMemoryStorage>,
  pub navigator: Arc<RecordingNavigator>,
}

pub fn harness() -> Harness {
  harness_with(test_config())
}

pub fn harness_with(config: CheckoutConfig) -> Harness {
  harness_with_provider(config, FakePaymentProvider::new())
}

pub fn harness_with_provider(config: CheckoutConfig, provider: FakePaymentProvider) -> Harness {
  let provider = Arc::new(provider);
  let storage = Arc::new(InMemoryStorage::new());
  let navigator = Arc::new(RecordingNavigator::new());
  let system = CheckoutSystem::new(
    config,
    provider.clone(),
    storage.clone() as Arc<dyn SessionStorage>,
    navigator.clone(),
  );
  Harness {
    system,
    provider,
    storage,
    navigator,
  }
}

impl Harness {
  /// Walks the wizard to the payment-method step with the sample cart and customer.
  pub fn at_payment_step(self) -> Self {
    self.system.start_checkout(sample_items()).expect("sample cart is valid");
    self.system.next_step().expect("cart step validates");
    self.system.set_customer(sample_customer());
    self.system.next_step().expect("customer step validates");
    self
  }

  pub fn logged_events(&self) -> Vec<String> {
    self
      .system
      .logs()
      .iter()
      .filter_map(|entry| entry["event"].as_str().map(str::to_string))
      .collect()
  }

  pub fn count_event(&self, event: &str) -> usize {
    self.logged_events().iter().filter(|e| e.as_str() == event).count()
  }
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
