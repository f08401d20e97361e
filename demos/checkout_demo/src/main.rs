// demos/checkout_demo/src/main.rs

//! Drives one checkout end to end.
//!
//! By default the scripted fake provider is used and monitoring is sped up so the run takes a
//! few seconds. Pass `--live` to talk to the shop backend at `CHECKOUT_API_BASE_URL` instead;
//! that path opens a hosted checkout session and stops at the redirect.

use std::sync::Arc;
use std::time::Duration;
use sunsano_checkout::{
  default_catalog, Cart, CheckoutConfig, CheckoutSystem, Customer, FakePaymentProvider, HttpPaymentProvider,
  InMemoryStorage, PaymentMethod, PaymentProvider, RecordingNavigator, RemotePaymentStatus, WebhookDelivery,
};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()) // Allow RUST_LOG override
    .with_span_events(FmtSpan::CLOSE)
    .init();

  let live = std::env::args().any(|arg| arg == "--live");
  let mut config = CheckoutConfig::from_env()?;

  let provider: Arc<dyn PaymentProvider> = if live {
    Arc::new(HttpPaymentProvider::new(&config)?)
  } else {
    config.poll_interval = Duration::from_millis(500);
    config.webhook_delay_min = Duration::from_millis(200);
    config.webhook_delay_max = Duration::from_millis(600);
    config.webhook_retry_backoff = Duration::from_millis(300);
    let fake = FakePaymentProvider::new().with_latency(Duration::from_millis(50));
    fake
      .push_webhook(WebhookDelivery::Failed)
      .push_payment_status(RemotePaymentStatus::Pending)
      .set_default_webhook(WebhookDelivery::Delivered);
    Arc::new(fake)
  };

  let navigator = Arc::new(RecordingNavigator::new());
  let storage = Arc::new(InMemoryStorage::new());
  let system = CheckoutSystem::new(config, provider, storage.clone(), navigator.clone());

  let mut cart = Cart::load(storage, default_catalog());
  cart.add("sunny-orange", 2)?;
  cart.add("green-power", 1)?;
  tracing::info!(items = cart.item_count(), subtotal = %cart.subtotal(), "Cart filled.");
  system.start_checkout_from_cart(&cart)?;
  system.next_step()?;
  system.set_customer(Customer {
    firstname: "Mara".to_string(),
    lastname: "Sonne".to_string(),
    email: "mara@example.com".to_string(),
    phone: None,
    address: "Saftweg 7".to_string(),
    zipcode: "10115".to_string(),
    city: "Berlin".to_string(),
    notes: Some("Bitte klingeln".to_string()),
  });
  system.next_step()?;
  system.select_payment_method(PaymentMethod::Card);
  tracing::info!(total = %system.totals().total, "Order summary ready.");

  if live {
    let created = system.place_order().await?;
    tracing::info!(session_id = %created.session_id, redirect = ?navigator.last(), "Hand-off to hosted checkout.");
    return Ok(());
  }

  let mut states = system.subscribe();
  let payment_id = system.process_payment().await?;
  tracing::info!(payment_id = %payment_id, "Payment is being monitored.");

  let settled = states.wait_for(|s| matches!(*s, Some(state) if state.is_settled()));
  let settled = tokio::time::timeout(Duration::from_secs(30), settled)
    .await?
    .map(|state| *state)?;
  tracing::info!(state = ?settled, "Payment settled.");

  for entry in system.logs() {
    println!("{}", serde_json::to_string(&entry)?);
  }
  Ok(())
}
