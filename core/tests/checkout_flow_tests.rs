// tests/checkout_flow_tests.rs
mod common;

use common::*;
use rust_decimal_macros::dec;
use std::time::Duration;
use sunsano_checkout::{
  CheckoutConfig, CheckoutError, CheckoutSessionCreated, FakePaymentProvider, LineItem, PaymentState,
  PaymentStateMachine, ProviderCall, RemotePaymentStatus, StatusKind, WebhookDelivery, WizardStep,
};
use tokio::time::sleep;

fn secs(n: u64) -> Duration {
  Duration::from_secs(n)
}

// --- Wizard ---

#[tokio::test]
async fn test_wizard_advances_only_through_valid_steps() {
  setup_tracing();
  let h = harness();
  h.system.start_checkout(sample_items()).expect("cart is valid");
  assert_eq!(h.system.current_step(), WizardStep::CartReview);
  assert!(h.system.view().open);

  assert_eq!(h.system.next_step().expect("cart validates"), WizardStep::CustomerData);

  let missing = h.system.next_step();
  assert!(matches!(missing, Err(CheckoutError::Validation(_))));
  assert_eq!(h.system.current_step(), WizardStep::CustomerData);
  assert!(h.system.view().error.is_some());

  let mut customer = sample_customer();
  customer.email = "mara-at-example.com".to_string();
  h.system.set_customer(customer);
  assert!(matches!(h.system.next_step(), Err(CheckoutError::Validation(_))));
  assert_eq!(h.system.current_step(), WizardStep::CustomerData);

  h.system.set_customer(sample_customer());
  assert_eq!(h.system.next_step().expect("customer validates"), WizardStep::PaymentMethod);
  assert!(h.system.view().error.is_none());

  assert!(matches!(h.system.next_step(), Err(CheckoutError::InvalidState(_))));
  assert_eq!(h.system.current_step(), WizardStep::PaymentMethod);

  assert_eq!(h.system.prev_step(), WizardStep::CustomerData);
  assert_eq!(h.system.prev_step(), WizardStep::CartReview);
  assert_eq!(h.system.prev_step(), WizardStep::CartReview);
}

#[tokio::test]
async fn test_start_checkout_rejects_unusable_carts() {
  setup_tracing();
  let h = harness();
  assert!(matches!(h.system.start_checkout(Vec::new()), Err(CheckoutError::Validation(_))));

  let zero = vec![LineItem::new("x", "Empty Glass", dec!(3.90), 0)];
  assert!(matches!(h.system.start_checkout(zero), Err(CheckoutError::Validation(_))));
  assert!(!h.system.view().open);
}

#[tokio::test]
async fn test_prev_step_cannot_leave_processing() {
  setup_tracing();
  let h = harness().at_payment_step();
  h.system.place_order().await.expect("session created");
  assert_eq!(h.system.current_step(), WizardStep::Processing);
  assert_eq!(h.system.prev_step(), WizardStep::Processing);
}

#[tokio::test]
async fn test_totals_include_delivery_fee() {
  let h = harness().at_payment_step();
  let totals = h.system.totals();
  assert_eq!(totals.subtotal, dec!(7.80));
  assert_eq!(totals.total, dec!(10.30));
}

// --- Hosted checkout session ---

#[tokio::test(start_paused = true)]
async fn test_session_created_logs_once_and_redirects() {
  setup_tracing();
  let h = harness().at_payment_step();

  let created = h.system.place_order().await.expect("session created");

  assert_eq!(h.navigator.visited(), vec![created.redirect_url.clone()]);
  assert_eq!(h.count_event("order_initiated"), 1);
  assert_eq!(h.count_event("stripe_session_created"), 1);
  let logs = h.system.logs();
  let session_entry = logs
    .iter()
    .find(|e| e["event"] == "stripe_session_created")
    .expect("session logged");
  assert_eq!(session_entry["sessionId"], created.session_id.as_str());
  assert_eq!(session_entry["orderId"], created.order_id.as_str());

  let initiated = logs.iter().find(|e| e["event"] == "order_initiated").expect("initiation logged");
  assert_eq!(initiated["amount"].as_f64(), Some(10.3));
  assert_eq!(initiated["paymentMethod"], "card");

  assert_eq!(h.system.payment_state(), Some(PaymentState::Pending));
  assert!(!h.system.view().order_button_enabled);
  assert_eq!(h.system.active_timers(), 0);

  sleep(secs(15 * 60)).await;
  assert_eq!(h.provider.status_polls(), 0);
  assert_eq!(h.provider.webhook_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_session_error_fails_payment_without_polling() {
  setup_tracing();
  let h = harness().at_payment_step();
  h.provider.fail_next_session("HTTP 500: stripe unavailable");

  let result = h.system.place_order().await;

  assert!(matches!(result, Err(CheckoutError::SessionCreation(_))));
  assert_eq!(h.system.payment_state(), Some(PaymentState::Failed));
  let history = h.system.history();
  assert_eq!(history.len(), 1);
  assert_eq!((history[0].from, history[0].to), (PaymentState::Pending, PaymentState::Failed));

  let view = h.system.view();
  assert!(view.order_button_enabled);
  assert_eq!(view.step, WizardStep::PaymentMethod);
  assert!(view.error.is_some());
  assert_eq!(view.status.map(|s| s.kind), Some(StatusKind::PaymentFailed));

  assert_eq!(h.count_event("order_failed"), 1);
  assert_eq!(h.count_event("stripe_session_created"), 0);
  assert!(h.navigator.visited().is_empty());
  assert_eq!(h.system.active_timers(), 0);

  sleep(secs(15 * 60)).await;
  assert_eq!(h.provider.status_polls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_session_without_redirect_url_is_a_failure() {
  setup_tracing();
  let h = harness().at_payment_step();
  h.provider.push_session(CheckoutSessionCreated {
    session_id: "cs_missing_url".to_string(),
    redirect_url: String::new(),
    order_id: "order_1".to_string(),
    order_number: "SUN000001".to_string(),
  });

  assert!(matches!(h.system.place_order().await, Err(CheckoutError::SessionCreation(_))));
  assert_eq!(h.system.payment_state(), Some(PaymentState::Failed));
  assert!(h.navigator.visited().is_empty());
}

#[tokio::test]
async fn test_place_order_requires_payment_method_step() {
  setup_tracing();
  let h = harness();
  h.system.start_checkout(sample_items()).expect("cart is valid");

  assert!(matches!(h.system.place_order().await, Err(CheckoutError::InvalidState(_))));
  assert_eq!(h.system.payment_state(), None);
  assert!(h.provider.calls().is_empty());
}

#[tokio::test]
async fn test_place_order_can_be_retried_after_session_failure() {
  setup_tracing();
  let h = harness().at_payment_step();
  h.provider.fail_next_session("timeout");
  assert!(h.system.place_order().await.is_err());

  let created = h.system.place_order().await.expect("second attempt succeeds");
  assert_eq!(h.navigator.last(), Some(created.redirect_url));
  assert_eq!(h.system.payment_state(), Some(PaymentState::Pending));
  assert_eq!(h.count_event("order_initiated"), 2);
}

#[tokio::test]
async fn test_confirm_return_paid_settles_payment() {
  setup_tracing();
  let h = harness().at_payment_step();
  let created = h.system.place_order().await.expect("session created");

  let status = h.system.confirm_return(&created.session_id).await.expect("status fetched");

  assert!(status.is_paid());
  assert_eq!(h.system.payment_state(), Some(PaymentState::Paid));
  let transitions: Vec<_> = h.system.history().iter().map(|r| (r.from, r.to)).collect();
  assert_eq!(
    transitions,
    vec![
      (PaymentState::Pending, PaymentState::Processing),
      (PaymentState::Processing, PaymentState::Paid)
    ]
  );
  let confirmation = h.system.view().confirmation.expect("confirmation shown");
  assert_eq!(Some(confirmation.order_number), h.system.order_number());
  assert_eq!(confirmation.total, Some(dec!(10.30)));
  assert_eq!(confirmation.payment_id, None);
  let success = h
    .system
    .logs()
    .into_iter()
    .find(|entry| entry["event"] == "payment_success")
    .expect("success logged");
  assert!(success["paymentId"].is_null());
  assert_eq!(success["sessionId"], created.session_id.as_str());

  h.system.confirm_return(&created.session_id).await.expect("status fetched");
  assert_eq!(h.count_event("payment_success"), 1);
}

#[tokio::test]
async fn test_confirm_return_unsettled_and_failed_sessions() {
  setup_tracing();
  let h = harness().at_payment_step();
  let created = h.system.place_order().await.expect("session created");

  h.provider.push_session_status("unpaid");
  h.system.confirm_return(&created.session_id).await.expect("status fetched");
  assert_eq!(h.system.payment_state(), Some(PaymentState::Pending));

  h.provider.push_session_status("expired");
  h.system.confirm_return(&created.session_id).await.expect("status fetched");
  assert_eq!(h.system.payment_state(), Some(PaymentState::Failed));
  assert_eq!(h.count_event("payment_failed"), 1);
}

#[tokio::test]
async fn test_confirm_return_on_fresh_system() {
  setup_tracing();
  let h = harness();

  h.system.confirm_return("cs_from_redirect").await.expect("status fetched");

  assert_eq!(h.system.payment_state(), Some(PaymentState::Paid));
  assert_eq!(h.system.order_number().as_deref(), Some("cs_from_redirect"));
  assert!(h.system.view().confirmation.is_some());
}

// --- In-page payment monitoring ---

#[tokio::test(start_paused = true)]
async fn test_polling_ceiling_times_out_and_stops() {
  setup_tracing();
  let h = harness_with(CheckoutConfig {
    max_polls: 3,
    ..test_config()
  })
  .at_payment_step();

  h.system.process_payment().await.expect("payment initialized");
  assert_eq!(h.system.payment_state(), Some(PaymentState::Processing));
  assert_eq!(h.system.active_timers(), 2);

  sleep(secs(61)).await;
  assert_eq!(h.provider.status_polls(), 2);
  assert_eq!(h.system.payment_state(), Some(PaymentState::Processing));
  assert_eq!(h.system.view().status.map(|s| s.message), Some("Status wird überprüft... (2/3)".to_string()));

  sleep(secs(30)).await;
  assert_eq!(h.provider.status_polls(), 3);
  assert_eq!(h.system.payment_state(), Some(PaymentState::Timeout));
  assert_eq!(h.system.active_timers(), 0);
  assert_eq!(h.count_event("payment_timeout"), 1);

  let view = h.system.view();
  assert_eq!(view.status.map(|s| s.kind), Some(StatusKind::PaymentTimeout));
  assert_eq!(view.step, WizardStep::PaymentMethod);
  assert!(view.order_button_enabled);

  sleep(secs(30 * 60)).await;
  assert_eq!(h.provider.status_polls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_completed_poll_pays() {
  setup_tracing();
  let h = harness().at_payment_step();
  h.provider.push_payment_status(RemotePaymentStatus::Pending);
  h.provider.push_payment_status(RemotePaymentStatus::Completed);

  let payment_id = h.system.process_payment().await.expect("payment initialized");
  sleep(secs(61)).await;

  assert_eq!(h.system.payment_state(), Some(PaymentState::Paid));
  assert_eq!(h.provider.status_polls(), 2);
  assert_eq!(h.count_event("payment_success"), 1);
  let confirmation = h.system.view().confirmation.expect("confirmation shown");
  assert_eq!(confirmation.payment_id, Some(payment_id));
  assert_eq!(confirmation.total, Some(dec!(10.30)));

  sleep(secs(30 * 60)).await;
  assert_eq!(h.provider.status_polls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_poll_fails_payment() {
  setup_tracing();
  let h = harness().at_payment_step();
  h.provider.push_payment_status(RemotePaymentStatus::Failed);

  h.system.process_payment().await.expect("payment initialized");
  sleep(secs(31)).await;

  assert_eq!(h.system.payment_state(), Some(PaymentState::Failed));
  assert_eq!(h.count_event("payment_failed"), 1);
  let error = h.system.view().error.expect("error shown");
  assert!(error.starts_with("Zahlung fehlgeschlagen"));
  assert_eq!(h.system.active_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_poll_transport_errors_are_tolerated_until_ceiling() {
  setup_tracing();
  let h = harness_with(CheckoutConfig {
    max_polls: 2,
    ..test_config()
  })
  .at_payment_step();
  h.provider.fail_next_payment_status("connection reset");
  h.provider.fail_next_payment_status("connection reset");

  h.system.process_payment().await.expect("payment initialized");

  sleep(secs(31)).await;
  assert_eq!(h.system.payment_state(), Some(PaymentState::Processing));

  sleep(secs(30)).await;
  assert_eq!(h.system.payment_state(), Some(PaymentState::Timeout));
  assert_eq!(h.count_event("payment_failed"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_webhook_delivery_completes_payment() {
  setup_tracing();
  let h = harness().at_payment_step();
  h.provider.set_default_webhook(WebhookDelivery::Delivered);

  let payment_id = h.system.process_payment().await.expect("payment initialized");
  sleep(secs(6)).await;

  assert_eq!(h.system.payment_state(), Some(PaymentState::Paid));
  assert_eq!(h.provider.webhook_attempts(), 1);
  assert_eq!(h.provider.status_polls(), 0);
  assert_eq!(h.count_event("webhook_success"), 1);
  assert_eq!(h.count_event("payment_success"), 1);

  // A late duplicate confirmation is logged but changes nothing.
  h.system.handle_webhook_success(&payment_id);
  assert_eq!(h.system.payment_state(), Some(PaymentState::Paid));
  assert_eq!(h.count_event("webhook_success"), 2);
  assert_eq!(h.count_event("payment_success"), 1);
  assert_eq!(h.system.history().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_webhook_retries_are_capped() {
  setup_tracing();
  let h = harness().at_payment_step();

  h.system.process_payment().await.expect("payment initialized");
  sleep(secs(5 * 60)).await;

  assert_eq!(h.provider.webhook_attempts(), 4);
  let retry_counts: Vec<i64> = h
    .system
    .logs()
    .iter()
    .filter(|e| e["event"] == "webhook_failure")
    .filter_map(|e| e["retryCount"].as_i64())
    .collect();
  assert_eq!(retry_counts, vec![0, 1, 2, 3]);
  assert_eq!(h.system.payment_state(), Some(PaymentState::Processing));
}

#[tokio::test(start_paused = true)]
async fn test_poll_and_webhook_race_settles_once() {
  setup_tracing();
  let h = harness_with(CheckoutConfig {
    webhook_delay_min: secs(30),
    webhook_delay_max: secs(30),
    ..test_config()
  })
  .at_payment_step();
  h.provider.set_default_webhook(WebhookDelivery::Delivered);
  h.provider.push_payment_status(RemotePaymentStatus::Completed);

  h.system.process_payment().await.expect("payment initialized");
  sleep(secs(31)).await;

  assert_eq!(h.system.payment_state(), Some(PaymentState::Paid));
  assert_eq!(h.count_event("payment_success"), 1);
  assert_eq!(PaymentStateMachine::replay(&h.system.history()), Some(PaymentState::Paid));
}

#[tokio::test(start_paused = true)]
async fn test_close_checkout_stops_all_timers() {
  setup_tracing();
  let h = harness().at_payment_step();

  h.system.process_payment().await.expect("payment initialized");
  sleep(secs(31)).await;
  let polls = h.provider.status_polls();
  let webhooks = h.provider.webhook_attempts();
  assert_eq!(polls, 1);
  assert_eq!(webhooks, 2);

  h.system.close_checkout();
  assert!(!h.system.view().open);
  assert_eq!(h.system.active_timers(), 0);

  sleep(secs(30 * 60)).await;
  assert_eq!(h.provider.status_polls(), polls);
  assert_eq!(h.provider.webhook_attempts(), webhooks);
  assert_eq!(h.system.payment_state(), Some(PaymentState::Processing));
}

#[tokio::test(start_paused = true)]
async fn test_close_during_initialization_starts_no_monitoring() {
  setup_tracing();
  let h = harness_with_provider(test_config(), FakePaymentProvider::new().with_latency(secs(2))).at_payment_step();

  let system = h.system.clone();
  let in_flight = tokio::spawn(async move { system.process_payment().await });
  sleep(Duration::from_millis(500)).await;
  h.system.close_checkout();

  let result = in_flight.await.expect("task finished");
  assert!(matches!(result, Err(CheckoutError::InvalidState(_))), "{:?}", result);
  assert_eq!(h.system.active_timers(), 0);

  sleep(secs(10 * 60)).await;
  assert_eq!(h.provider.status_polls(), 0);
  assert_eq!(h.provider.webhook_attempts(), 0);
  assert_eq!(h.system.active_timers(), 0);
  assert_eq!(h.system.payment_state(), Some(PaymentState::Pending));
}

#[tokio::test(start_paused = true)]
async fn test_restarted_checkout_ignores_late_initialization() {
  setup_tracing();
  let h = harness_with_provider(test_config(), FakePaymentProvider::new().with_latency(secs(2))).at_payment_step();

  let system = h.system.clone();
  let in_flight = tokio::spawn(async move { system.process_payment().await });
  sleep(Duration::from_millis(500)).await;
  h.system.start_checkout(sample_items()).expect("sample cart is valid");

  let result = in_flight.await.expect("task finished");
  assert!(matches!(result, Err(CheckoutError::InvalidState(_))), "{:?}", result);
  assert_eq!(h.system.payment_state(), None);
  assert_eq!(h.system.payment_id(), None);
  assert_eq!(h.system.current_step(), WizardStep::CartReview);

  sleep(secs(10 * 60)).await;
  assert_eq!(h.provider.status_polls(), 0);
  assert_eq!(h.system.active_timers(), 0);
  assert_eq!(h.count_event("payment_failed"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_sees_final_state() {
  setup_tracing();
  let h = harness().at_payment_step();
  h.provider.set_default_webhook(WebhookDelivery::Delivered);
  let mut states = h.system.subscribe();

  h.system.process_payment().await.expect("payment initialized");
  let seen = states
    .wait_for(|state| *state == Some(PaymentState::Paid))
    .await
    .expect("sender alive");
  assert_eq!(*seen, Some(PaymentState::Paid));
}

// --- Retry ---

#[tokio::test(start_paused = true)]
async fn test_retry_after_failed_initialization_reaches_paid() {
  setup_tracing();
  let h = harness().at_payment_step();
  h.provider.fail_next_payment_init("Payment provider temporarily unavailable");

  assert!(h.system.process_payment().await.is_err());
  assert_eq!(h.system.payment_state(), Some(PaymentState::Failed));
  assert_eq!(h.count_event("payment_failed"), 1);

  h.provider.push_payment_status(RemotePaymentStatus::Completed);
  h.system.retry_payment().await.expect("retry started");
  assert_eq!(h.system.payment_state(), Some(PaymentState::Processing));

  sleep(secs(31)).await;
  assert_eq!(h.system.payment_state(), Some(PaymentState::Paid));
  assert_eq!(h.count_event("payment_retry"), 1);

  let transitions: Vec<_> = h.system.history().iter().map(|r| (r.from, r.to)).collect();
  assert_eq!(
    transitions,
    vec![
      (PaymentState::Pending, PaymentState::Failed),
      (PaymentState::Failed, PaymentState::Pending),
      (PaymentState::Pending, PaymentState::Processing),
      (PaymentState::Processing, PaymentState::Paid),
    ]
  );
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_timeout_opens_new_payment() {
  setup_tracing();
  let h = harness_with(CheckoutConfig {
    max_polls: 1,
    ..test_config()
  })
  .at_payment_step();

  let first = h.system.process_payment().await.expect("payment initialized");
  sleep(secs(31)).await;
  assert_eq!(h.system.payment_state(), Some(PaymentState::Timeout));

  h.provider.push_payment_status(RemotePaymentStatus::Completed);
  let second = h.system.retry_payment().await.expect("retry started");
  assert_ne!(first, second);
  assert!(h
    .provider
    .calls()
    .contains(&ProviderCall::RetryPayment { payment_id: first.clone() }));
  assert_eq!(h.system.payment_id(), Some(second));

  sleep(secs(31)).await;
  assert_eq!(h.system.payment_state(), Some(PaymentState::Paid));
}

#[tokio::test(start_paused = true)]
async fn test_retry_is_rejected_while_processing() {
  setup_tracing();
  let h = harness().at_payment_step();
  h.system.process_payment().await.expect("payment initialized");

  assert!(matches!(h.system.retry_payment().await, Err(CheckoutError::InvalidState(_))));
  assert_eq!(h.system.payment_state(), Some(PaymentState::Processing));
  assert_eq!(h.count_event("payment_retry"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_expired_return_places_new_order() {
  setup_tracing();
  let h = harness().at_payment_step();
  h.provider.push_session_status("expired");

  h.system.confirm_return("cs_returning").await.expect("status fetched");
  assert_eq!(h.system.payment_state(), Some(PaymentState::Failed));
  assert_eq!(h.system.current_step(), WizardStep::PaymentMethod);

  let payment_id = h.system.retry_payment().await.expect("new order placed");

  assert_eq!(h.system.payment_state(), Some(PaymentState::Processing));
  assert_eq!(h.system.payment_id(), Some(payment_id));
  let order_number = h.system.order_number().expect("attempt exists");
  assert!(order_number.starts_with("SUN"), "{}", order_number);
  assert_eq!(h.count_event("order_initiated"), 1);
  assert_eq!(h.count_event("payment_retry"), 1);
  assert!(!h.system.view().order_button_enabled);
}

#[tokio::test]
async fn test_refused_retry_leaves_checkout_usable() {
  setup_tracing();
  let h = harness();
  h.provider.push_session_status("expired");
  h.system.confirm_return("cs_returning").await.expect("status fetched");

  let result = h.system.retry_payment().await;

  assert!(matches!(result, Err(CheckoutError::Validation(_))), "{:?}", result);
  assert_eq!(h.system.payment_state(), Some(PaymentState::Failed));
  let view = h.system.view();
  assert_eq!(view.step, WizardStep::PaymentMethod);
  assert!(view.order_button_enabled);
  assert_eq!(h.system.prev_step(), WizardStep::CustomerData);
  assert_eq!(h.count_event("payment_retry"), 0);
  assert!(h
    .provider
    .calls()
    .iter()
    .all(|call| !matches!(call, ProviderCall::InitializePayment { .. })));
}
