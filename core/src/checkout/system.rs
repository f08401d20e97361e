// core/src/checkout/system.rs

//! The checkout orchestrator.
//!
//! `CheckoutSystem` owns the wizard, the current payment attempt and the timers that monitor
//! it. It is cheap to clone; clones share the same session. Two payment paths exist:
//!
//! - [`CheckoutSystem::place_order`] opens a provider-hosted checkout session and redirects
//!   the customer there. The outcome comes back through [`CheckoutSystem::confirm_return`].
//! - [`CheckoutSystem::process_payment`] starts an in-page payment, which is then settled by
//!   status polling and webhook confirmations running as tokio tasks.
//!
//! Every payment state change goes through [`PaymentStateMachine::transition`] under the
//! session's write lock, so when a poll and a webhook race, the first one to settle the
//! payment wins and the other becomes a rejected no-op.
//!
//! [`PaymentStateMachine::transition`]: crate::payment::PaymentStateMachine::transition

use super::navigator::Navigator;
use super::session::{CheckoutSession, PaymentSession, SharedSession};
use super::view::{
  CheckoutView, Confirmation, StatusKind, MSG_CONFIRMING_RETURN, MSG_CREATING_SESSION, MSG_ORDER_FAILED,
  MSG_PAYMENT_INITIATED, MSG_PAYMENT_PENDING, MSG_PAYMENT_SUCCESS, MSG_PAYMENT_TIMEOUT,
};
use super::wizard::{validate_step, WizardStep};
use crate::cart::Cart;
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, CheckoutResult};
use crate::order::{mint_order_number, Customer, LineItem, OrderDraft, OrderTotals, PaymentMethod};
use crate::payment::{PaymentLogger, PaymentState, TransitionRecord};
use crate::provider::{CheckoutSessionCreated, PaymentInit, PaymentProvider, RemotePaymentStatus, SessionStatus};
use crate::storage::SessionStorage;
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// What a settled attempt reports to the payment log and the confirmation.
struct SettledAttempt {
  order_number: String,
  session_id: Option<String>,
  order_date: Option<DateTime<Utc>>,
  total: Option<Decimal>,
}

/// How [`CheckoutSystem::retry_payment`] obtains the next payment.
enum RetryPlan {
  /// Ask the provider to replace a failed payment.
  Replace { previous: String, reference: String },
  Reinitialize(OrderDraft),
  /// No draft survived; place a fresh order from the wizard's data.
  NewOrder,
}

#[derive(Clone)]
pub struct CheckoutSystem {
  pub(super) config: Arc<CheckoutConfig>,
  pub(super) provider: Arc<dyn PaymentProvider>,
  navigator: Arc<dyn Navigator>,
  logger: PaymentLogger,
  pub(super) session: SharedSession,
  state_tx: Arc<watch::Sender<Option<PaymentState>>>,
}

impl CheckoutSystem {
  pub fn new(
    config: CheckoutConfig,
    provider: Arc<dyn PaymentProvider>,
    storage: Arc<dyn SessionStorage>,
    navigator: Arc<dyn Navigator>,
  ) -> Self {
    let logger = PaymentLogger::with_capacity(storage, config.log_capacity);
    let (state_tx, _) = watch::channel(None);
    Self {
      config: Arc::new(config),
      provider,
      navigator,
      logger,
      session: SharedSession::default(),
      state_tx: Arc::new(state_tx),
    }
  }

  pub fn config(&self) -> &CheckoutConfig {
    &self.config
  }

  // --- Wizard ---

  /// Opens the checkout for `items` at the first step. Any running payment attempt is dropped.
  pub fn start_checkout(&self, items: Vec<LineItem>) -> CheckoutResult<()> {
    validate_step(WizardStep::CartReview, &items, None)?;
    let cancelled = {
      let mut session = self.session.write();
      let cancelled = session.cancel_timers();
      session.items = items;
      session.payment = None;
      session.view = CheckoutView {
        open: true,
        ..CheckoutView::default()
      };
      cancelled
    };
    self.publish(None);
    info!(cancelled_timers = cancelled, "Checkout opened.");
    Ok(())
  }

  pub fn start_checkout_from_cart(&self, cart: &Cart) -> CheckoutResult<()> {
    self.start_checkout(cart.items().to_vec())
  }

  pub fn set_customer(&self, customer: Customer) {
    self.session.write().customer = Some(customer);
  }

  pub fn select_payment_method(&self, method: PaymentMethod) {
    self.session.write().payment_method = method;
  }

  pub fn payment_method(&self) -> PaymentMethod {
    self.session.read().payment_method
  }

  pub fn current_step(&self) -> WizardStep {
    self.session.read().view.step
  }

  /// Advances one step if the current one validates. A failed check is shown in the view and
  /// returned; the step does not change.
  pub fn next_step(&self) -> CheckoutResult<WizardStep> {
    let mut guard = self.session.write();
    let session = &mut *guard;
    let step = session.view.step;

    if let Err(e) = validate_step(step, &session.items, session.customer.as_ref()) {
      debug!(step = %step, error = %e, "Step did not validate.");
      session.view.error = Some(e.user_message());
      return Err(e);
    }
    let next = step.following().ok_or_else(|| {
      CheckoutError::InvalidState(format!("step '{}' is left by placing the order", step))
    })?;

    session.view.step = next;
    session.view.error = None;
    if next == WizardStep::PaymentMethod {
      let totals = OrderTotals::compute(&session.items, self.config.delivery_fee);
      debug!(subtotal = %totals.subtotal, total = %totals.total, "Order summary refreshed.");
    }
    Ok(next)
  }

  /// Goes back one step. Stays put on the first step and while processing.
  pub fn prev_step(&self) -> WizardStep {
    let mut session = self.session.write();
    if let Some(previous) = session.view.step.preceding() {
      session.view.step = previous;
      session.view.error = None;
    }
    session.view.step
  }

  pub fn totals(&self) -> OrderTotals {
    OrderTotals::compute(&self.session.read().items, self.config.delivery_fee)
  }

  // --- Hosted checkout session ---

  /// Opens a provider-hosted checkout session for the current cart and redirects to it.
  ///
  /// A failed session request settles the attempt as `failed`, re-enables the order control
  /// and is returned as [`CheckoutError::SessionCreation`]. It is never retried automatically.
  #[instrument(name = "CheckoutSystem::place_order", skip(self), err(Display))]
  pub async fn place_order(&self) -> CheckoutResult<CheckoutSessionCreated> {
    let draft = self.begin_attempt(StatusKind::CreatingSession, MSG_CREATING_SESSION)?;

    let created = match self.provider.create_checkout_session(&draft).await {
      Ok(created) if !created.redirect_url.trim().is_empty() => created,
      Ok(created) => {
        let error = CheckoutError::SessionCreation(format!("session '{}' has no redirect URL", created.session_id));
        self.fail_order(&draft.order_number, &error);
        return Err(error);
      }
      Err(e) => {
        let error = match e {
          CheckoutError::SessionCreation(_) => e,
          other => CheckoutError::SessionCreation(other.to_string()),
        };
        self.fail_order(&draft.order_number, &error);
        return Err(error);
      }
    };

    {
      let mut session = self.session.write();
      let payment = session
        .payment
        .as_mut()
        .filter(|payment| payment.order_number() == draft.order_number)
        .ok_or_else(|| CheckoutError::InvalidState("checkout was restarted while the session was created".to_string()))?;
      payment.session_id = Some(created.session_id.clone());
      payment.server_order_id = Some(created.order_id.clone());
    }

    self.logger.log(
      "stripe_session_created",
      json!({
        "orderId": created.order_id,
        "orderNumber": created.order_number,
        "sessionId": created.session_id,
      }),
    );
    self.navigator.redirect(&created.redirect_url);
    Ok(created)
  }

  /// Resolves the outcome after the customer comes back from the hosted checkout page.
  ///
  /// Works without a prior [`CheckoutSystem::place_order`] on this instance; the attempt is
  /// then rebuilt from the session status. A status that is neither paid nor failed leaves
  /// the payment untouched.
  #[instrument(name = "CheckoutSystem::confirm_return", skip(self), err(Display))]
  pub async fn confirm_return(&self, session_id: &str) -> CheckoutResult<SessionStatus> {
    {
      let mut session = self.session.write();
      let state = session.payment_state();
      session.view.open = true;
      session.view.step = WizardStep::Processing;
      session.view.show_status(StatusKind::ConfirmingReturn, MSG_CONFIRMING_RETURN, state);
    }

    let status = self.provider.get_session_status(session_id).await?;
    info!(payment_status = %status.payment_status, "Checkout session status received.");

    let state = {
      let mut guard = self.session.write();
      let session = &mut *guard;
      let payment = session.payment.get_or_insert_with(|| {
        PaymentSession::new(status.order_number.as_deref().unwrap_or(session_id), None)
      });
      payment.session_id = Some(session_id.to_string());
      if let Some(order_id) = &status.order_id {
        payment.server_order_id = Some(order_id.clone());
      }
      if status.is_paid() && payment.state() == PaymentState::Pending {
        payment.machine.transition(PaymentState::Processing);
      }
      payment.state()
    };
    self.publish(Some(state));

    if status.is_paid() {
      self.handle_payment_success(None);
    } else if status.is_failed() {
      self.handle_payment_failure(Some(session_id), &format!("checkout session {}", status.payment_status));
    } else {
      debug!(state = %state, "Session not settled yet; payment left unchanged.");
    }
    Ok(status)
  }

  // --- In-page payment ---

  /// Starts an in-page payment and its monitoring. Returns the provider's payment id.
  ///
  /// Reuses a pending attempt if there is one, otherwise places a new order from the
  /// payment-method step.
  #[instrument(name = "CheckoutSystem::process_payment", skip(self), err(Display))]
  pub async fn process_payment(&self) -> CheckoutResult<String> {
    let draft = match self.resume_pending_attempt() {
      Some(draft) => draft,
      None => self.begin_attempt(StatusKind::PaymentInitiated, MSG_PAYMENT_INITIATED)?,
    };
    self.initialize(&draft).await
  }

  /// Moves the attempt to `processing` and starts the status poller and the webhook task,
  /// replacing any timers of an earlier attempt.
  ///
  /// Refused while the checkout is closed.
  pub fn start_payment_monitoring(&self, payment_id: &str) -> CheckoutResult<()> {
    self.monitor_attempt(None, payment_id)
  }

  /// `expected_order` pins the attempt a provider call was made for; monitoring is refused
  /// if the checkout moved on to another attempt in the meantime.
  fn monitor_attempt(&self, expected_order: Option<&str>, payment_id: &str) -> CheckoutResult<()> {
    tokio::runtime::Handle::try_current()
      .map_err(|_| CheckoutError::InvalidState("payment monitoring needs a tokio runtime".to_string()))?;

    let cancelled = {
      let mut guard = self.session.write();
      let session = &mut *guard;
      if !session.view.open {
        return Err(CheckoutError::InvalidState("checkout was closed before monitoring started".to_string()));
      }
      let payment = session
        .payment
        .as_mut()
        .ok_or_else(|| CheckoutError::InvalidState("no payment attempt to monitor".to_string()))?;
      if expected_order.is_some_and(|expected| expected != payment.order_number()) {
        return Err(CheckoutError::InvalidState(
          "checkout was restarted while the payment was initialized".to_string(),
        ));
      }
      if !payment.machine.transition(PaymentState::Processing) {
        return Err(CheckoutError::InvalidState(format!(
          "payment in state '{}' cannot be monitored",
          payment.state()
        )));
      }
      payment.payment_id = Some(payment_id.to_string());
      payment.reset_counters();
      let cancelled = session.cancel_timers();
      session
        .view
        .show_status(StatusKind::PaymentPending, MSG_PAYMENT_PENDING, Some(PaymentState::Processing));
      self.spawn_monitors(session, payment_id);
      cancelled
    };

    self.publish(Some(PaymentState::Processing));
    info!(payment_id = %payment_id, replaced_timers = cancelled, "Payment monitoring started.");
    Ok(())
  }

  /// Starts a new attempt after `failed` or `timeout`.
  ///
  /// An attempt with a payment id asks the provider for a replacement payment; one with only
  /// an order draft initializes that draft again. Both re-enter `pending` on the same order
  /// number. An attempt rebuilt from a returning redirect has neither, so a fresh order is
  /// placed from the payment-method step instead. Nothing changes if the retry is refused.
  #[instrument(name = "CheckoutSystem::retry_payment", skip(self), err(Display))]
  pub async fn retry_payment(&self) -> CheckoutResult<String> {
    let (order_number, previous_payment_id, plan) = {
      let mut guard = self.session.write();
      let session = &mut *guard;
      let payment = session
        .payment
        .as_mut()
        .ok_or_else(|| CheckoutError::InvalidState("no payment attempt to retry".to_string()))?;
      let state = payment.state();
      if !payment.machine.can_transition_to(PaymentState::Pending) {
        return Err(CheckoutError::InvalidState(format!("payment in state '{}' cannot be retried", state)));
      }

      let order_number = payment.order_number().to_string();
      let previous_payment_id = payment.payment_id.clone();
      let plan = match (&previous_payment_id, &payment.draft) {
        (Some(previous), _) => RetryPlan::Replace {
          previous: previous.clone(),
          reference: payment.server_order_id.clone().unwrap_or_else(|| order_number.clone()),
        },
        (None, Some(draft)) => RetryPlan::Reinitialize(draft.clone()),
        (None, None) => RetryPlan::NewOrder,
      };

      if !matches!(plan, RetryPlan::NewOrder) {
        payment.machine.retry();
        payment.reset_counters();
        session.view.step = WizardStep::Processing;
        session.view.order_button_enabled = false;
        session.view.error = None;
        session.view.confirmation = None;
        session
          .view
          .show_status(StatusKind::PaymentInitiated, MSG_PAYMENT_INITIATED, Some(PaymentState::Pending));
      }
      (order_number, previous_payment_id, plan)
    };
    let retry_entry = json!({ "orderId": order_number, "previousPaymentId": previous_payment_id });

    match plan {
      RetryPlan::Replace { previous, reference } => {
        self.publish(Some(PaymentState::Pending));
        self.logger.log("payment_retry", retry_entry);
        let init = self.provider.retry_payment(&previous, &reference).await;
        self.monitor_initialized("retry_payment", &order_number, init)
      }
      RetryPlan::Reinitialize(draft) => {
        self.publish(Some(PaymentState::Pending));
        self.logger.log("payment_retry", retry_entry);
        self.initialize(&draft).await
      }
      RetryPlan::NewOrder => {
        let draft = self.begin_attempt(StatusKind::PaymentInitiated, MSG_PAYMENT_INITIATED)?;
        self.logger.log("payment_retry", retry_entry);
        self.initialize(&draft).await
      }
    }
  }

  /// Closes the checkout view and stops every poll and webhook task.
  pub fn close_checkout(&self) {
    let cancelled = {
      let mut session = self.session.write();
      session.view.open = false;
      session.cancel_timers()
    };
    info!(cancelled_timers = cancelled, "Checkout closed.");
  }

  // --- Observation ---

  pub fn view(&self) -> CheckoutView {
    self.session.read().view.clone()
  }

  pub fn payment_state(&self) -> Option<PaymentState> {
    self.session.read().payment_state()
  }

  /// Follows the payment state of the current attempt. `None` until an order is placed.
  pub fn subscribe(&self) -> watch::Receiver<Option<PaymentState>> {
    self.state_tx.subscribe()
  }

  pub fn history(&self) -> Vec<TransitionRecord> {
    self
      .session
      .read()
      .payment
      .as_ref()
      .map(|payment| payment.machine.history().to_vec())
      .unwrap_or_default()
  }

  pub fn payment_id(&self) -> Option<String> {
    self.session.read().payment.as_ref().and_then(|payment| payment.payment_id.clone())
  }

  pub fn order_number(&self) -> Option<String> {
    self
      .session
      .read()
      .payment
      .as_ref()
      .map(|payment| payment.order_number().to_string())
  }

  pub fn active_timers(&self) -> usize {
    self.session.read().active_timers()
  }

  /// The persisted payment event log, oldest first.
  pub fn logs(&self) -> Vec<JsonValue> {
    self.logger.entries()
  }

  // --- Outcome handlers ---

  /// A provider confirmation for `payment_id`. Completes the payment if it is still being
  /// monitored, otherwise only the event is logged.
  pub fn handle_webhook_success(&self, payment_id: &str) {
    let (order_number, completes) = {
      let session = self.session.read();
      match session.payment.as_ref() {
        Some(payment) => (
          Some(payment.order_number().to_string()),
          payment.state() == PaymentState::Processing && payment.payment_id.as_deref() == Some(payment_id),
        ),
        None => (None, false),
      }
    };

    self.logger.log(
      "webhook_success",
      json!({ "orderId": order_number, "paymentId": payment_id, "webhookType": "payment_completed" }),
    );
    if completes {
      self.handle_payment_success(Some(payment_id));
    }
  }

  /// Logs a failed webhook delivery. Returns whether another attempt should be scheduled.
  pub(super) fn handle_webhook_failure(&self, payment_id: &str) -> bool {
    let (order_number, retry_count, retry) = {
      let mut session = self.session.write();
      match session.payment.as_mut() {
        Some(payment) => {
          let retry_count = payment.webhook_retry_count;
          let retry = retry_count < self.config.webhook_max_retries && payment.state() == PaymentState::Processing;
          if retry {
            payment.webhook_retry_count += 1;
          }
          (Some(payment.order_number().to_string()), retry_count, retry)
        }
        None => (None, 0, false),
      }
    };

    self.logger.log(
      "webhook_failure",
      json!({ "orderId": order_number, "paymentId": payment_id, "retryCount": retry_count }),
    );
    retry
  }

  /// Counts one status poll. `None` once the attempt is no longer being monitored.
  pub(super) fn record_poll(&self) -> Option<u32> {
    let mut session = self.session.write();
    let payment = session.payment.as_mut()?;
    if payment.state() != PaymentState::Processing {
      return None;
    }
    payment.poll_count += 1;
    Some(payment.poll_count)
  }

  pub(super) fn show_polling_status(&self, poll_count: u32) {
    let mut session = self.session.write();
    let state = session.payment_state();
    let message = format!("Status wird überprüft... ({}/{})", poll_count, self.config.max_polls);
    session.view.show_status(StatusKind::PaymentPolling, message, state);
  }

  /// `payment_id` is `None` when the payment settled through a hosted checkout session.
  pub(super) fn handle_payment_success(&self, payment_id: Option<&str>) {
    let Some(attempt) = self.settle(PaymentState::Paid, |session, attempt| {
      session
        .view
        .show_status(StatusKind::PaymentSuccess, MSG_PAYMENT_SUCCESS, Some(PaymentState::Paid));
      session.view.error = None;
      session.view.confirmation = Some(Confirmation {
        order_number: attempt.order_number.clone(),
        order_date: attempt.order_date,
        total: attempt.total,
        payment_id: payment_id.map(str::to_string),
      });
    }) else {
      return;
    };

    self.logger.log(
      "payment_success",
      json!({
        "orderId": attempt.order_number,
        "paymentId": payment_id,
        "sessionId": attempt.session_id,
        "amount": attempt.total,
      }),
    );
  }

  pub(super) fn handle_payment_failure(&self, payment_id: Option<&str>, reason: &str) {
    let message = format!("Zahlung fehlgeschlagen: {}", reason);
    let Some(attempt) = self.settle(PaymentState::Failed, |session, _| {
      session
        .view
        .show_payment_error(StatusKind::PaymentFailed, message, Some(PaymentState::Failed));
    }) else {
      return;
    };

    self.logger.log(
      "payment_failed",
      json!({ "orderId": attempt.order_number, "paymentId": payment_id, "reason": reason }),
    );
  }

  pub(super) fn handle_payment_timeout(&self, payment_id: &str) {
    let Some(attempt) = self.settle(PaymentState::Timeout, |session, _| {
      session
        .view
        .show_payment_error(StatusKind::PaymentTimeout, MSG_PAYMENT_TIMEOUT, Some(PaymentState::Timeout));
    }) else {
      return;
    };

    self.logger.log(
      "payment_timeout",
      json!({ "orderId": attempt.order_number, "paymentId": payment_id }),
    );
  }

  // --- Internals ---

  /// Cancels the timers and moves the attempt to `target`. `update_view` only runs, and
  /// `Some` is only returned, if the transition was allowed.
  fn settle<F>(&self, target: PaymentState, update_view: F) -> Option<SettledAttempt>
  where
    F: FnOnce(&mut CheckoutSession, &SettledAttempt),
  {
    let attempt = {
      let mut guard = self.session.write();
      let session = &mut *guard;
      session.cancel_timers();
      let payment = session.payment.as_mut()?;
      if !payment.machine.transition(target) {
        return None;
      }
      let attempt = SettledAttempt {
        order_number: payment.order_number().to_string(),
        session_id: payment.session_id.clone(),
        order_date: payment.draft.as_ref().map(|draft| draft.order_date),
        total: payment.draft.as_ref().map(|draft| draft.totals.total),
      };
      update_view(session, &attempt);
      attempt
    };
    self.publish(Some(target));
    Some(attempt)
  }

  /// Validates the order, mints its number and opens a fresh payment attempt in `pending`.
  fn begin_attempt(&self, kind: StatusKind, message: &str) -> CheckoutResult<OrderDraft> {
    let draft = {
      let mut guard = self.session.write();
      let session = &mut *guard;
      let step = session.view.step;
      if step != WizardStep::PaymentMethod {
        return Err(CheckoutError::InvalidState(format!(
          "orders are placed from the payment-method step, not '{}'",
          step
        )));
      }
      if !session.view.order_button_enabled {
        return Err(CheckoutError::InvalidState("an order is already being placed".to_string()));
      }
      let checked = validate_step(WizardStep::CartReview, &session.items, None)
        .and_then(|_| validate_step(WizardStep::CustomerData, &session.items, session.customer.as_ref()));
      if let Err(e) = checked {
        session.view.error = Some(e.user_message());
        return Err(e);
      }
      let customer = session.customer.clone().unwrap_or_default();

      session.cancel_timers();
      let now = Utc::now();
      let order_number = mint_order_number(now);
      let draft = OrderDraft::new(
        order_number.clone(),
        now,
        session.items.clone(),
        customer,
        session.payment_method,
        self.config.delivery_fee,
      );
      session.payment = Some(PaymentSession::new(&order_number, Some(draft.clone())));

      session.view.step = WizardStep::Processing;
      session.view.order_button_enabled = false;
      session.view.error = None;
      session.view.confirmation = None;
      session.view.show_status(kind, message, Some(PaymentState::Pending));
      draft
    };

    self.logger.log(
      "order_initiated",
      json!({
        "orderId": draft.order_number,
        "paymentMethod": draft.payment_method,
        "amount": draft.totals.total,
        "customer": draft.customer,
      }),
    );
    self.publish(Some(PaymentState::Pending));
    Ok(draft)
  }

  /// The draft of an attempt still waiting in `pending`, with the view switched to processing.
  fn resume_pending_attempt(&self) -> Option<OrderDraft> {
    let mut guard = self.session.write();
    let session = &mut *guard;
    let payment = session.payment.as_ref()?;
    if payment.state() != PaymentState::Pending {
      return None;
    }
    let draft = payment.draft.clone()?;
    session.view.step = WizardStep::Processing;
    session.view.order_button_enabled = false;
    session
      .view
      .show_status(StatusKind::PaymentInitiated, MSG_PAYMENT_INITIATED, Some(PaymentState::Pending));
    Some(draft)
  }

  async fn initialize(&self, draft: &OrderDraft) -> CheckoutResult<String> {
    let init = self.provider.initialize_payment(draft).await;
    self.monitor_initialized("initialize_payment", &draft.order_number, init)
  }

  /// Settles the answer to a payment call made for `order_number`. An answer for an attempt
  /// that is no longer current only reports back; it never touches the newer attempt.
  fn monitor_initialized(
    &self,
    operation: &'static str,
    order_number: &str,
    init: CheckoutResult<PaymentInit>,
  ) -> CheckoutResult<String> {
    let current = self.order_number().as_deref() == Some(order_number);
    match init {
      Ok(init) if init.status != RemotePaymentStatus::Failed => {
        if let Err(e) = self.monitor_attempt(Some(order_number), &init.payment_id) {
          warn!(operation, payment_id = %init.payment_id, error = %e, "Initialized payment is not monitored.");
          return Err(e);
        }
        Ok(init.payment_id)
      }
      Ok(init) => {
        let reason = "payment was rejected by the provider";
        if current {
          self.handle_payment_failure(Some(&init.payment_id), reason);
        }
        Err(CheckoutError::provider(operation, anyhow!(reason)))
      }
      Err(e) => {
        warn!(operation, error = %e, current, "Payment could not be started.");
        if current {
          self.handle_payment_failure(None, &e.to_string());
        }
        Err(e)
      }
    }
  }

  fn fail_order(&self, order_number: &str, error: &CheckoutError) {
    warn!(order_number = %order_number, error = %error, "Order could not be placed.");
    let state = {
      let mut guard = self.session.write();
      let session = &mut *guard;
      let state = session.payment.as_mut().map(|payment| {
        payment.machine.transition(PaymentState::Failed);
        payment.state()
      });
      session
        .view
        .show_payment_error(StatusKind::PaymentFailed, MSG_ORDER_FAILED, state);
      state
    };

    self.logger.log(
      "order_failed",
      json!({ "orderId": order_number, "error": error.to_string() }),
    );
    self.publish(state);
  }

  fn publish(&self, state: Option<PaymentState>) {
    self.state_tx.send_replace(state);
  }
}
