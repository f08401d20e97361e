// core/src/provider/fake.rs

//! A scripted, in-process [`PaymentProvider`].
//!
//! Each operation pops the next scripted answer from its queue and falls back to a fixed
//! default once the queue is empty. Every call is recorded so tests can assert on how often
//! the orchestration reached out and with what.

use super::{CheckoutSessionCreated, PaymentInit, PaymentProvider, RemotePaymentStatus, SessionStatus, WebhookDelivery};
use crate::error::{CheckoutError, CheckoutResult};
use crate::order::OrderDraft;
use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
  CreateCheckoutSession { order_number: String },
  GetSessionStatus { session_id: String },
  InitializePayment { order_number: String },
  RetryPayment { payment_id: String },
  GetPaymentStatus { payment_id: String },
  DeliverWebhook { payment_id: String },
}

/// `Err(message)` entries are returned as a provider failure carrying `message`.
type Scripted<T> = Result<T, String>;

#[derive(Debug)]
struct FakeState {
  sessions: VecDeque<Scripted<CheckoutSessionCreated>>,
  session_statuses: VecDeque<Scripted<String>>,
  payment_inits: VecDeque<Scripted<PaymentInit>>,
  payment_statuses: VecDeque<Scripted<RemotePaymentStatus>>,
  webhooks: VecDeque<Scripted<WebhookDelivery>>,
  default_payment_status: RemotePaymentStatus,
  default_webhook: WebhookDelivery,
  issued: u32,
  calls: Vec<ProviderCall>,
}

#[derive(Debug)]
pub struct FakePaymentProvider {
  state: Mutex<FakeState>,
  latency: Duration,
}

impl Default for FakePaymentProvider {
  fn default() -> Self {
    Self::new()
  }
}

impl FakePaymentProvider {
  /// Sessions and payments succeed, payments stay `pending`, webhooks are never delivered.
  pub fn new() -> Self {
    Self {
      state: Mutex::new(FakeState {
        sessions: VecDeque::new(),
        session_statuses: VecDeque::new(),
        payment_inits: VecDeque::new(),
        payment_statuses: VecDeque::new(),
        webhooks: VecDeque::new(),
        default_payment_status: RemotePaymentStatus::Pending,
        default_webhook: WebhookDelivery::Failed,
        issued: 0,
        calls: Vec::new(),
      }),
      latency: Duration::ZERO,
    }
  }

  /// Every call sleeps for `latency` before answering.
  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = latency;
    self
  }

  pub fn push_session(&self, session: CheckoutSessionCreated) -> &Self {
    self.state.lock().sessions.push_back(Ok(session));
    self
  }

  pub fn fail_next_session(&self, message: &str) -> &Self {
    self.state.lock().sessions.push_back(Err(message.to_string()));
    self
  }

  pub fn push_session_status(&self, payment_status: &str) -> &Self {
    self.state.lock().session_statuses.push_back(Ok(payment_status.to_string()));
    self
  }

  pub fn fail_next_payment_init(&self, message: &str) -> &Self {
    self.state.lock().payment_inits.push_back(Err(message.to_string()));
    self
  }

  pub fn push_payment_status(&self, status: RemotePaymentStatus) -> &Self {
    self.state.lock().payment_statuses.push_back(Ok(status));
    self
  }

  /// The next status poll fails at the transport level.
  pub fn fail_next_payment_status(&self, message: &str) -> &Self {
    self.state.lock().payment_statuses.push_back(Err(message.to_string()));
    self
  }

  pub fn set_default_payment_status(&self, status: RemotePaymentStatus) -> &Self {
    self.state.lock().default_payment_status = status;
    self
  }

  pub fn push_webhook(&self, outcome: WebhookDelivery) -> &Self {
    self.state.lock().webhooks.push_back(Ok(outcome));
    self
  }

  pub fn set_default_webhook(&self, outcome: WebhookDelivery) -> &Self {
    self.state.lock().default_webhook = outcome;
    self
  }

  pub fn calls(&self) -> Vec<ProviderCall> {
    self.state.lock().calls.clone()
  }

  pub fn status_polls(&self) -> usize {
    self.count(|call| matches!(call, ProviderCall::GetPaymentStatus { .. }))
  }

  pub fn webhook_attempts(&self) -> usize {
    self.count(|call| matches!(call, ProviderCall::DeliverWebhook { .. }))
  }

  pub fn count(&self, predicate: impl Fn(&ProviderCall) -> bool) -> usize {
    self.state.lock().calls.iter().filter(|call| predicate(call)).count()
  }

  async fn simulate_latency(&self) {
    if !self.latency.is_zero() {
      tokio::time::sleep(self.latency).await;
    }
  }
}

fn scripted<T>(operation: &'static str, answer: Scripted<T>) -> CheckoutResult<T> {
  answer.map_err(|message| CheckoutError::provider(operation, anyhow!(message)))
}

#[async_trait]
impl PaymentProvider for FakePaymentProvider {
  async fn create_checkout_session(&self, draft: &OrderDraft) -> CheckoutResult<CheckoutSessionCreated> {
    self.simulate_latency().await;
    let answer = {
      let mut state = self.state.lock();
      state.calls.push(ProviderCall::CreateCheckoutSession {
        order_number: draft.order_number.clone(),
      });
      state.sessions.pop_front().unwrap_or_else(|| {
        let session_id = format!("cs_fake_{}", Uuid::new_v4().simple());
        Ok(CheckoutSessionCreated {
          redirect_url: format!("https://checkout.fake/pay/{}", session_id),
          session_id,
          order_id: Uuid::new_v4().to_string(),
          order_number: draft.order_number.clone(),
        })
      })
    };
    info!(order_number = %draft.order_number, ok = answer.is_ok(), "Fake provider: checkout session requested.");
    scripted("create_checkout_session", answer)
  }

  async fn get_session_status(&self, session_id: &str) -> CheckoutResult<SessionStatus> {
    self.simulate_latency().await;
    let answer = {
      let mut state = self.state.lock();
      state.calls.push(ProviderCall::GetSessionStatus {
        session_id: session_id.to_string(),
      });
      state.session_statuses.pop_front().unwrap_or_else(|| Ok("paid".to_string()))
    };
    scripted("get_session_status", answer).map(|payment_status| SessionStatus {
      session_id: session_id.to_string(),
      payment_status,
      order_id: None,
      order_number: None,
    })
  }

  async fn initialize_payment(&self, draft: &OrderDraft) -> CheckoutResult<PaymentInit> {
    self.simulate_latency().await;
    let answer = {
      let mut state = self.state.lock();
      state.calls.push(ProviderCall::InitializePayment {
        order_number: draft.order_number.clone(),
      });
      state.issued += 1;
      let issued = state.issued;
      state.payment_inits.pop_front().unwrap_or_else(|| {
        Ok(PaymentInit {
          payment_id: format!("PAY{:08}", issued),
          status: RemotePaymentStatus::Pending,
          redirect_url: None,
        })
      })
    };
    debug!(order_number = %draft.order_number, ok = answer.is_ok(), "Fake provider: payment initialized.");
    scripted("initialize_payment", answer)
  }

  async fn retry_payment(&self, payment_id: &str, _order_id: &str) -> CheckoutResult<PaymentInit> {
    self.simulate_latency().await;
    let answer = {
      let mut state = self.state.lock();
      state.calls.push(ProviderCall::RetryPayment {
        payment_id: payment_id.to_string(),
      });
      state.issued += 1;
      let issued = state.issued;
      state.payment_inits.pop_front().unwrap_or_else(|| {
        Ok(PaymentInit {
          payment_id: format!("PAY{:08}", issued),
          status: RemotePaymentStatus::Pending,
          redirect_url: None,
        })
      })
    };
    scripted("retry_payment", answer)
  }

  async fn get_payment_status(&self, payment_id: &str) -> CheckoutResult<RemotePaymentStatus> {
    self.simulate_latency().await;
    let answer = {
      let mut state = self.state.lock();
      state.calls.push(ProviderCall::GetPaymentStatus {
        payment_id: payment_id.to_string(),
      });
      let fallback = state.default_payment_status;
      state.payment_statuses.pop_front().unwrap_or(Ok(fallback))
    };
    scripted("get_payment_status", answer)
  }

  async fn deliver_webhook(&self, payment_id: &str) -> CheckoutResult<WebhookDelivery> {
    self.simulate_latency().await;
    let answer = {
      let mut state = self.state.lock();
      state.calls.push(ProviderCall::DeliverWebhook {
        payment_id: payment_id.to_string(),
      });
      let fallback = state.default_webhook;
      state.webhooks.pop_front().unwrap_or(Ok(fallback))
    };
    scripted("deliver_webhook", answer)
  }
}
