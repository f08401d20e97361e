// core/src/provider/mod.rs

//! The remote payment capability consumed by the checkout orchestration.
//!
//! [`HttpPaymentProvider`] talks to the shop backend; [`FakePaymentProvider`] answers from
//! scripted queues so that timer-driven flows can be tested deterministically.

pub mod fake;
pub mod http;

pub use fake::{FakePaymentProvider, ProviderCall};
pub use http::HttpPaymentProvider;

use crate::error::CheckoutResult;
use crate::order::OrderDraft;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Returned by checkout session creation. `redirect_url` points at the provider-hosted page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionCreated {
  pub session_id: String,
  #[serde(rename = "sessionUrl")]
  pub redirect_url: String,
  pub order_id: String,
  pub order_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
  pub session_id: String,
  /// Provider vocabulary: `paid`, `unpaid`, `no_payment_required`, or a failure such as `failed`/`expired`.
  pub payment_status: String,
  #[serde(default)]
  pub order_id: Option<String>,
  #[serde(default)]
  pub order_number: Option<String>,
}

impl SessionStatus {
  pub fn is_paid(&self) -> bool {
    matches!(self.payment_status.as_str(), "paid" | "no_payment_required")
  }

  pub fn is_failed(&self) -> bool {
    matches!(self.payment_status.as_str(), "failed" | "expired" | "canceled" | "cancelled")
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInit {
  pub payment_id: String,
  pub status: RemotePaymentStatus,
  #[serde(default)]
  pub redirect_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemotePaymentStatus {
  Pending,
  Completed,
  #[serde(alias = "cancelled")]
  Failed,
}

impl fmt::Display for RemotePaymentStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      RemotePaymentStatus::Pending => "pending",
      RemotePaymentStatus::Completed => "completed",
      RemotePaymentStatus::Failed => "failed",
    })
  }
}

/// Outcome of one provider-initiated confirmation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookDelivery {
  Delivered,
  Failed,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
  /// Persists the order server-side and opens a hosted checkout session for it.
  async fn create_checkout_session(&self, draft: &OrderDraft) -> CheckoutResult<CheckoutSessionCreated>;

  async fn get_session_status(&self, session_id: &str) -> CheckoutResult<SessionStatus>;

  /// Starts an in-page payment whose outcome is then monitored by polling and webhooks.
  async fn initialize_payment(&self, draft: &OrderDraft) -> CheckoutResult<PaymentInit>;

  /// Opens a fresh attempt for a failed payment. The returned id replaces `payment_id`.
  async fn retry_payment(&self, payment_id: &str, order_id: &str) -> CheckoutResult<PaymentInit>;

  async fn get_payment_status(&self, payment_id: &str) -> CheckoutResult<RemotePaymentStatus>;

  /// One webhook delivery attempt for `payment_id`.
  async fn deliver_webhook(&self, payment_id: &str) -> CheckoutResult<WebhookDelivery>;
}
