// core/src/provider/http.rs

//! [`PaymentProvider`] backed by the shop backend's JSON API.
//!
//! Every endpoint answers with the envelope `{ "success": bool, "data": ..., "error": "..." }`.

use super::{CheckoutSessionCreated, PaymentInit, PaymentProvider, RemotePaymentStatus, SessionStatus, WebhookDelivery};
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, CheckoutResult};
use crate::order::OrderDraft;
use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
  #[serde(default)]
  success: bool,
  data: Option<T>,
  #[serde(default)]
  error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrderCreated {
  payment: PaymentInit,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentStatusBody {
  status: RemotePaymentStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetryBody {
  new_payment_id: String,
  status: RemotePaymentStatus,
}

#[derive(Debug, Clone)]
pub struct HttpPaymentProvider {
  client: Client,
  base_url: String,
}

impl HttpPaymentProvider {
  pub fn new(config: &CheckoutConfig) -> CheckoutResult<Self> {
    let client = Client::builder()
      .timeout(config.http_timeout)
      .build()
      .map_err(|e| CheckoutError::Config(format!("HTTP client could not be built: {}", e)))?;
    Ok(Self::with_client(client, &config.api_base_url))
  }

  pub fn with_client(client: Client, base_url: &str) -> Self {
    Self {
      client,
      base_url: base_url.trim_end_matches('/').to_string(),
    }
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url, path)
  }

  async fn send<T: DeserializeOwned>(&self, operation: &'static str, request: RequestBuilder) -> CheckoutResult<T> {
    let response = request.send().await.map_err(|e| CheckoutError::provider(operation, e))?;
    let status = response.status();
    let body = response.text().await.map_err(|e| CheckoutError::provider(operation, e))?;
    debug!(operation, %status, body_len = body.len(), "Backend responded.");

    // Error pages are often not JSON; the status decides before the body is trusted.
    if !status.is_success() {
      let reason = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&body)
        .ok()
        .and_then(|envelope| envelope.error)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
      warn!(operation, %status, reason = %reason, "Backend rejected request.");
      return Err(CheckoutError::provider(operation, anyhow!("HTTP {}: {}", status, reason)));
    }

    let envelope: ApiEnvelope<T> = serde_json::from_str(&body).map_err(|e| CheckoutError::MalformedResponse {
      operation,
      message: e.to_string(),
    })?;
    if !envelope.success {
      let reason = envelope.error.unwrap_or_else(|| "request was not successful".to_string());
      warn!(operation, reason = %reason, "Backend reported failure.");
      return Err(CheckoutError::provider(operation, anyhow!(reason)));
    }

    envelope.data.ok_or_else(|| CheckoutError::MalformedResponse {
      operation,
      message: "response has no data".to_string(),
    })
  }
}

#[async_trait]
impl PaymentProvider for HttpPaymentProvider {
  #[instrument(name = "HttpPaymentProvider::create_checkout_session", skip_all, fields(order_number = %draft.order_number))]
  async fn create_checkout_session(&self, draft: &OrderDraft) -> CheckoutResult<CheckoutSessionCreated> {
    let request = self
      .client
      .post(self.url("/api/stripe/create-checkout-session"))
      .json(&json!({ "orderData": draft }));
    self.send("create_checkout_session", request).await
  }

  #[instrument(name = "HttpPaymentProvider::get_session_status", skip(self))]
  async fn get_session_status(&self, session_id: &str) -> CheckoutResult<SessionStatus> {
    let request = self.client.get(self.url(&format!("/api/stripe/session/{}", session_id)));
    self.send("get_session_status", request).await
  }

  #[instrument(name = "HttpPaymentProvider::initialize_payment", skip_all, fields(order_number = %draft.order_number))]
  async fn initialize_payment(&self, draft: &OrderDraft) -> CheckoutResult<PaymentInit> {
    let request = self.client.post(self.url("/api/orders")).json(draft);
    let created: OrderCreated = self.send("initialize_payment", request).await?;
    Ok(created.payment)
  }

  #[instrument(name = "HttpPaymentProvider::retry_payment", skip(self))]
  async fn retry_payment(&self, payment_id: &str, order_id: &str) -> CheckoutResult<PaymentInit> {
    let request = self
      .client
      .post(self.url("/api/payments/retry"))
      .json(&json!({ "paymentId": payment_id, "orderId": order_id }));
    let body: RetryBody = self.send("retry_payment", request).await?;
    Ok(PaymentInit {
      payment_id: body.new_payment_id,
      status: body.status,
      redirect_url: None,
    })
  }

  #[instrument(name = "HttpPaymentProvider::get_payment_status", skip(self))]
  async fn get_payment_status(&self, payment_id: &str) -> CheckoutResult<RemotePaymentStatus> {
    let request = self.client.get(self.url(&format!("/api/payments/{}/status", payment_id)));
    let body: PaymentStatusBody = self.send("get_payment_status", request).await?;
    Ok(body.status)
  }

  /// Webhooks are delivered provider → backend. From the client's side a delivery has
  /// happened once the backend reports the payment as completed.
  #[instrument(name = "HttpPaymentProvider::deliver_webhook", skip(self))]
  async fn deliver_webhook(&self, payment_id: &str) -> CheckoutResult<WebhookDelivery> {
    match self.get_payment_status(payment_id).await? {
      RemotePaymentStatus::Completed => Ok(WebhookDelivery::Delivered),
      RemotePaymentStatus::Pending | RemotePaymentStatus::Failed => Ok(WebhookDelivery::Failed),
    }
  }
}
