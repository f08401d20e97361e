// core/src/checkout/view.rs

//! What the checkout modal shows. Rendering is left to the embedding page.

use super::wizard::WizardStep;
use crate::payment::PaymentState;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

pub const MSG_CREATING_SESSION: &str = "Zahlungssession wird erstellt...";
pub const MSG_PAYMENT_INITIATED: &str = "Zahlung wird initialisiert...";
pub const MSG_PAYMENT_PENDING: &str = "Zahlung wird verarbeitet...";
pub const MSG_CONFIRMING_RETURN: &str = "Zahlungsstatus wird überprüft...";
pub const MSG_PAYMENT_SUCCESS: &str = "Zahlung erfolgreich!";
pub const MSG_ORDER_FAILED: &str = "Es gab einen Fehler bei der Bestellung. Bitte versuchen Sie es erneut.";
pub const MSG_PAYMENT_TIMEOUT: &str = "Zahlung konnte nicht verarbeitet werden. Bitte versuchen Sie es erneut.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
  CreatingSession,
  PaymentInitiated,
  PaymentPending,
  PaymentPolling,
  ConfirmingReturn,
  PaymentSuccess,
  PaymentFailed,
  PaymentTimeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingStatus {
  pub kind: StatusKind,
  pub message: String,
  /// Payment state at the time the status was shown.
  pub payment_state: Option<PaymentState>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
  pub order_number: String,
  pub order_date: Option<DateTime<Utc>>,
  pub total: Option<Decimal>,
  pub payment_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
  pub open: bool,
  pub step: WizardStep,
  pub status: Option<ProcessingStatus>,
  pub error: Option<String>,
  pub order_button_enabled: bool,
  pub confirmation: Option<Confirmation>,
}

impl Default for CheckoutView {
  fn default() -> Self {
    Self {
      open: false,
      step: WizardStep::CartReview,
      status: None,
      error: None,
      order_button_enabled: true,
      confirmation: None,
    }
  }
}

impl CheckoutView {
  pub fn show_status(&mut self, kind: StatusKind, message: impl Into<String>, payment_state: Option<PaymentState>) {
    self.status = Some(ProcessingStatus {
      kind,
      message: message.into(),
      payment_state,
    });
  }

  /// Shows `message` and sends the customer back to the payment-method step with the
  /// order control enabled again.
  pub fn show_payment_error(&mut self, kind: StatusKind, message: impl Into<String>, payment_state: Option<PaymentState>) {
    let message = message.into();
    self.show_status(kind, message.clone(), payment_state);
    self.error = Some(message);
    self.step = WizardStep::PaymentMethod;
    self.order_button_enabled = true;
  }
}
