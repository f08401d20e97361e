// core/src/checkout/wizard.rs

//! The four linear checkout steps and the gate that guards moving forward.

use crate::error::{CheckoutError, CheckoutResult};
use crate::order::{Customer, LineItem};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WizardStep {
  CartReview = 1,
  CustomerData = 2,
  PaymentMethod = 3,
  Processing = 4,
}

impl WizardStep {
  pub fn number(self) -> u8 {
    self as u8
  }

  pub fn from_number(number: u8) -> Option<Self> {
    match number {
      1 => Some(WizardStep::CartReview),
      2 => Some(WizardStep::CustomerData),
      3 => Some(WizardStep::PaymentMethod),
      4 => Some(WizardStep::Processing),
      _ => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      WizardStep::CartReview => "cart-review",
      WizardStep::CustomerData => "customer-data",
      WizardStep::PaymentMethod => "payment-method",
      WizardStep::Processing => "processing",
    }
  }

  /// Where `next` leads. `Processing` is only entered by placing the order.
  pub fn following(self) -> Option<Self> {
    match self {
      WizardStep::CartReview => Some(WizardStep::CustomerData),
      WizardStep::CustomerData => Some(WizardStep::PaymentMethod),
      WizardStep::PaymentMethod | WizardStep::Processing => None,
    }
  }

  /// Where `prev` leads. Neither the first step nor `Processing` can be left backwards.
  pub fn preceding(self) -> Option<Self> {
    match self {
      WizardStep::CustomerData => Some(WizardStep::CartReview),
      WizardStep::PaymentMethod => Some(WizardStep::CustomerData),
      WizardStep::CartReview | WizardStep::Processing => None,
    }
  }
}

impl fmt::Display for WizardStep {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

pub fn validate_cart(items: &[LineItem]) -> CheckoutResult<()> {
  if items.is_empty() {
    return Err(CheckoutError::Validation("cart is empty".to_string()));
  }
  if let Some(item) = items.iter().find(|item| item.quantity == 0) {
    return Err(CheckoutError::Validation(format!(
      "quantity of '{}' must be at least 1",
      item.name
    )));
  }
  Ok(())
}

/// Whether the data collected so far allows leaving `step` forwards.
pub fn validate_step(step: WizardStep, items: &[LineItem], customer: Option<&Customer>) -> CheckoutResult<()> {
  match step {
    WizardStep::CartReview => validate_cart(items),
    WizardStep::CustomerData => match customer {
      Some(customer) => customer.validate(),
      None => Err(CheckoutError::Validation("customer data is missing".to_string())),
    },
    // A payment method is always selected; `card` is the default.
    WizardStep::PaymentMethod => Ok(()),
    WizardStep::Processing => Err(CheckoutError::InvalidState(
      "the processing step has no following step".to_string(),
    )),
  }
}
