// core/src/order.rs

//! Cart lines, customer details and the order draft sent to the shop backend.

use crate::error::{CheckoutError, CheckoutResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
  #[serde(rename = "id")]
  pub product_id: String,
  pub name: String,
  #[serde(rename = "price")]
  pub unit_price: Decimal,
  pub quantity: u32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

impl LineItem {
  pub fn new(product_id: impl Into<String>, name: impl Into<String>, unit_price: Decimal, quantity: u32) -> Self {
    Self {
      product_id: product_id.into(),
      name: name.into(),
      unit_price,
      quantity,
      description: None,
    }
  }

  pub fn line_total(&self) -> Decimal {
    self.unit_price * Decimal::from(self.quantity)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Customer {
  pub firstname: String,
  pub lastname: String,
  pub email: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
  pub address: String,
  pub zipcode: String,
  pub city: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
}

impl Customer {
  /// Checks the fields the customer form marks as required. Reports every problem at once.
  pub fn validate(&self) -> CheckoutResult<()> {
    let mut problems = Vec::new();
    let required = [
      ("firstname", &self.firstname),
      ("lastname", &self.lastname),
      ("email", &self.email),
      ("address", &self.address),
      ("zipcode", &self.zipcode),
      ("city", &self.city),
    ];
    for (field, value) in required {
      if value.trim().is_empty() {
        problems.push(format!("{} is required", field));
      }
    }
    if !self.email.trim().is_empty() && !is_well_formed_email(self.email.trim()) {
      problems.push("email is not a valid address".to_string());
    }

    if problems.is_empty() {
      Ok(())
    } else {
      Err(CheckoutError::Validation(problems.join("; ")))
    }
  }
}

fn is_well_formed_email(email: &str) -> bool {
  if email.chars().any(char::is_whitespace) {
    return false;
  }
  let Some((local, domain)) = email.split_once('@') else {
    return false;
  };
  !local.is_empty()
    && !domain.contains('@')
    && domain.contains('.')
    && !domain.starts_with('.')
    && !domain.ends_with('.')
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
  Cash,
  #[default]
  Card,
  Paypal,
}

impl PaymentMethod {
  pub fn as_str(self) -> &'static str {
    match self {
      PaymentMethod::Cash => "cash",
      PaymentMethod::Card => "card",
      PaymentMethod::Paypal => "paypal",
    }
  }
}

impl fmt::Display for PaymentMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
  pub subtotal: Decimal,
  #[serde(rename = "deliveryCost")]
  pub delivery_fee: Decimal,
  pub total: Decimal,
}

impl OrderTotals {
  pub fn compute(items: &[LineItem], delivery_fee: Decimal) -> Self {
    let subtotal: Decimal = items.iter().map(LineItem::line_total).sum();
    Self {
      subtotal,
      delivery_fee,
      total: subtotal + delivery_fee,
    }
  }
}

/// Client-minted order number: `SUN` followed by the last six digits of the Unix-millis clock.
pub fn mint_order_number(now: DateTime<Utc>) -> String {
  let millis = now.timestamp_millis().unsigned_abs();
  format!("SUN{:06}", millis % 1_000_000)
}

/// Everything the backend needs to persist the order and open a checkout session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
  pub order_number: String,
  pub order_date: DateTime<Utc>,
  pub items: Vec<LineItem>,
  pub customer: Customer,
  pub payment_method: PaymentMethod,
  #[serde(flatten)]
  pub totals: OrderTotals,
}

impl OrderDraft {
  pub fn new(
    order_number: String,
    order_date: DateTime<Utc>,
    items: Vec<LineItem>,
    customer: Customer,
    payment_method: PaymentMethod,
    delivery_fee: Decimal,
  ) -> Self {
    let totals = OrderTotals::compute(&items, delivery_fee);
    Self {
      order_number,
      order_date,
      items,
      customer,
      payment_method,
      totals,
    }
  }
}
