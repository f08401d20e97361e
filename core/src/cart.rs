// core/src/cart.rs

//! The shopping cart the checkout is started from.
//!
//! The cart is client-held: it lives in memory and is written through [`SessionStorage`]
//! under [`CART_KEY`] after every change, so a reloaded page picks it up with [`Cart::load`].
//! Persistence is best-effort; a failed write keeps the in-memory cart and logs a warning.

use crate::error::{CheckoutError, CheckoutResult};
use crate::order::LineItem;
use crate::storage::SessionStorage;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const CART_KEY: &str = "sunsano-cart";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
  pub id: String,
  pub name: String,
  pub price: Decimal,
}

impl Product {
  pub fn new(id: impl Into<String>, name: impl Into<String>, price: Decimal) -> Self {
    Self {
      id: id.into(),
      name: name.into(),
      price,
    }
  }
}

/// The juices on the shop's menu.
pub fn default_catalog() -> Vec<Product> {
  vec![
    Product::new("sunny-orange", "Sunny Orange", dec!(3.90)),
    Product::new("green-power", "Green Power", dec!(4.50)),
    Product::new("berry-boost", "Berry Boost", dec!(4.20)),
    Product::new("carrot-zing", "Carrot Zing", dec!(3.80)),
    Product::new("tropic-wave", "Tropic Wave", dec!(4.90)),
    Product::new("citrus-splash", "Citrus Splash", dec!(4.10)),
  ]
}

pub struct Cart {
  storage: Arc<dyn SessionStorage>,
  catalog: Vec<Product>,
  items: Vec<LineItem>,
}

impl Cart {
  /// An empty cart. Nothing is written until the first change.
  pub fn new(storage: Arc<dyn SessionStorage>, catalog: Vec<Product>) -> Self {
    Self {
      storage,
      catalog,
      items: Vec::new(),
    }
  }

  /// Restores the cart saved under [`CART_KEY`]. A missing, unreadable or unparsable entry
  /// yields an empty cart.
  pub fn load(storage: Arc<dyn SessionStorage>, catalog: Vec<Product>) -> Self {
    let items = match storage.get(CART_KEY) {
      Ok(Some(raw)) => serde_json::from_str::<Vec<LineItem>>(&raw).unwrap_or_else(|e| {
        warn!(error = %e, "Saved cart could not be parsed; starting empty.");
        Vec::new()
      }),
      Ok(None) => Vec::new(),
      Err(e) => {
        warn!(error = %e, "Saved cart could not be read; starting empty.");
        Vec::new()
      }
    };
    debug!(lines = items.len(), "Cart loaded.");
    Self { storage, catalog, items }
  }

  pub fn items(&self) -> &[LineItem] {
    &self.items
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// Number of units across all lines, as shown on the cart badge.
  pub fn item_count(&self) -> u32 {
    self.items.iter().map(|item| item.quantity).sum()
  }

  pub fn subtotal(&self) -> Decimal {
    self.items.iter().map(LineItem::line_total).sum()
  }

  /// Adds `quantity` units of a catalog product, merging into an existing line. Returns the
  /// line's new quantity.
  pub fn add(&mut self, product_id: &str, quantity: u32) -> CheckoutResult<u32> {
    if quantity == 0 {
      return Err(CheckoutError::Validation("quantity must be at least 1".to_string()));
    }
    let product = self
      .catalog
      .iter()
      .find(|product| product.id == product_id)
      .ok_or_else(|| CheckoutError::Validation(format!("unknown product '{}'", product_id)))?;

    let new_quantity = match self.items.iter_mut().find(|item| item.product_id == product_id) {
      Some(item) => {
        item.quantity = item.quantity.saturating_add(quantity);
        item.quantity
      }
      None => {
        self
          .items
          .push(LineItem::new(&product.id, &product.name, product.price, quantity));
        quantity
      }
    };
    info!(product_id, quantity = new_quantity, "Added to cart.");
    self.save();
    Ok(new_quantity)
  }

  /// Drops the line for `product_id`. Returns whether there was one.
  pub fn remove(&mut self, product_id: &str) -> bool {
    let before = self.items.len();
    self.items.retain(|item| item.product_id != product_id);
    let removed = self.items.len() != before;
    if removed {
      self.save();
    }
    removed
  }

  /// Sets a line's quantity; zero removes the line. Returns whether the product was in the cart.
  pub fn update_quantity(&mut self, product_id: &str, quantity: u32) -> bool {
    if quantity == 0 {
      return self.remove(product_id);
    }
    match self.items.iter_mut().find(|item| item.product_id == product_id) {
      Some(item) => {
        item.quantity = quantity;
        self.save();
        true
      }
      None => false,
    }
  }

  pub fn clear(&mut self) {
    self.items.clear();
    self.save();
  }

  fn save(&self) {
    let saved = serde_json::to_string(&self.items)
      .map_err(|e| CheckoutError::Storage(e.to_string()))
      .and_then(|raw| self.storage.set(CART_KEY, raw));
    if let Err(e) = saved {
      warn!(error = %e, "Cart could not be saved.");
    }
  }
}
