// core/src/checkout/session.rs

//! Client-held state of one checkout: the cart, the customer, the current payment attempt
//! and the timers working on it.

use super::view::CheckoutView;
use crate::order::{Customer, LineItem, OrderDraft, PaymentMethod};
use crate::payment::{PaymentState, PaymentStateMachine};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;
use tokio::task::AbortHandle;

/// Correlates one order draft with one remote payment attempt.
#[derive(Debug)]
pub struct PaymentSession {
  /// `None` when the attempt was reconstructed from a returning redirect.
  pub draft: Option<OrderDraft>,
  pub machine: PaymentStateMachine,
  pub session_id: Option<String>,
  pub server_order_id: Option<String>,
  pub payment_id: Option<String>,
  pub poll_count: u32,
  pub webhook_retry_count: u32,
}

impl PaymentSession {
  pub fn new(order_number: &str, draft: Option<OrderDraft>) -> Self {
    Self {
      draft,
      machine: PaymentStateMachine::new(order_number),
      session_id: None,
      server_order_id: None,
      payment_id: None,
      poll_count: 0,
      webhook_retry_count: 0,
    }
  }

  pub fn order_number(&self) -> &str {
    self.machine.order_id()
  }

  pub fn state(&self) -> PaymentState {
    self.machine.current_state()
  }

  pub fn reset_counters(&mut self) {
    self.poll_count = 0;
    self.webhook_retry_count = 0;
  }
}

#[derive(Debug, Default)]
pub struct CheckoutSession {
  pub items: Vec<LineItem>,
  pub customer: Option<Customer>,
  pub payment_method: PaymentMethod,
  pub view: CheckoutView,
  pub payment: Option<PaymentSession>,
  timers: Vec<AbortHandle>,
}

impl CheckoutSession {
  pub fn payment_state(&self) -> Option<PaymentState> {
    self.payment.as_ref().map(PaymentSession::state)
  }

  pub fn add_timer(&mut self, handle: AbortHandle) {
    self.timers.retain(|timer| !timer.is_finished());
    self.timers.push(handle);
  }

  pub fn active_timers(&self) -> usize {
    self.timers.iter().filter(|timer| !timer.is_finished()).count()
  }

  /// Aborts every poll and webhook task. Returns how many were still running.
  pub fn cancel_timers(&mut self) -> usize {
    let mut running = 0;
    for timer in self.timers.drain(..) {
      if !timer.is_finished() {
        running += 1;
      }
      timer.abort();
    }
    running
  }
}

/// Shared handle on a [`CheckoutSession`].
///
/// Guards are blocking and must be dropped before any `.await`.
#[derive(Debug, Clone, Default)]
pub struct SharedSession(Arc<RwLock<CheckoutSession>>);

impl SharedSession {
  pub fn new(session: CheckoutSession) -> Self {
    SharedSession(Arc::new(RwLock::new(session)))
  }

  pub fn read(&self) -> RwLockReadGuard<'_, CheckoutSession> {
    self.0.read()
  }

  pub fn write(&self) -> RwLockWriteGuard<'_, CheckoutSession> {
    self.0.write()
  }
}
