// core/src/payment/state.rs

//! Payment status of a single order attempt and its fixed transition table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
  Pending,
  Processing,
  Paid,
  Failed,
  Timeout,
}

impl PaymentState {
  pub const ALL: [PaymentState; 5] = [
    PaymentState::Pending,
    PaymentState::Processing,
    PaymentState::Paid,
    PaymentState::Failed,
    PaymentState::Timeout,
  ];

  /// The transition table. `Failed` and `Timeout` lead back to `Pending`, which starts a new attempt.
  pub fn allowed_successors(self) -> &'static [PaymentState] {
    match self {
      PaymentState::Pending => &[PaymentState::Processing, PaymentState::Failed],
      PaymentState::Processing => &[PaymentState::Paid, PaymentState::Failed, PaymentState::Timeout],
      PaymentState::Paid => &[],
      PaymentState::Failed => &[PaymentState::Pending],
      PaymentState::Timeout => &[PaymentState::Pending],
    }
  }

  /// No outgoing transitions at all.
  pub fn is_terminal(self) -> bool {
    self.allowed_successors().is_empty()
  }

  /// Monitoring stops here: either paid, or waiting for the customer to retry.
  pub fn is_settled(self) -> bool {
    matches!(self, PaymentState::Paid | PaymentState::Failed | PaymentState::Timeout)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      PaymentState::Pending => "pending",
      PaymentState::Processing => "processing",
      PaymentState::Paid => "paid",
      PaymentState::Failed => "failed",
      PaymentState::Timeout => "timeout",
    }
  }
}

impl fmt::Display for PaymentState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
  pub from: PaymentState,
  pub to: PaymentState,
  pub timestamp: DateTime<Utc>,
}

/// Holds one order's payment state and the append-only record of how it got there.
///
/// The machine performs no I/O apart from `tracing` events. Callers that share it between
/// timers wrap it in a lock; every [`PaymentStateMachine::transition`] re-checks the table,
/// so a late or duplicate request is rejected instead of corrupting the state.
#[derive(Debug, Clone)]
pub struct PaymentStateMachine {
  order_id: String,
  current_state: PaymentState,
  history: Vec<TransitionRecord>,
}

impl PaymentStateMachine {
  pub fn new(order_id: impl Into<String>) -> Self {
    let order_id = order_id.into();
    info!(order_id = %order_id, state = %PaymentState::Pending, "Payment state machine initialized.");
    Self {
      order_id,
      current_state: PaymentState::Pending,
      history: Vec::new(),
    }
  }

  pub fn order_id(&self) -> &str {
    &self.order_id
  }

  pub fn current_state(&self) -> PaymentState {
    self.current_state
  }

  pub fn history(&self) -> &[TransitionRecord] {
    &self.history
  }

  pub fn can_transition_to(&self, state: PaymentState) -> bool {
    self.current_state.allowed_successors().contains(&state)
  }

  /// Moves to `new_state` if the table allows it from the current state.
  ///
  /// Returns `false` and leaves the machine untouched otherwise.
  pub fn transition(&mut self, new_state: PaymentState) -> bool {
    if !self.can_transition_to(new_state) {
      warn!(
        order_id = %self.order_id,
        from = %self.current_state,
        to = %new_state,
        "Invalid payment state transition rejected."
      );
      return false;
    }

    let old_state = self.current_state;
    self.current_state = new_state;
    self.history.push(TransitionRecord {
      from: old_state,
      to: new_state,
      timestamp: Utc::now(),
    });
    info!(order_id = %self.order_id, from = %old_state, to = %new_state, "Payment state transition.");
    true
  }

  /// Re-enters `Pending` for a new attempt after `Failed` or `Timeout`.
  pub fn retry(&mut self) -> bool {
    self.transition(PaymentState::Pending)
  }

  /// Folds `history` from `Pending`. `None` if a record does not continue from the previous
  /// state or is not in the table.
  pub fn replay(history: &[TransitionRecord]) -> Option<PaymentState> {
    history.iter().try_fold(PaymentState::Pending, |state, record| {
      (record.from == state && state.allowed_successors().contains(&record.to)).then_some(record.to)
    })
  }
}
