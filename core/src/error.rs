// core/src/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckoutError {
  /// A local form or cart check failed. Recovered in place, never touches payment state.
  #[error("Validation error: {0}")]
  Validation(String),

  #[error("Checkout session could not be created: {0}")]
  SessionCreation(String),

  #[error("Payment provider call '{operation}' failed. Source: {source}")]
  Provider {
    operation: &'static str,
    #[source]
    source: AnyhowError,
  },

  #[error("Malformed response from '{operation}': {message}")]
  MalformedResponse { operation: &'static str, message: String },

  #[error("Session storage error: {0}")]
  Storage(String),

  #[error("Configuration error: {0}")]
  Config(String),

  /// An operation was requested while the wizard or payment was in the wrong state.
  #[error("Invalid checkout state: {0}")]
  InvalidState(String),
}

impl CheckoutError {
  pub(crate) fn provider(operation: &'static str, source: impl Into<AnyhowError>) -> Self {
    CheckoutError::Provider {
      operation,
      source: source.into(),
    }
  }

  /// Message suitable for the checkout view. Transport details stay in the logs.
  pub fn user_message(&self) -> String {
    match self {
      CheckoutError::Validation(m) => m.clone(),
      CheckoutError::SessionCreation(m) => format!("Fehler beim Erstellen der Zahlungssession: {}", m),
      CheckoutError::Provider { .. } | CheckoutError::MalformedResponse { .. } => {
        "Es gab einen Fehler bei der Bestellung. Bitte versuchen Sie es erneut.".to_string()
      }
      CheckoutError::Storage(_) | CheckoutError::Config(_) | CheckoutError::InvalidState(_) => self.to_string(),
    }
  }
}

pub type CheckoutResult<T, E = CheckoutError> = std::result::Result<T, E>;
