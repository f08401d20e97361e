// core/src/payment/mod.rs

pub mod logger;
pub mod state;

pub use logger::{PaymentLogger, DEFAULT_LOG_CAPACITY, PAYMENT_LOG_KEY};
pub use state::{PaymentState, PaymentStateMachine, TransitionRecord};
