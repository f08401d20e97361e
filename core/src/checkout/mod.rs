// core/src/checkout/mod.rs

//! Checkout wizard and payment orchestration.

mod monitor;
pub mod navigator;
pub mod session;
pub mod system;
pub mod view;
pub mod wizard;

pub use navigator::{Navigator, RecordingNavigator};
pub use session::{CheckoutSession, PaymentSession, SharedSession};
pub use system::CheckoutSystem;
pub use view::{CheckoutView, Confirmation, ProcessingStatus, StatusKind};
pub use wizard::WizardStep;
