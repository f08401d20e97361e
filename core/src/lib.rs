// src/lib.rs

//! SunSano checkout: client-side checkout and payment orchestration for the SunSano shop.
//!
//! The crate drives an order from the cart to a settled payment:
//!  - A shopping cart persisted through injected session storage.
//!  - A four-step checkout wizard with per-step validation.
//!  - Order totals and client-minted order numbers.
//!  - Hand-off to a provider-hosted checkout session, and confirmation on return.
//!  - In-page payments monitored by status polling and webhook confirmations with bounded retries.
//!  - A payment state machine with a fixed transition table and an append-only history.
//!  - A capped, best-effort payment event log kept in injected session storage.
//!
//! The remote payment provider, the storage and the browser redirect are injected as trait
//! objects, so the orchestration runs unchanged against the shop backend
//! ([`HttpPaymentProvider`]) or a scripted fake ([`FakePaymentProvider`]).

pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod order;
pub mod payment;
pub mod provider;
pub mod storage;

// --- Re-exports for the Public API ---

pub use crate::cart::{default_catalog, Cart, Product, CART_KEY};
pub use crate::checkout::{
  CheckoutSystem, CheckoutView, Confirmation, Navigator, ProcessingStatus, RecordingNavigator, StatusKind, WizardStep,
};
pub use crate::config::CheckoutConfig;
pub use crate::error::{CheckoutError, CheckoutResult};
pub use crate::order::{mint_order_number, Customer, LineItem, OrderDraft, OrderTotals, PaymentMethod};
pub use crate::payment::{PaymentLogger, PaymentState, PaymentStateMachine, TransitionRecord, PAYMENT_LOG_KEY};
pub use crate::provider::{
  CheckoutSessionCreated, FakePaymentProvider, HttpPaymentProvider, PaymentInit, PaymentProvider, ProviderCall,
  RemotePaymentStatus, SessionStatus, WebhookDelivery,
};
pub use crate::storage::{InMemoryStorage, SessionStorage};

/*
    Typical flow:
    1. Build a `CheckoutSystem` from a `CheckoutConfig`, a `PaymentProvider`, a `SessionStorage`
       and a `Navigator`.
    2. Fill a `Cart` and call `start_checkout_from_cart(&cart)`. Then `set_customer(..)` and
       `select_payment_method(..)` while the customer walks the wizard with `next_step()` /
       `prev_step()`.
    3. Either `place_order()` (hosted checkout, followed later by `confirm_return(session_id)`)
       or `process_payment()` (in-page, settled by polling and webhooks).
    4. Watch `subscribe()` or `view()`; after `failed` / `timeout`, `retry_payment()`.
*/
