//! Checkout payment-validation and order-finalization engine for a
//! restaurant storefront.
//!
//! The crate wires a three-step [`services::CheckoutFlow`] over a
//! [`security::PaymentSecurity`] gate (field validation, attempt lockout,
//! session timeout, masking, tokenization), a staged simulated
//! [`services::PaymentProcessor`], and an append-only [`store::JsonStore`]
//! holding finalized orders. No real payment network is involved; the
//! pipeline and gateway are deliberately simulated.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::dbg_macro, clippy::todo)]

pub mod clock;
pub mod config;
pub mod errors;
pub mod events;
pub mod models;
pub mod rate_limiter;
pub mod security;
pub mod services;
pub mod store;
pub mod validation;

pub use config::{load_config, CheckoutConfig};
pub use errors::ServiceError;
