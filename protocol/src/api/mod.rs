//! API DTOs module
//!
//! Request/response types organized by backend domain:
//! - `auth`: login, registration, token refresh, profile
//! - `parking`: spots, reservations, availability, blocker control
//! - `payments`: payment methods, wallet, card payments, transactions
//! - `subscriptions`: plans, active subscription, tariff zones and rules
//! - `contacts`: contact-form messages
//! - `notifications`: web-push subscription registration

pub mod auth;
pub mod contacts;
pub mod notifications;
pub mod parking;
pub mod payments;
pub mod subscriptions;

pub use auth::*;
pub use contacts::*;
pub use notifications::*;
pub use parking::*;
pub use payments::*;
pub use subscriptions::*;
