//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Account creation and login against the backend's auth API
//! - `checkout` - Cart validation and order placement
//! - `chat` - Live chat rooms and message streams
//! - `coins` - Wallet overview and promo-code purchases
//! - `notifier` - Server-side subscription expiry notifications

pub mod auth;
pub mod checkout;
pub mod chat;
pub mod coins;
pub mod notifier;
