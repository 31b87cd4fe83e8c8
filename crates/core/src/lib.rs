//! Pixelmart Core - Shared types library.
//!
//! This crate provides common types used across all Pixelmart components:
//! - `storefront` - Public-facing digital goods store
//! - `admin` - Internal administration panel
//!
//! # Architecture
//!
//! The core crate contains only types and pure state - no I/O, no HTTP
//! clients. Everything that talks to the managed backend lives in the
//! binaries; everything here can be tested without a network.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, and statuses
//! - [`cart`] - The client-owned cart state container

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use cart::{Cart, CartItem};
pub use types::*;
