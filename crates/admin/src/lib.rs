//! Pixelmart admin console library.
//!
//! The console as a library, so integration tests can build the router
//! against a mock backend.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod error;
pub mod filters;
pub mod routes;
pub mod state;
