//! Pixelmart storefront library.
//!
//! The public storefront as a library, so integration tests can build
//! the services and router against a mock backend.
//!
//! # Architecture
//!
//! - Axum web framework with HTMX for interactivity
//! - Askama templates for server-side rendering
//! - A managed backend (REST rows, RPCs, storage, realtime push) as the
//!   single source of truth; this process keeps no database
//! - Session-held cart; per-user access tokens so the backend's
//!   row-level security decides what each request can see

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
