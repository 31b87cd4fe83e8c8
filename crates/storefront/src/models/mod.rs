//! Domain models local to the storefront binary.

pub mod session;

pub use session::{CurrentUser, keys as session_keys};
