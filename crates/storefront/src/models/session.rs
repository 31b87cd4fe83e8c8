//! Session-related types.
//!
//! Types stored in the session: the authenticated user and the cart.

use serde::{Deserialize, Serialize};

use pixelmart_core::{Email, UserId};

/// Session-stored user identity.
///
/// Minimal data to identify the logged-in user plus the backend access
/// token every row query is made with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Backend user id.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Backend access token; sent as a Bearer header so row-level
    /// security applies per user.
    pub access_token: String,
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for storing the cart state container.
    pub const CART: &str = "cart";
}
