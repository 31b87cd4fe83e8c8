//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                       - Home page
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (backend reachable)
//!
//! # Catalog
//! GET  /products               - Product listing (?category= filter)
//! GET  /products/{slug}        - Product detail
//! GET  /offers                 - Running offers
//!
//! # Cart (HTMX fragments)
//! GET  /cart                   - Cart page
//! POST /cart/add               - Add a package (returns count fragment)
//! POST /cart/update            - Set quantity (returns cart_items fragment)
//! POST /cart/remove            - Remove line (returns cart_items fragment)
//! GET  /cart/count             - Cart count badge fragment
//!
//! # Checkout (requires auth)
//! GET  /checkout               - Checkout form
//! POST /checkout               - Place order
//! GET  /checkout/confirmation/{id} - Confirmation page
//!
//! # Chat (requires auth)
//! GET  /chat                   - Chat page with history
//! GET  /chat/events            - SSE stream of new messages
//! POST /chat/send              - Send a message
//! POST /chat/upload            - Send an attachment
//!
//! # Coins (requires auth)
//! GET  /coins                  - Wallet page
//! POST /coins/purchase         - Buy a promo code with coins
//!
//! # Account (requires auth)
//! GET  /account                - Overview with subscriptions and toasts
//! GET  /account/toasts         - Expiry toast fragment (HTMX poll)
//! GET  /account/orders         - Order history
//! GET  /account/orders/{id}    - Order detail with communication thread
//! POST /account/orders/{id}/message    - Append a thread message
//! POST /account/orders/{id}/attachment - Attach a file to the thread
//!
//! # Auth (rate limited)
//! GET  /auth/login             - Login page
//! POST /auth/login             - Login action
//! GET  /auth/register          - Register page
//! POST /auth/register          - Register action
//! POST /auth/logout            - Logout action
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod chat;
pub mod checkout;
pub mod coins;
pub mod home;
pub mod offers;
pub mod products;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::rate_limit;
use crate::state::AppState;

/// Create the auth routes router, rate limited per IP.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
        .layer(rate_limit::auth_rate_limiter())
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{slug}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
}

/// Create the checkout routes router; order submission is rate limited.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(checkout::form).post(checkout::submit),
        )
        .route("/confirmation/{id}", get(checkout::confirmation))
        .layer(rate_limit::checkout_rate_limiter())
}

/// Create the chat routes router.
pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(chat::show))
        .route("/events", get(chat::events))
        .route("/send", post(chat::send))
        .route("/upload", post(chat::upload))
}

/// Create the coin wallet routes router.
pub fn coin_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(coins::index))
        .route("/purchase", post(coins::purchase))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index))
        .route("/toasts", get(account::toasts))
        .route("/orders", get(account::orders))
        .route("/orders/{id}", get(account::order_show))
        .route("/orders/{id}/message", post(account::post_thread_message))
        .route(
            "/orders/{id}/attachment",
            post(account::post_thread_attachment),
        )
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/products", product_routes())
        .route("/offers", get(offers::index))
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .nest("/chat", chat_routes())
        .nest("/coins", coin_routes())
        .nest("/account", account_routes())
        .nest("/auth", auth_routes())
}
