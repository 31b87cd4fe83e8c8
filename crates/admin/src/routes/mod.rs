//! Route handlers for the console.
//!
//! # Route map
//!
//! | Route | Handler |
//! |---|---|
//! | `GET /` | redirect to `/orders` |
//! | `GET /orders` | order list (optional `?status=` filter) |
//! | `GET /orders/{id}` | order detail with items and thread |
//! | `POST /orders/{id}/status` | change order status |
//! | `POST /orders/{id}/message` | reply on the order thread |
//! | `GET /chat` | chat console, all rooms |
//! | `GET /chat/events` | SSE: room list refresh on new rooms |
//! | `GET /chat/{room_id}` | one room with history |
//! | `GET /chat/{room_id}/events` | SSE: new messages in that room |
//! | `POST /chat/{room_id}/send` | send a reply as admin |
//! | `GET /coins` | coin award form |
//! | `POST /coins/award` | submit an award via RPC |

pub mod chat;
pub mod coins;
pub mod orders;

use axum::{
    Router,
    response::Redirect,
    routing::{get, post},
};

use crate::state::AppState;

/// Build the console router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { Redirect::to("/orders") }))
        .route("/orders", get(orders::list))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", post(orders::set_status))
        .route("/orders/{id}/message", post(orders::send_message))
        .route("/chat", get(chat::index))
        .route("/chat/events", get(chat::room_events))
        .route("/chat/{room_id}", get(chat::room))
        .route("/chat/{room_id}/events", get(chat::message_events))
        .route("/chat/{room_id}/send", post(chat::send))
        .route("/coins", get(coins::form))
        .route("/coins/award", post(coins::award))
}
