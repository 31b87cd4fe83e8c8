//! Push-subscription client for the managed backend's realtime channel.
//!
//! The backend broadcasts row-insert events over a WebSocket. A client
//! joins a topic (a table name plus an optional equality filter on one
//! column) and receives every insert matching that filter, in arrival
//! order. Nothing here deduplicates or re-sorts: delivery reflects
//! whatever the channel sends.
//!
//! # Teardown discipline
//!
//! Every subscription is a guard object. Dropping it releases the topic;
//! when the last guard for a topic goes away the hub sends an unsubscribe
//! frame. No caller can leak a channel by forgetting a cleanup call.
//!
//! # Example
//!
//! ```rust,ignore
//! let hub = RealtimeHub::connect(&url, &api_key).await?;
//! let topic = Topic::filtered("chat_messages", "room_id", room_id);
//! let mut sub = hub.subscribe(&topic);
//! while let Ok(event) = sub.recv().await {
//!     // event.record is the inserted row as JSON
//! }
//! // dropping `sub` leaves the topic
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

mod hub;
mod protocol;

pub use hub::{RealtimeHub, Subscription};
pub use protocol::{InsertEvent, Topic, WireMessage};

use thiserror::Error;

/// Errors from the realtime client.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// The WebSocket connection could not be established.
    #[error("websocket connect failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    /// The realtime URL could not be parsed.
    #[error("invalid realtime url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The connection task has shut down; no further events will arrive.
    #[error("realtime connection closed")]
    Closed,

    /// This subscriber fell behind and `missed` events were dropped.
    ///
    /// The channel does not replay; callers that care should re-fetch
    /// history and continue.
    #[error("subscriber lagged, {missed} events dropped")]
    Lagged {
        /// Number of events this subscriber missed.
        missed: u64,
    },
}
