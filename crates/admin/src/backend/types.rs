//! Row types returned by the backend tables the console works with.
//!
//! The admin reads with the service-role key, so these rows are not
//! filtered by row-level security.

use chrono::{DateTime, Utc};
use pixelmart_core::{
    ChatMessageId, ChatRoomId, OrderId, OrderItemId, OrderStatus, PaymentMethod, SenderRole, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An order row as stored, with the denormalized summary fields the list
/// view shows.
#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub payment_method: PaymentMethod,
    pub transaction_reference: String,
    pub promo_code: Option<String>,
    pub discount: Decimal,
    pub total: Decimal,
    pub primary_product: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// One line of an order.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_name: String,
    pub package_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// A message on an order's communication thread.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderCommunication {
    pub id: ChatMessageId,
    pub order_id: OrderId,
    pub sender_role: SenderRole,
    pub content: String,
    #[serde(default)]
    pub attachment_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A reply to be inserted into an order's thread.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrderCommunication {
    pub order_id: OrderId,
    pub sender_role: SenderRole,
    pub content: String,
}

/// A live-chat room. One per customer, created lazily by the backend RPC
/// when the customer first opens chat.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRoom {
    pub id: ChatRoomId,
    pub user_id: UserId,
    pub user_email: Option<String>,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A message in a chat room.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub id: ChatMessageId,
    pub room_id: ChatRoomId,
    pub sender_role: SenderRole,
    pub content: String,
    #[serde(default)]
    pub attachment_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A message to be inserted into a room.
#[derive(Debug, Clone, Serialize)]
pub struct NewChatMessage {
    pub room_id: ChatRoomId,
    pub sender_role: SenderRole,
    pub content: String,
}
