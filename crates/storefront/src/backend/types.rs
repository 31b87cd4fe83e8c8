//! Row and RPC payload types for the managed backend.
//!
//! These mirror what the backend returns; the client never owns this data.
//! Status and category fields are closed enums from `pixelmart-core`, so a
//! value the backend never promised fails deserialization loudly instead
//! of falling through to a default label.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pixelmart_core::{
    ChatMessageId, ChatRoomId, CoinSource, CoinTransactionId, OfferId, OrderId, OrderItemId,
    OrderStatus, PackageId, PaymentMethod, ProductId, PromoCodeId, SenderRole, SubscriptionId,
    UserId,
};

// =============================================================================
// Catalog
// =============================================================================

/// What kind of digital good a product is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Subscription,
    App,
    Tutorial,
}

impl ProductCategory {
    /// Human-readable label for templates.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Subscription => "Subscription",
            Self::App => "App",
            Self::Tutorial => "Tutorial",
        }
    }
}

/// A catalog product with its embedded price points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// URL slug, unique per product.
    pub slug: String,
    pub category: ProductCategory,
    #[serde(default)]
    pub description: Option<String>,
    /// Long-form body in Markdown (tutorial content, feature lists).
    #[serde(default)]
    pub body_markdown: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub is_popular: bool,
    /// Display ordering, ascending.
    #[serde(default)]
    pub priority: i32,
    /// Embedded via `select=*,packages(*)`.
    #[serde(default)]
    pub packages: Vec<Package>,
}

impl Product {
    /// Find an embedded package by id.
    #[must_use]
    pub fn package(&self, package_id: PackageId) -> Option<&Package> {
        self.packages.iter().find(|p| p.id == package_id)
    }
}

/// A price point of a product (duration or tier).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    pub product_id: ProductId,
    pub name: String,
    /// Subscription length; `None` for one-off goods.
    #[serde(default)]
    pub duration_days: Option<i32>,
    pub price: Decimal,
    /// Pre-discount price, when the package is on offer.
    #[serde(default)]
    pub original_price: Option<Decimal>,
}

/// A promotional bundle with a countdown deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Countdown deadline; `None` means open-ended.
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    pub price: Decimal,
    #[serde(default)]
    pub original_price: Option<Decimal>,
    pub is_active: bool,
    #[serde(default)]
    pub priority: i32,
    /// Embedded via `select=*,offer_items(*)`.
    #[serde(default)]
    pub offer_items: Vec<OfferItem>,
}

impl Offer {
    /// Whether the offer deadline has passed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.is_some_and(|ends| ends <= now)
    }
}

/// One product/package line inside an offer bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferItem {
    pub offer_id: OfferId,
    pub product_id: ProductId,
    pub package_id: PackageId,
    pub quantity: u32,
}

/// A key/value site setting (manual-payment wallet numbers and the like).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSetting {
    pub key: String,
    pub value: String,
}

// =============================================================================
// Orders
// =============================================================================

/// An order header as stored by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub customer_name: String,
    pub customer_phone: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    pub payment_method: PaymentMethod,
    /// Mobile-wallet transaction reference the customer supplied.
    pub transaction_reference: String,
    #[serde(default)]
    pub promo_code: Option<String>,
    #[serde(default)]
    pub discount: Decimal,
    /// Advisory total computed at checkout; authoritative once persisted.
    pub total: Decimal,
    /// Denormalized summary for list views ("Spotify Premium + 2 more").
    pub primary_product: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for an order header.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrder {
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
}

/// An order line item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub package_id: PackageId,
    /// Names denormalized at checkout so history survives catalog edits.
    pub product_name: String,
    pub package_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// Insert payload for an order line item.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub package_id: PackageId,
    pub product_name: String,
    pub package_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// A message on an order's communication thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCommunication {
    pub id: ChatMessageId,
    pub order_id: OrderId,
    pub sender_role: SenderRole,
    pub content: String,
    #[serde(default)]
    pub attachment_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Chat
// =============================================================================

/// A support chat room, one per user, lazily created by RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRoom {
    pub id: ChatRoomId,
    pub user_id: UserId,
    #[serde(default)]
    pub user_email: Option<String>,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A chat message row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: ChatMessageId,
    pub room_id: ChatRoomId,
    pub sender_role: SenderRole,
    pub content: String,
    #[serde(default)]
    pub attachment_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a chat message.
#[derive(Debug, Clone, Serialize)]
pub struct NewChatMessage {
    pub room_id: ChatRoomId,
    pub sender_role: SenderRole,
    pub content: String,
    pub attachment_url: Option<String>,
}

// =============================================================================
// Coins and promo codes
// =============================================================================

/// A user's coin balance. Mutated only by backend RPCs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCoins {
    pub user_id: UserId,
    pub balance: i64,
    pub updated_at: DateTime<Utc>,
}

/// One entry in the coin ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinTransaction {
    pub id: CoinTransactionId,
    pub user_id: UserId,
    /// Signed: positive for awards, negative for spends.
    pub amount: i64,
    pub source: CoinSource,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A promo code that can be bought with coins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchasablePromoCode {
    pub id: PromoCodeId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub coin_cost: i64,
    pub discount_amount: Decimal,
    pub max_uses: i32,
    pub use_count: i32,
    pub is_active: bool,
}

/// A promo code a user owns after purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPromoCode {
    pub id: PromoCodeId,
    pub user_id: UserId,
    pub code: String,
    pub discount_amount: Decimal,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Subscriptions
// =============================================================================

/// An active (or lapsed) subscription owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSubscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub product_name: String,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

// =============================================================================
// RPC results
// =============================================================================

/// Result of `purchase_promo_code`. The backend decides sufficiency and
/// performs the debit atomically; the client only relays the outcome.
#[derive(Debug, Clone, Deserialize)]
pub struct PromoPurchaseResult {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// Result of `validate_promo_code`.
#[derive(Debug, Clone, Deserialize)]
pub struct PromoValidation {
    pub valid: bool,
    #[serde(default)]
    pub discount: Decimal,
    pub message: String,
}

/// Result of `claim_subscription_notification`, the atomic idempotency
/// marker. `claimed` is true for exactly one caller per (subscription,
/// kind).
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationClaim {
    pub claimed: bool,
}

// =============================================================================
// Auth
// =============================================================================

/// Session issued by the backend's auth endpoint on login or signup.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub user: AuthUser,
}

/// The user record embedded in an [`AuthSession`].
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_with_embedded_packages_deserializes() {
        let json = serde_json::json!({
            "id": "7b0c3c6e-55a7-4f3a-9db1-15c97e8f2a01",
            "name": "Spotify Premium",
            "slug": "spotify-premium",
            "category": "subscription",
            "is_active": true,
            "is_popular": true,
            "priority": 1,
            "packages": [{
                "id": "f8e7af6e-1f0b-4f4a-a9a8-3a8c8e2d9b02",
                "product_id": "7b0c3c6e-55a7-4f3a-9db1-15c97e8f2a01",
                "name": "1 month",
                "duration_days": 30,
                "price": "500"
            }]
        });
        let product: Product = serde_json::from_value(json).unwrap();
        assert_eq!(product.packages.len(), 1);
        let pkg = product.packages.first().unwrap();
        assert_eq!(pkg.price, Decimal::new(500, 0));
        assert!(product.package(pkg.id).is_some());
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let json = serde_json::json!({
            "id": "7b0c3c6e-55a7-4f3a-9db1-15c97e8f2a01",
            "name": "Thing",
            "slug": "thing",
            "category": "gift_card",
            "is_active": true
        });
        assert!(serde_json::from_value::<Product>(json).is_err());
    }

    #[test]
    fn test_offer_expiry() {
        let now = Utc::now();
        let offer = Offer {
            id: OfferId::generate(),
            title: "Bundle".to_string(),
            description: None,
            image_url: None,
            ends_at: Some(now - chrono::Duration::minutes(1)),
            price: Decimal::new(900, 0),
            original_price: Some(Decimal::new(1200, 0)),
            is_active: true,
            priority: 0,
            offer_items: Vec::new(),
        };
        assert!(offer.is_expired(now));
    }

    #[test]
    fn test_promo_purchase_result_without_code() {
        let result: PromoPurchaseResult =
            serde_json::from_str(r#"{"success":false,"message":"Insufficient balance"}"#).unwrap();
        assert!(!result.success);
        assert!(result.code.is_none());
    }

    #[test]
    fn test_new_order_serializes_status_snake_case() {
        let order = NewOrder {
            user_id: UserId::generate(),
            customer_name: "A".to_string(),
            customer_phone: "01700000000".to_string(),
            customer_email: None,
            payment_method: PaymentMethod::Bkash,
            transaction_reference: "TX123".to_string(),
            promo_code: None,
            discount: Decimal::ZERO,
            total: Decimal::new(1000, 0),
            primary_product: "Spotify Premium".to_string(),
            status: OrderStatus::Pending,
        };
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["payment_method"], "bkash");
    }
}
