//! Status enums for various entities.
//!
//! The backend stores these as snake_case strings. Keeping them as closed
//! enums gives exhaustive matching in the binaries instead of silent
//! fallthrough on unexpected strings.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
///
/// The client only ever writes `Pending` (at checkout) and `Failed` (the
/// compensating update when the item batch cannot be written). Everything
/// else is set by administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Delivered,
    Cancelled,
    Failed,
}

impl OrderStatus {
    /// Human-readable label for templates.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }

    /// Backend string form (snake_case, as stored).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Manual mobile-wallet payment methods.
///
/// There is no gateway integration: the customer pays out-of-band and
/// supplies the wallet transaction reference at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Bkash,
    Nagad,
    Rocket,
}

impl PaymentMethod {
    /// Human-readable label for templates.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Bkash => "bKash",
            Self::Nagad => "Nagad",
            Self::Rocket => "Rocket",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bkash" => Ok(Self::Bkash),
            "nagad" => Ok(Self::Nagad),
            "rocket" => Ok(Self::Rocket),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}

/// Source of a coin ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoinSource {
    Signup,
    OrderReward,
    AdminAward,
    PromoPurchase,
}

/// Kind of subscription-expiry notification.
///
/// Together with a subscription id this forms the idempotency key the
/// backend's claim RPC enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ExpiringSoon,
    Expired,
}

impl NotificationKind {
    /// Backend string form (used in RPC arguments).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ExpiringSoon => "expiring_soon",
            Self::Expired => "expired",
        }
    }
}

/// Who sent a chat or order-communication message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderRole {
    Customer,
    Admin,
}

impl SenderRole {
    /// Whether this message came from the admin side.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_serde_snake_case() {
        let json = serde_json::to_string(&OrderStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
        let back: OrderStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(back, OrderStatus::Failed);
    }

    #[test]
    fn test_order_status_rejects_unknown() {
        let result: Result<OrderStatus, _> = serde_json::from_str("\"shipped\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_payment_method_from_str() {
        assert_eq!("bkash".parse::<PaymentMethod>().unwrap(), PaymentMethod::Bkash);
        assert!("paypal".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_notification_kind_strings() {
        assert_eq!(NotificationKind::ExpiringSoon.as_str(), "expiring_soon");
        assert_eq!(NotificationKind::Expired.as_str(), "expired");
    }

    #[test]
    fn test_sender_role_serde() {
        assert_eq!(
            serde_json::to_string(&SenderRole::Customer).unwrap(),
            "\"customer\""
        );
    }
}
