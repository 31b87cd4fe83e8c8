//! Shared type definitions.

pub mod email;
pub mod id;
pub mod price;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use price::CurrencyCode;
pub use status::{CoinSource, NotificationKind, OrderStatus, PaymentMethod, SenderRole};
