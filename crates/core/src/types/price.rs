//! Currency handling for displayed amounts.
//!
//! Monetary amounts move through the system as `rust_decimal::Decimal`
//! (serialized as strings on the wire); this module only carries which
//! currency they are displayed in. The backend persists the
//! authoritative total at order-creation time.

use serde::{Deserialize, Serialize};

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    BDT,
    USD,
    EUR,
}

impl CurrencyCode {
    /// The display symbol for the currency.
    #[must_use]
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::BDT => "\u{9f3}",
            Self::USD => "$",
            Self::EUR => "\u{20ac}",
        }
    }

    /// The ISO 4217 code as a string.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::BDT => "BDT",
            Self::USD => "USD",
            Self::EUR => "EUR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_codes() {
        assert_eq!(CurrencyCode::BDT.code(), "BDT");
        assert_eq!(CurrencyCode::default(), CurrencyCode::BDT);
    }

    #[test]
    fn test_symbols() {
        assert_eq!(CurrencyCode::BDT.symbol(), "\u{9f3}");
        assert_eq!(CurrencyCode::USD.symbol(), "$");
    }
}
