//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use pixelmart_core::types::CurrencyCode;

/// Formats a decimal amount in the site currency.
///
/// Usage in templates: `{{ order.total|money }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn money(amount: &Decimal, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(format_money(amount))
}

/// Formats a timestamp the way the console lists show it.
///
/// Usage in templates: `{{ order.created_at|when }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn when(at: &DateTime<Utc>, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(at.format("%b %e, %Y %H:%M").to_string())
}

fn format_money(amount: &Decimal) -> String {
    format!("{}{:.2}", CurrencyCode::default().symbol(), amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_shows_two_decimal_places() {
        let out = format_money(&Decimal::from(1500));
        assert_eq!(out, "\u{9f3}1500.00");
    }
}
