//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

use comrak::{Options, markdown_to_html};
use rust_decimal::Decimal;

use pixelmart_core::types::CurrencyCode;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Formats a decimal amount in the site currency.
///
/// Usage in templates: `{{ package.price|money }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn money(amount: &Decimal, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(format_money(amount))
}

/// Renders markdown content to HTML with GFM extensions.
///
/// Raw HTML in the source is escaped, so admin-authored descriptions
/// cannot inject script into user-facing pages.
///
/// Usage in templates: `{{ product.description|markdown|safe }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn markdown(content: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(render_markdown(&content.to_string()))
}

fn format_money(amount: &Decimal) -> String {
    format!("{}{:.2}", CurrencyCode::default().symbol(), amount)
}

fn render_markdown(content: &str) -> String {
    let mut options = Options::default();
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    markdown_to_html(content, &options)
}
