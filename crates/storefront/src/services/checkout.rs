//! Checkout service.
//!
//! Validates the cart and customer details, then performs the two-phase
//! order write: one order header row, then the item batch. If the item
//! batch fails after the header was created, the order is marked `failed`
//! with a compensating update so an empty order can never be mistaken
//! for a successful one.

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{instrument, warn};

use pixelmart_core::{Cart, OrderId, OrderStatus, PaymentMethod, UserId};

use crate::backend::types::{NewOrder, NewOrderItem, Order, Product, PromoValidation};
use crate::backend::{BackendClient, BackendError};
use crate::models::CurrentUser;

/// Errors that can occur while placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart has no items.
    #[error("cart is empty")]
    EmptyCart,

    /// A required customer field is missing or blank.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A cart line references a product or package no longer in the
    /// active catalog.
    #[error("unknown product or package in cart")]
    UnknownItem,

    /// The promo code was rejected; carries the backend's message.
    #[error("{0}")]
    InvalidPromo(String),

    /// The item batch failed after the order header was written. The
    /// order has been marked failed.
    #[error("order items could not be saved")]
    ItemsWriteFailed(#[source] BackendError),

    /// Backend request failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Customer-supplied checkout details.
#[derive(Debug, Clone)]
pub struct CheckoutDetails {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub payment_method: PaymentMethod,
    pub transaction_reference: String,
    pub promo_code: Option<String>,
}

/// Checkout service.
pub struct CheckoutService<'a> {
    backend: &'a BackendClient,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(backend: &'a BackendClient) -> Self {
        Self { backend }
    }

    /// Place an order for the cart's contents.
    ///
    /// Returns the stored order header on success. The caller clears the
    /// cart only after this returns `Ok`; every error path leaves the
    /// cart intact.
    ///
    /// # Errors
    ///
    /// See [`CheckoutError`] for the failure modes.
    #[instrument(skip(self, cart, details), fields(user_id = %user.id, items = cart.items().len()))]
    pub async fn place_order(
        &self,
        user: &CurrentUser,
        cart: &Cart,
        details: CheckoutDetails,
    ) -> Result<Order, CheckoutError> {
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        validate_details(&details)?;

        let products = self.backend.active_products().await?;
        let lines = resolve_lines(cart, &products)?;

        let subtotal = cart.subtotal(|package_id| {
            lines
                .iter()
                .find(|l| l.package_id == package_id)
                .map(|l| l.unit_price)
        });

        let (promo_code, discount) = match details.promo_code.as_deref() {
            Some(code) if !code.trim().is_empty() => {
                let discount = self.validate_promo(user, code.trim()).await?;
                (Some(code.trim().to_string()), discount)
            }
            _ => (None, Decimal::ZERO),
        };
        let total = (subtotal - discount).max(Decimal::ZERO);

        let order: Order = self
            .backend
            .insert_one(
                Some(&user.access_token),
                "orders",
                &NewOrder {
                    user_id: user.id,
                    customer_name: details.customer_name,
                    customer_phone: details.customer_phone,
                    customer_email: details.customer_email,
                    payment_method: details.payment_method,
                    transaction_reference: details.transaction_reference,
                    promo_code: promo_code.clone(),
                    discount,
                    total,
                    primary_product: primary_product_label(&lines),
                    status: OrderStatus::Pending,
                },
            )
            .await?;

        let items: Vec<NewOrderItem> = lines
            .into_iter()
            .map(|l| NewOrderItem {
                order_id: order.id,
                product_id: l.product_id,
                package_id: l.package_id,
                product_name: l.product_name,
                package_name: l.package_name,
                quantity: l.quantity,
                unit_price: l.unit_price,
            })
            .collect();

        if let Err(err) = self
            .backend
            .insert::<_, serde_json::Value>(Some(&user.access_token), "order_items", &items)
            .await
        {
            self.mark_failed(user, order.id).await;
            return Err(CheckoutError::ItemsWriteFailed(err));
        }

        if let Some(code) = promo_code {
            // Usage counting is advisory; a failure here must not undo a
            // placed order.
            if let Err(err) = self
                .backend
                .rpc::<serde_json::Value>(
                    Some(&user.access_token),
                    "increment_promo_usage",
                    serde_json::json!({ "code": code }),
                )
                .await
            {
                warn!(error = %err, "failed to increment promo usage");
            }
        }

        Ok(order)
    }

    async fn validate_promo(
        &self,
        user: &CurrentUser,
        code: &str,
    ) -> Result<Decimal, CheckoutError> {
        let validation: PromoValidation = self
            .backend
            .rpc(
                Some(&user.access_token),
                "validate_promo_code",
                serde_json::json!({ "code": code, "user_id": user.id }),
            )
            .await?;
        if !validation.valid {
            return Err(CheckoutError::InvalidPromo(validation.message));
        }
        Ok(validation.discount)
    }

    /// Compensating update after an item-batch failure. Best effort: the
    /// order must not look successful, but a second failure here leaves
    /// only a pending header, which the admin console surfaces.
    async fn mark_failed(&self, user: &CurrentUser, order_id: OrderId) {
        let patch = serde_json::json!({ "status": OrderStatus::Failed });
        if let Err(err) = self
            .backend
            .update(
                Some(&user.access_token),
                "orders",
                &[("id", order_id.to_string())],
                &patch,
            )
            .await
        {
            warn!(order_id = %order_id, error = %err, "compensating status update failed");
        }
    }
}

/// A cart line resolved against the active catalog.
#[derive(Debug)]
struct ResolvedLine {
    product_id: pixelmart_core::ProductId,
    package_id: pixelmart_core::PackageId,
    product_name: String,
    package_name: String,
    quantity: u32,
    unit_price: Decimal,
}

fn validate_details(details: &CheckoutDetails) -> Result<(), CheckoutError> {
    if details.customer_name.trim().is_empty() {
        return Err(CheckoutError::MissingField("name"));
    }
    if details.customer_phone.trim().is_empty() {
        return Err(CheckoutError::MissingField("phone"));
    }
    if details.transaction_reference.trim().is_empty() {
        return Err(CheckoutError::MissingField("transaction reference"));
    }
    Ok(())
}

fn resolve_lines(cart: &Cart, products: &[Product]) -> Result<Vec<ResolvedLine>, CheckoutError> {
    cart.items()
        .iter()
        .map(|item| {
            let product = products
                .iter()
                .find(|p| p.id == item.product_id && p.is_active)
                .ok_or(CheckoutError::UnknownItem)?;
            let package = product
                .package(item.package_id)
                .ok_or(CheckoutError::UnknownItem)?;
            Ok(ResolvedLine {
                product_id: product.id,
                package_id: package.id,
                product_name: product.name.clone(),
                package_name: package.name.clone(),
                quantity: item.quantity,
                unit_price: package.price,
            })
        })
        .collect()
}

/// Denormalized order summary, e.g. "Spotify Premium" or
/// "Spotify Premium + 2 more".
fn primary_product_label(lines: &[ResolvedLine]) -> String {
    match lines {
        [] => String::new(),
        [only] => only.product_name.clone(),
        [first, rest @ ..] => format!("{} + {} more", first.product_name, rest.len()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pixelmart_core::{PackageId, ProductId};

    use super::*;

    fn line(name: &str) -> ResolvedLine {
        ResolvedLine {
            product_id: ProductId::generate(),
            package_id: PackageId::generate(),
            product_name: name.to_string(),
            package_name: "1 month".to_string(),
            quantity: 1,
            unit_price: Decimal::from(500),
        }
    }

    #[test]
    fn test_primary_product_single_line() {
        assert_eq!(primary_product_label(&[line("Spotify Premium")]), "Spotify Premium");
    }

    #[test]
    fn test_primary_product_multiple_lines() {
        let lines = [line("Spotify Premium"), line("Netflix"), line("Canva Pro")];
        assert_eq!(primary_product_label(&lines), "Spotify Premium + 2 more");
    }

    #[test]
    fn test_blank_details_rejected() {
        let details = CheckoutDetails {
            customer_name: "  ".to_string(),
            customer_phone: "017".to_string(),
            customer_email: None,
            payment_method: PaymentMethod::Bkash,
            transaction_reference: "TX1".to_string(),
            promo_code: None,
        };
        assert!(matches!(
            validate_details(&details),
            Err(CheckoutError::MissingField("name"))
        ));
    }

    #[test]
    fn test_unknown_cart_item_rejected() {
        let mut cart = Cart::default();
        cart.add(ProductId::generate(), PackageId::generate());
        let err = resolve_lines(&cart, &[]).unwrap_err();
        assert!(matches!(err, CheckoutError::UnknownItem));
    }
}
