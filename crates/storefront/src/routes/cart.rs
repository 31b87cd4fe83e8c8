//! Cart route handlers.
//!
//! The cart lives in the session and is re-priced against the active
//! catalog on every render, so a package price change shows up without
//! any cart mutation. Mutating handlers return HTMX fragments plus an
//! `HX-Trigger` so the count badge refreshes.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{AppendHeaders, IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use pixelmart_core::{Cart, PackageId, ProductId};

use crate::backend::types::Product;
use crate::error::AppError;
use crate::filters;
use crate::models::session_keys;
use crate::state::AppState;

/// One priced cart line for templates.
#[derive(Clone)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub package_id: PackageId,
    pub slug: String,
    pub product_name: String,
    pub package_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Cart display data for templates.
#[derive(Clone)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub subtotal: Decimal,
    pub unit_count: u32,
}

impl CartView {
    /// Price the session cart against the active catalog. Lines whose
    /// product or package left the catalog are shown with a zero price
    /// rather than dropped; checkout still rejects them.
    pub(crate) fn build(cart: &Cart, products: &[Product]) -> Self {
        let lines: Vec<CartLineView> = cart
            .items()
            .iter()
            .map(|item| {
                let product = products.iter().find(|p| p.id == item.product_id);
                let package = product.and_then(|p| p.package(item.package_id));
                let unit_price = package.map_or(Decimal::ZERO, |p| p.price);
                CartLineView {
                    product_id: item.product_id,
                    package_id: item.package_id,
                    slug: product.map(|p| p.slug.clone()).unwrap_or_default(),
                    product_name: product
                        .map_or_else(|| "Unavailable".to_string(), |p| p.name.clone()),
                    package_name: package.map(|p| p.name.clone()).unwrap_or_default(),
                    quantity: item.quantity,
                    unit_price,
                    line_total: unit_price * Decimal::from(item.quantity),
                }
            })
            .collect();

        let subtotal = cart.subtotal(|package_id| {
            products
                .iter()
                .find_map(|p| p.package(package_id))
                .map(|pkg| pkg.price)
        });

        Self {
            lines,
            subtotal,
            unit_count: cart.unit_count(),
        }
    }
}

// =============================================================================
// Session helpers
// =============================================================================

/// Read the cart from the session, empty if absent.
pub async fn get_cart(session: &Session) -> Cart {
    session
        .get::<Cart>(session_keys::CART)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Write the cart back to the session.
pub async fn save_cart(
    session: &Session,
    cart: &Cart,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CART, cart).await
}

// =============================================================================
// Forms and templates
// =============================================================================

/// Add-to-cart form data.
#[derive(Debug, Deserialize)]
pub struct AddForm {
    pub product_id: ProductId,
    pub package_id: PackageId,
}

/// Quantity update form data. Quantity 0 removes the line.
#[derive(Debug, Deserialize)]
pub struct UpdateForm {
    pub product_id: ProductId,
    pub package_id: PackageId,
    pub quantity: u32,
}

/// Remove-line form data.
#[derive(Debug, Deserialize)]
pub struct RemoveForm {
    pub product_id: ProductId,
    pub package_id: PackageId,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub cart: CartView,
    pub logged_in: bool,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartView,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the cart page.
#[instrument(skip(state, session))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let cart = get_cart(&session).await;
    let products = state.backend().active_products().await?;
    let logged_in = session
        .get::<crate::models::CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
        .is_some();

    Ok(CartShowTemplate {
        cart: CartView::build(&cart, &products),
        logged_in,
    })
}

/// Add one unit of a package to the cart (HTMX).
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AddForm>,
) -> Result<Response, AppError> {
    // Reject lines the catalog doesn't know before touching the session
    let products = state.backend().active_products().await?;
    let known = products
        .iter()
        .any(|p| p.id == form.product_id && p.package(form.package_id).is_some());
    if !known {
        return Err(AppError::BadRequest("unknown product or package".to_string()));
    }

    let mut cart = get_cart(&session).await;
    cart.add(form.product_id, form.package_id);
    save_cart(&session, &cart)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok((
        AppendHeaders([("HX-Trigger", "cart-updated")]),
        CartCountTemplate {
            count: cart.unit_count(),
        },
    )
        .into_response())
}

/// Set a line's quantity; zero removes it (HTMX).
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<UpdateForm>,
) -> Result<Response, AppError> {
    let mut cart = get_cart(&session).await;
    cart.set_quantity(form.product_id, form.package_id, form.quantity);
    save_cart(&session, &cart)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let products = state.backend().active_products().await?;
    Ok((
        AppendHeaders([("HX-Trigger", "cart-updated")]),
        CartItemsTemplate {
            cart: CartView::build(&cart, &products),
        },
    )
        .into_response())
}

/// Remove a line from the cart (HTMX).
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RemoveForm>,
) -> Result<Response, AppError> {
    let mut cart = get_cart(&session).await;
    cart.remove(form.product_id, form.package_id);
    save_cart(&session, &cart)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let products = state.backend().active_products().await?;
    Ok((
        AppendHeaders([("HX-Trigger", "cart-updated")]),
        CartItemsTemplate {
            cart: CartView::build(&cart, &products),
        },
    )
        .into_response())
}

/// Cart count badge fragment.
pub async fn count(session: Session) -> impl IntoResponse {
    let cart = get_cart(&session).await;
    CartCountTemplate {
        count: cart.unit_count(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pixelmart_core::ProductId;

    use crate::backend::types::{Package, ProductCategory};

    use super::*;

    fn product(name: &str, price: Decimal) -> Product {
        let id = ProductId::generate();
        Product {
            id,
            name: name.to_string(),
            slug: name.to_lowercase().replace(' ', "-"),
            category: ProductCategory::Subscription,
            description: None,
            body_markdown: None,
            image_url: None,
            is_active: true,
            is_popular: false,
            priority: 0,
            packages: vec![Package {
                id: PackageId::generate(),
                product_id: id,
                name: "1 month".to_string(),
                duration_days: Some(30),
                price,
                original_price: None,
            }],
        }
    }

    #[test]
    fn test_view_subtotal_is_the_cart_subtotal() {
        let catalog = vec![product("Spotify Premium", Decimal::new(500, 0))];
        let package_id = catalog[0].packages[0].id;
        let mut cart = Cart::new();
        cart.add(catalog[0].id, package_id);
        cart.add(catalog[0].id, package_id);

        let view = CartView::build(&cart, &catalog);

        assert_eq!(view.subtotal, Decimal::new(1000, 0));
        assert_eq!(
            view.subtotal,
            cart.subtotal(|p| (p == package_id).then_some(Decimal::new(500, 0)))
        );
    }

    #[test]
    fn test_stale_line_shows_at_zero_and_prices_nothing() {
        let catalog = vec![product("Spotify Premium", Decimal::new(500, 0))];
        let mut cart = Cart::new();
        cart.add(catalog[0].id, catalog[0].packages[0].id);
        // A line whose package left the catalog
        cart.add(ProductId::generate(), PackageId::generate());

        let view = CartView::build(&cart, &catalog);

        assert_eq!(view.lines.len(), 2);
        assert_eq!(view.lines[1].unit_price, Decimal::ZERO);
        assert_eq!(view.subtotal, Decimal::new(500, 0));
    }
}
