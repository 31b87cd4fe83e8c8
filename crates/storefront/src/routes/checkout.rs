//! Checkout route handlers.
//!
//! Payment is manual: the customer sends money to one of the wallet
//! numbers published in site settings and submits the transaction
//! reference with the order. The backend never charges anything.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use pixelmart_core::{Cart, OrderId, PaymentMethod};

use crate::backend::types::{Order, OrderItem, SiteSetting};
use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::routes::cart::{CartView, get_cart, save_cart};
use crate::services::checkout::{CheckoutDetails, CheckoutError, CheckoutService};
use crate::state::AppState;

/// Checkout form data.
#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: Option<String>,
    pub payment_method: PaymentMethod,
    pub transaction_reference: String,
    pub promo_code: Option<String>,
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/form.html")]
pub struct CheckoutFormTemplate {
    pub cart: CartView,
    pub settings: Vec<SiteSetting>,
    pub error: Option<String>,
    pub logged_in: bool,
}

/// Order confirmation template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/confirmation.html")]
pub struct ConfirmationTemplate {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub logged_in: bool,
}

/// Display the checkout form with the priced cart and wallet numbers.
#[instrument(skip(state, session))]
pub async fn form(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    session: Session,
) -> Result<Response, AppError> {
    let cart = get_cart(&session).await;
    if cart.is_empty() {
        return Ok(Redirect::to("/cart").into_response());
    }

    let products = state.backend().active_products().await?;
    let settings = state.backend().site_settings().await?;

    Ok(CheckoutFormTemplate {
        cart: CartView::build(&cart, &products),
        settings,
        error: None,
        logged_in: true,
    }
    .into_response())
}

/// Place the order. The cart is cleared only after the order write
/// succeeded; every failure leaves it intact for another attempt.
#[instrument(skip(state, session, form))]
pub async fn submit(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    Form(form): Form<CheckoutForm>,
) -> Result<Response, AppError> {
    let cart = get_cart(&session).await;
    let service = CheckoutService::new(state.backend());

    let details = CheckoutDetails {
        customer_name: form.customer_name,
        customer_phone: form.customer_phone,
        customer_email: form.customer_email.filter(|e| !e.trim().is_empty()),
        payment_method: form.payment_method,
        transaction_reference: form.transaction_reference,
        promo_code: form.promo_code,
    };

    match service.place_order(&user, &cart, details).await {
        Ok(order) => {
            save_cart(&session, &Cart::default())
                .await
                .map_err(|e| AppError::Internal(e.to_string()))?;
            Ok(Redirect::to(&format!("/checkout/confirmation/{}", order.id)).into_response())
        }
        Err(err) => render_failure(&state, &cart, err).await,
    }
}

/// Display the confirmation page for a placed order.
#[instrument(skip(state, user))]
pub async fn confirmation(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(order_id): Path<OrderId>,
) -> Result<impl IntoResponse, AppError> {
    let order: Order = state
        .backend()
        .from("orders")
        .eq("id", order_id)
        .auth(&user.access_token)
        .fetch_one()
        .await?;

    let items: Vec<OrderItem> = state
        .backend()
        .from("order_items")
        .eq("order_id", order_id)
        .auth(&user.access_token)
        .fetch()
        .await?;

    Ok(ConfirmationTemplate {
        order,
        items,
        logged_in: true,
    })
}

/// Re-render the form with the failure message; the session cart is
/// left untouched.
async fn render_failure(
    state: &AppState,
    cart: &Cart,
    err: CheckoutError,
) -> Result<Response, AppError> {
    let message = match &err {
        CheckoutError::EmptyCart => "Your cart is empty".to_string(),
        CheckoutError::MissingField(field) => format!("Please fill in your {field}"),
        CheckoutError::UnknownItem => {
            "An item in your cart is no longer available".to_string()
        }
        CheckoutError::InvalidPromo(message) => message.clone(),
        CheckoutError::ItemsWriteFailed(_) | CheckoutError::Backend(_) => {
            tracing::error!(error = %err, "order placement failed");
            "Your order could not be placed, please try again".to_string()
        }
    };

    let products = state.backend().active_products().await?;
    let settings = state.backend().site_settings().await?;

    Ok(CheckoutFormTemplate {
        cart: CartView::build(cart, &products),
        settings,
        error: Some(message),
        logged_in: true,
    }
    .into_response())
}
