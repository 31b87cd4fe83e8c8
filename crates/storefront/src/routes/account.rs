//! Account route handlers: overview, subscriptions, order history and
//! per-order communication threads.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Multipart, Path, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use pixelmart_core::OrderId;

use crate::backend::types::{Order, OrderCommunication, OrderItem, UserSubscription};
use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::services::chat::{ChatError, ChatService};
use crate::services::notifier::Toast;
use crate::state::AppState;

/// Account overview template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountTemplate {
    pub email: String,
    pub subscriptions: Vec<UserSubscription>,
    pub toasts: Vec<Toast>,
    pub logged_in: bool,
}

/// Order history template.
#[derive(Template, WebTemplate)]
#[template(path = "account/orders.html")]
pub struct OrdersTemplate {
    pub orders: Vec<Order>,
    pub logged_in: bool,
}

/// Order detail template with its communication thread.
#[derive(Template, WebTemplate)]
#[template(path = "account/order_show.html")]
pub struct OrderShowTemplate {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub thread: Vec<OrderCommunication>,
    pub logged_in: bool,
}

/// Expiry toast list fragment (polled by the account page).
#[derive(Template, WebTemplate)]
#[template(path = "partials/toast_list.html")]
pub struct ToastListTemplate {
    pub toasts: Vec<Toast>,
}

/// Order thread message form data.
#[derive(Debug, Deserialize)]
pub struct ThreadMessageForm {
    pub content: String,
}

/// Account overview: active subscriptions plus any queued expiry toasts.
#[instrument(skip(state, user))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, AppError> {
    let subscriptions: Vec<UserSubscription> = state
        .backend()
        .from("user_subscriptions")
        .eq("user_id", user.id)
        .order("expires_at.asc")
        .auth(&user.access_token)
        .fetch()
        .await?;

    let toasts = state.notifier().take_toasts(user.id);

    Ok(AccountTemplate {
        email: user.email.as_str().to_string(),
        subscriptions,
        toasts,
        logged_in: true,
    })
}

/// Drain and render pending expiry toasts (HTMX poll).
pub async fn toasts(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> impl IntoResponse {
    ToastListTemplate {
        toasts: state.notifier().take_toasts(user.id),
    }
}

/// Order history, newest first.
#[instrument(skip(state, user))]
pub async fn orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, AppError> {
    let orders: Vec<Order> = state
        .backend()
        .from("orders")
        .eq("user_id", user.id)
        .order("created_at.desc")
        .auth(&user.access_token)
        .fetch()
        .await?;

    Ok(OrdersTemplate {
        orders,
        logged_in: true,
    })
}

/// One order with its items and communication thread.
#[instrument(skip(state, user))]
pub async fn order_show(
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

    let service = ChatService::new(state.backend(), state.realtime());
    let thread = service
        .order_thread(&user, order_id)
        .await
        .map_err(thread_error)?;

    Ok(OrderShowTemplate {
        order,
        items,
        thread,
        logged_in: true,
    })
}

/// Append a message to an order's thread, then show the order again.
#[instrument(skip(state, user, form))]
pub async fn post_thread_message(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(order_id): Path<OrderId>,
    Form(form): Form<ThreadMessageForm>,
) -> Result<Response, AppError> {
    let service = ChatService::new(state.backend(), state.realtime());
    service
        .send_order_message(&user, order_id, &form.content, None)
        .await
        .map_err(thread_error)?;

    Ok(Redirect::to(&format!("/account/orders/{order_id}")).into_response())
}

/// Attach a file to an order's thread.
#[instrument(skip(state, user, multipart))]
pub async fn post_thread_attachment(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(order_id): Path<OrderId>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("attachment") {
            continue;
        }
        let filename = field.file_name().unwrap_or("attachment").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let path = format!(
            "orders/{order_id}/{}-{}",
            Uuid::new_v4(),
            crate::services::chat::sanitize(&filename)
        );
        let url = state
            .backend()
            .upload(Some(&user.access_token), &path, bytes.to_vec(), &content_type)
            .await?;

        let service = ChatService::new(state.backend(), state.realtime());
        service
            .send_order_message(&user, order_id, "", Some(url))
            .await
            .map_err(thread_error)?;

        return Ok(Redirect::to(&format!("/account/orders/{order_id}")).into_response());
    }

    Err(AppError::BadRequest("no attachment field".to_string()))
}

fn thread_error(err: ChatError) -> AppError {
    match err {
        ChatError::EmptyMessage => AppError::BadRequest("message is empty".to_string()),
        ChatError::Backend(err) => AppError::Backend(err),
    }
}
