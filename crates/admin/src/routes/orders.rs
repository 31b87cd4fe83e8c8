//! Order management: list, detail, status changes, thread replies.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tracing::instrument;

use pixelmart_core::{OrderId, OrderStatus, SenderRole};

use crate::backend::types::{NewOrderCommunication, Order, OrderCommunication, OrderItem};
use crate::error::AdminError;
use crate::filters;
use crate::state::AppState;

/// Order list filter parameters.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<OrderStatus>,
}

/// Status change form data.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: OrderStatus,
}

/// Thread reply form data.
#[derive(Debug, Deserialize)]
pub struct ReplyForm {
    pub content: String,
}

/// Order list page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/list.html")]
pub struct OrderListTemplate {
    pub orders: Vec<Order>,
    pub status: Option<OrderStatus>,
}

/// Order detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub thread: Vec<OrderCommunication>,
}

/// List orders, newest first, optionally filtered by status.
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AdminError> {
    let mut rows = state.backend().from("orders").order("created_at.desc");
    if let Some(status) = query.status {
        rows = rows.eq("status", status.as_str());
    }
    let orders: Vec<Order> = rows.limit(200).fetch().await?;

    Ok(OrderListTemplate {
        orders,
        status: query.status,
    })
}

/// Show one order with its items and communication thread.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<impl IntoResponse, AdminError> {
    let order: Order = state.backend().from("orders").eq("id", id).fetch_one().await?;
    let items: Vec<OrderItem> = state
        .backend()
        .from("order_items")
        .eq("order_id", id)
        .fetch()
        .await?;
    let thread: Vec<OrderCommunication> = state
        .backend()
        .from("order_communications")
        .eq("order_id", id)
        .order("created_at.asc")
        .fetch()
        .await?;

    Ok(OrderShowTemplate {
        order,
        items,
        thread,
    })
}

/// Change an order's status.
#[instrument(skip(state))]
pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Form(form): Form<StatusForm>,
) -> Result<impl IntoResponse, AdminError> {
    state
        .backend()
        .update(
            "orders",
            &[("id", id.to_string())],
            &serde_json::json!({ "status": form.status }),
        )
        .await?;

    Ok(Redirect::to(&format!("/orders/{id}")))
}

/// Reply on the order's communication thread.
#[instrument(skip(state, form))]
pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Form(form): Form<ReplyForm>,
) -> Result<impl IntoResponse, AdminError> {
    let content = form.content.trim();
    if content.is_empty() {
        return Err(AdminError::BadRequest("message is empty".to_string()));
    }

    let _row: OrderCommunication = state
        .backend()
        .insert_one(
            "order_communications",
            &NewOrderCommunication {
                order_id: id,
                sender_role: SenderRole::Admin,
                content: content.to_string(),
            },
        )
        .await?;

    Ok(Redirect::to(&format!("/orders/{id}")))
}
