//! Product catalog route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use crate::backend::types::{Product, ProductCategory};
use crate::error::AppError;
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::state::AppState;

/// Category filter for the listing page.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub category: Option<ProductCategory>,
}

/// Product listing template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductIndexTemplate {
    pub products: Vec<Product>,
    pub category: Option<ProductCategory>,
    pub logged_in: bool,
}

/// Product detail template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub product: Product,
    pub logged_in: bool,
}

/// Display the product listing, optionally filtered by category.
#[instrument(skip(state, user))]
pub async fn index(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let mut products = state.backend().active_products().await?;
    if let Some(category) = query.category {
        products.retain(|p| p.category == category);
    }
    Ok(ProductIndexTemplate {
        products,
        category: query.category,
        logged_in: user.is_some(),
    })
}

/// Display one product with its packages.
#[instrument(skip(state, user))]
pub async fn show(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let product = state.backend().product_by_slug(&slug).await?;
    Ok(ProductShowTemplate {
        product,
        logged_in: user.is_some(),
    })
}
