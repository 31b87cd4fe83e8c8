//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::backend::types::{Offer, Product};
use crate::error::AppError;
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::state::AppState;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub popular: Vec<Product>,
    pub offers: Vec<Offer>,
    pub logged_in: bool,
}

/// Display the home page: popular products plus any running offers.
#[instrument(skip(state, user))]
pub async fn home(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
) -> Result<impl IntoResponse, AppError> {
    let products = state.backend().active_products().await?;
    let offers = state.backend().active_offers().await?;

    let now = chrono::Utc::now();
    let popular: Vec<Product> = products.into_iter().filter(|p| p.is_popular).collect();
    let offers: Vec<Offer> = offers.into_iter().filter(|o| !o.is_expired(now)).collect();

    Ok(HomeTemplate {
        popular,
        offers,
        logged_in: user.is_some(),
    })
}
