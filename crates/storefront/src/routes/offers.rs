//! Offer route handlers.
//!
//! Offers are time-boxed bundles; the countdown is rendered from the
//! stored end timestamp, expired offers are filtered server-side.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use crate::backend::types::Offer;
use crate::error::AppError;
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::state::AppState;

/// Offer listing template.
#[derive(Template, WebTemplate)]
#[template(path = "offers/index.html")]
pub struct OfferIndexTemplate {
    pub offers: Vec<Offer>,
    pub logged_in: bool,
}

/// Display all running offers.
#[instrument(skip(state, user))]
pub async fn index(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
) -> Result<impl IntoResponse, AppError> {
    let now = chrono::Utc::now();
    let offers: Vec<Offer> = state
        .backend()
        .active_offers()
        .await?
        .into_iter()
        .filter(|o| !o.is_expired(now))
        .collect();

    Ok(OfferIndexTemplate {
        offers,
        logged_in: user.is_some(),
    })
}
