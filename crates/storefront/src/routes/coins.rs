//! Coin wallet route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireAuth;
use crate::services::coins::{CoinService, WalletOverview};
use crate::state::AppState;

/// Promo purchase form data.
#[derive(Debug, Deserialize)]
pub struct PurchaseForm {
    pub promo_id: String,
}

/// Wallet page template.
#[derive(Template, WebTemplate)]
#[template(path = "coins/index.html")]
pub struct WalletTemplate {
    pub overview: WalletOverview,
    pub notice: Option<String>,
    pub notice_is_error: bool,
    pub logged_in: bool,
}

/// Display the wallet: balance, ledger, promo store, owned codes.
#[instrument(skip(state, user))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse, AppError> {
    let service = CoinService::new(state.backend());
    let overview = service.overview(&user).await?;

    Ok(WalletTemplate {
        overview,
        notice: None,
        notice_is_error: false,
        logged_in: true,
    })
}

/// Buy a promo code with coins, then re-render the whole wallet so
/// balance, ledger, store and owned codes all reflect the purchase.
/// A declined purchase changed nothing, so the page shown with the
/// error notice is the one fetched before the attempt.
#[instrument(skip(state, user))]
pub async fn purchase(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<PurchaseForm>,
) -> Result<impl IntoResponse, AppError> {
    let service = CoinService::new(state.backend());
    let overview = service.overview(&user).await?;
    let (result, refreshed) = service.purchase_and_refresh(&user, &form.promo_id).await?;

    // The RPC's message is shown verbatim, success or not
    Ok(WalletTemplate {
        overview: refreshed.unwrap_or(overview),
        notice: Some(result.message),
        notice_is_error: !result.success,
        logged_in: true,
    })
}
