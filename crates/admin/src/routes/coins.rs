//! Manual coin awards.
//!
//! The balance arithmetic lives in the backend's `award_coins` RPC; this
//! console only submits the award and shows the outcome.

use askama::Template;
use askama_web::WebTemplate;
use axum::{Form, extract::State, response::IntoResponse};
use serde::Deserialize;
use tracing::instrument;

use pixelmart_core::{CoinSource, UserId};

use crate::error::AdminError;
use crate::state::AppState;

/// Coin award form data.
#[derive(Debug, Deserialize)]
pub struct AwardForm {
    pub user_id: UserId,
    pub amount: i64,
    pub description: String,
}

/// Award page template.
#[derive(Template, WebTemplate)]
#[template(path = "coins/award.html")]
pub struct AwardTemplate {
    pub notice: Option<String>,
}

/// Show the award form.
pub async fn form() -> AwardTemplate {
    AwardTemplate { notice: None }
}

/// Submit an award through the backend RPC.
#[instrument(skip(state, form), fields(user_id = %form.user_id, amount = form.amount))]
pub async fn award(
    State(state): State<AppState>,
    Form(form): Form<AwardForm>,
) -> Result<impl IntoResponse, AdminError> {
    if form.amount == 0 {
        return Err(AdminError::BadRequest("amount must be non-zero".to_string()));
    }
    let description = form.description.trim();
    if description.is_empty() {
        return Err(AdminError::BadRequest("description is required".to_string()));
    }

    let _result: serde_json::Value = state
        .backend()
        .rpc("award_coins", award_payload(form.user_id, form.amount, description))
        .await?;

    Ok(AwardTemplate {
        notice: Some(format!(
            "Awarded {} coins to {}",
            form.amount, form.user_id
        )),
    })
}

/// Argument object for the `award_coins` RPC. Console awards always
/// carry the `admin_award` ledger source.
fn award_payload(user_id: UserId, amount: i64, description: &str) -> serde_json::Value {
    serde_json::json!({
        "user_id": user_id,
        "amount": amount,
        "source": CoinSource::AdminAward,
        "description": description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_award_payload_carries_the_ledger_source() {
        let user_id = UserId::generate();
        let payload = award_payload(user_id, 50, "loyalty bonus");

        assert_eq!(payload["source"], "admin_award");
        assert_eq!(payload["user_id"], user_id.to_string());
        assert_eq!(payload["amount"], 50);
        assert_eq!(payload["description"], "loyalty bonus");
    }
}
