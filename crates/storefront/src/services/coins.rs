//! Coin wallet service.
//!
//! The backend owns every balance: reads are plain row fetches, and a
//! promo-code purchase goes through the atomic `purchase_promo_code`
//! RPC. This service never computes a balance client-side.

use tracing::instrument;

use crate::backend::types::{CoinTransaction, PromoPurchaseResult, PurchasablePromoCode, UserCoins, UserPromoCode};
use crate::backend::{BackendClient, BackendError};
use crate::models::CurrentUser;

/// Everything the wallet page shows in one struct.
#[derive(Debug, Clone)]
pub struct WalletOverview {
    pub coins: Option<UserCoins>,
    pub transactions: Vec<CoinTransaction>,
    pub purchasable: Vec<PurchasablePromoCode>,
    pub owned: Vec<UserPromoCode>,
}

/// Coin wallet service.
pub struct CoinService<'a> {
    backend: &'a BackendClient,
}

impl<'a> CoinService<'a> {
    /// Create a new coin service.
    #[must_use]
    pub const fn new(backend: &'a BackendClient) -> Self {
        Self { backend }
    }

    /// Fetch balance, ledger, store and owned codes for the wallet page.
    ///
    /// A user who has never earned coins has no `user_coins` row yet;
    /// that shows as a zero balance, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the four reads fails.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn overview(&self, user: &CurrentUser) -> Result<WalletOverview, BackendError> {
        let coins = self
            .backend
            .from("user_coins")
            .eq("user_id", user.id)
            .auth(&user.access_token)
            .fetch_optional()
            .await?;

        let transactions = self
            .backend
            .from("coin_transactions")
            .eq("user_id", user.id)
            .order("created_at.desc")
            .limit(50)
            .auth(&user.access_token)
            .fetch()
            .await?;

        let purchasable = self
            .backend
            .from("purchasable_promo_codes")
            .eq("is_active", "true")
            .order("coin_cost.asc")
            .auth(&user.access_token)
            .fetch()
            .await?;

        let owned = self
            .backend
            .from("user_promo_codes")
            .eq("user_id", user.id)
            .order("created_at.desc")
            .auth(&user.access_token)
            .fetch()
            .await?;

        Ok(WalletOverview {
            coins,
            transactions,
            purchasable,
            owned,
        })
    }

    /// Spend coins on a promo code through the atomic RPC.
    ///
    /// The backend decides sufficiency and performs the debit; the
    /// returned message is surfaced verbatim either way.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC request itself fails; a declined
    /// purchase is an `Ok` result with `success == false`.
    #[instrument(skip(self, user), fields(user_id = %user.id, promo_id = %promo_id))]
    pub async fn purchase_promo(
        &self,
        user: &CurrentUser,
        promo_id: &str,
    ) -> Result<PromoPurchaseResult, BackendError> {
        self.backend
            .rpc(
                Some(&user.access_token),
                "purchase_promo_code",
                serde_json::json!({ "user_id": user.id, "promo_id": promo_id }),
            )
            .await
    }

    /// Purchase, then refresh the four wallet views only if the backend
    /// accepted it. A declined purchase changed nothing, so nothing is
    /// re-read and `None` comes back.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC or, after a success, any of the
    /// refresh reads fails.
    #[instrument(skip(self, user), fields(user_id = %user.id, promo_id = %promo_id))]
    pub async fn purchase_and_refresh(
        &self,
        user: &CurrentUser,
        promo_id: &str,
    ) -> Result<(PromoPurchaseResult, Option<WalletOverview>), BackendError> {
        let result = self.purchase_promo(user, promo_id).await?;
        let refreshed = if result.success {
            Some(self.overview(user).await?)
        } else {
            None
        };
        Ok((result, refreshed))
    }
}
