//! Coin wallet contract against the mock backend.
//!
//! The client never computes balances: a promo purchase is one RPC, and
//! the wallet overview is exactly four independent reads.

#![allow(clippy::unwrap_used)]

use serde_json::json;
use uuid::Uuid;

use pixelmart_integration_tests::{MockBackend, test_user};
use pixelmart_storefront::services::coins::CoinService;

#[tokio::test]
async fn overview_performs_four_reads() {
    let mock = MockBackend::spawn().await;
    let user = test_user();
    mock.seed(
        "user_coins",
        vec![json!({
            "user_id": user.id,
            "balance": 120,
            "updated_at": chrono::Utc::now().to_rfc3339(),
        })],
    );
    let client = mock.client();
    let service = CoinService::new(&client);

    let overview = service.overview(&user).await.unwrap();

    assert_eq!(overview.coins.unwrap().balance, 120);
    assert!(overview.transactions.is_empty());
    assert_eq!(mock.count("GET", "/rest/v1/user_coins"), 1);
    assert_eq!(mock.count("GET", "/rest/v1/coin_transactions"), 1);
    assert_eq!(mock.count("GET", "/rest/v1/purchasable_promo_codes"), 1);
    assert_eq!(mock.count("GET", "/rest/v1/user_promo_codes"), 1);
}

#[tokio::test]
async fn missing_wallet_row_reads_as_zero_balance() {
    let mock = MockBackend::spawn().await;
    let client = mock.client();
    let service = CoinService::new(&client);

    let overview = service.overview(&test_user()).await.unwrap();

    assert!(overview.coins.is_none());
}

#[tokio::test]
async fn purchase_is_a_single_rpc_and_returns_its_message() {
    let mock = MockBackend::spawn().await;
    mock.set_rpc(
        "purchase_promo_code",
        json!({
            "success": true,
            "message": "Promo code purchased",
            "code": "COIN-AB12",
        }),
    );
    let client = mock.client();
    let service = CoinService::new(&client);
    let user = test_user();
    let promo_id = Uuid::new_v4().to_string();

    let result = service.purchase_promo(&user, &promo_id).await.unwrap();

    assert!(result.success);
    assert_eq!(result.message, "Promo code purchased");
    assert_eq!(result.code.as_deref(), Some("COIN-AB12"));
    assert_eq!(mock.count("POST", "/rest/v1/rpc/purchase_promo_code"), 1);
    // No table write accompanies a purchase; the RPC owns the ledger
    assert_eq!(mock.count("POST", "/rest/v1/coin_transactions"), 0);

    // The RPC names the buyer; the backend never infers it
    let rpc = mock
        .requests()
        .into_iter()
        .find(|r| r.path == "/rest/v1/rpc/purchase_promo_code")
        .unwrap();
    let body = rpc.body.unwrap();
    assert_eq!(body["user_id"], json!(user.id));
    assert_eq!(body["promo_id"], json!(promo_id));
}

#[tokio::test]
async fn successful_purchase_refreshes_each_wallet_view_once() {
    let mock = MockBackend::spawn().await;
    mock.set_rpc(
        "purchase_promo_code",
        json!({ "success": true, "message": "Promo code purchased", "code": "COIN-AB12" }),
    );
    let client = mock.client();
    let service = CoinService::new(&client);

    let (result, refreshed) = service
        .purchase_and_refresh(&test_user(), &Uuid::new_v4().to_string())
        .await
        .unwrap();

    assert!(result.success);
    assert!(refreshed.is_some());
    assert_eq!(mock.count("GET", "/rest/v1/user_coins"), 1);
    assert_eq!(mock.count("GET", "/rest/v1/coin_transactions"), 1);
    assert_eq!(mock.count("GET", "/rest/v1/purchasable_promo_codes"), 1);
    assert_eq!(mock.count("GET", "/rest/v1/user_promo_codes"), 1);
}

#[tokio::test]
async fn declined_purchase_reads_nothing_back() {
    let mock = MockBackend::spawn().await;
    mock.set_rpc(
        "purchase_promo_code",
        json!({ "success": false, "message": "Insufficient coin balance" }),
    );
    let client = mock.client();
    let service = CoinService::new(&client);

    let (result, refreshed) = service
        .purchase_and_refresh(&test_user(), &Uuid::new_v4().to_string())
        .await
        .unwrap();

    assert!(!result.success);
    assert!(refreshed.is_none());
    // The RPC is the only traffic; nothing changed, nothing is re-read
    assert_eq!(mock.count("POST", "/rest/v1/rpc/purchase_promo_code"), 1);
    assert_eq!(mock.count("GET", "/rest/v1/user_coins"), 0);
    assert_eq!(mock.count("GET", "/rest/v1/coin_transactions"), 0);
    assert_eq!(mock.count("GET", "/rest/v1/purchasable_promo_codes"), 0);
    assert_eq!(mock.count("GET", "/rest/v1/user_promo_codes"), 0);
}

#[tokio::test]
async fn failed_purchase_surfaces_the_backend_message_verbatim() {
    let mock = MockBackend::spawn().await;
    mock.set_rpc(
        "purchase_promo_code",
        json!({ "success": false, "message": "Insufficient coin balance" }),
    );
    let client = mock.client();
    let service = CoinService::new(&client);

    let result = service
        .purchase_promo(&test_user(), &Uuid::new_v4().to_string())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.message, "Insufficient coin balance");
    assert!(result.code.is_none());
}
