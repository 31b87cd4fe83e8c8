//! Subscription expiry notifier against the mock backend.
//!
//! The claim RPC is the idempotency marker; these tests drive the sweep
//! directly and assert one toast per (subscription, kind), plus the
//! deactivate-before-claim ordering for expired subscriptions.

#![allow(clippy::unwrap_used)]

use serde_json::json;
use uuid::Uuid;

use pixelmart_core::UserId;
use pixelmart_integration_tests::MockBackend;
use pixelmart_storefront::services::notifier::Notifier;

fn seed_expired_subscription(mock: &MockBackend, user_id: UserId) -> Uuid {
    let subscription_id = Uuid::new_v4();
    mock.seed(
        "user_subscriptions",
        vec![json!({
            "id": subscription_id,
            "user_id": user_id,
            "product_name": "Spotify Premium",
            "expires_at": (chrono::Utc::now() - chrono::Duration::days(1)).to_rfc3339(),
            "is_active": true,
        })],
    );
    subscription_id
}

#[tokio::test]
async fn claimed_notification_queues_exactly_one_toast() {
    let mock = MockBackend::spawn().await;
    let user_id = UserId::generate();
    seed_expired_subscription(&mock, user_id);
    mock.set_rpc("claim_subscription_notification", json!({ "claimed": true }));

    let notifier = Notifier::spawn(mock.client());
    notifier.register(user_id, "test-access-token".to_string());

    notifier.sweep().await;
    notifier.sweep().await;

    let toasts = notifier.take_toasts(user_id);
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].message, "Your Spotify Premium subscription has expired");

    // Repeated sweeps did not retry the claim either
    assert_eq!(
        mock.count("POST", "/rest/v1/rpc/claim_subscription_notification"),
        1
    );
}

#[tokio::test]
async fn lost_claim_produces_no_toast() {
    let mock = MockBackend::spawn().await;
    let user_id = UserId::generate();
    seed_expired_subscription(&mock, user_id);
    mock.set_rpc("claim_subscription_notification", json!({ "claimed": false }));

    let notifier = Notifier::spawn(mock.client());
    notifier.register(user_id, "test-access-token".to_string());

    notifier.sweep().await;

    assert!(notifier.take_toasts(user_id).is_empty());
    assert_eq!(
        mock.count("POST", "/rest/v1/rpc/claim_subscription_notification"),
        1
    );
}

#[tokio::test]
async fn expired_subscription_is_deactivated_before_the_claim() {
    let mock = MockBackend::spawn().await;
    let user_id = UserId::generate();
    seed_expired_subscription(&mock, user_id);
    mock.set_rpc("claim_subscription_notification", json!({ "claimed": true }));

    let notifier = Notifier::spawn(mock.client());
    notifier.register(user_id, "test-access-token".to_string());

    notifier.sweep().await;

    let requests = mock.requests();
    let deactivate_index = requests
        .iter()
        .position(|r| r.method == "PATCH" && r.path == "/rest/v1/user_subscriptions")
        .expect("deactivation patch");
    let claim_index = requests
        .iter()
        .position(|r| r.path == "/rest/v1/rpc/claim_subscription_notification")
        .expect("claim rpc");
    assert!(deactivate_index < claim_index);

    assert_eq!(
        requests[deactivate_index].body.as_ref().unwrap()["is_active"],
        json!(false)
    );
    assert_eq!(mock.rows("user_subscriptions")[0]["is_active"], json!(false));
}

#[tokio::test]
async fn deactivated_but_unclaimed_subscription_still_gets_its_toast() {
    // A crash after the deactivation patch leaves an inactive row with
    // no claim recorded; the next sweep must still deliver the toast.
    let mock = MockBackend::spawn().await;
    let user_id = UserId::generate();
    mock.seed(
        "user_subscriptions",
        vec![json!({
            "id": Uuid::new_v4(),
            "user_id": user_id,
            "product_name": "Spotify Premium",
            "expires_at": (chrono::Utc::now() - chrono::Duration::days(1)).to_rfc3339(),
            "is_active": false,
        })],
    );
    mock.set_rpc("claim_subscription_notification", json!({ "claimed": true }));

    let notifier = Notifier::spawn(mock.client());
    notifier.register(user_id, "test-access-token".to_string());

    notifier.sweep().await;

    let toasts = notifier.take_toasts(user_id);
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0].message, "Your Spotify Premium subscription has expired");
    // No deactivation patch this time, only the claim
    assert_eq!(mock.count("PATCH", "/rest/v1/user_subscriptions"), 0);
    assert_eq!(
        mock.count("POST", "/rest/v1/rpc/claim_subscription_notification"),
        1
    );
}

#[tokio::test]
async fn unregistered_users_are_not_swept() {
    let mock = MockBackend::spawn().await;
    let user_id = UserId::generate();
    seed_expired_subscription(&mock, user_id);

    let notifier = Notifier::spawn(mock.client());
    notifier.register(user_id, "test-access-token".to_string());
    notifier.unregister(user_id);

    notifier.sweep().await;

    assert!(mock.requests().is_empty());
}
