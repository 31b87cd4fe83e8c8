//! Checkout flow against the mock backend.
//!
//! The interesting cases are the ones that must NOT write: an empty
//! cart, a blank required field, a stale cart line, and a rejected
//! promo code. The partial-write case asserts the compensating status
//! update.

#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use pixelmart_core::{Cart, PackageId, PaymentMethod, ProductId};
use pixelmart_integration_tests::{MockBackend, test_user};
use pixelmart_storefront::services::checkout::{CheckoutDetails, CheckoutError, CheckoutService};

fn details() -> CheckoutDetails {
    CheckoutDetails {
        customer_name: "Rahim Uddin".to_string(),
        customer_phone: "01712345678".to_string(),
        customer_email: None,
        payment_method: PaymentMethod::Bkash,
        transaction_reference: "TX12345".to_string(),
        promo_code: None,
    }
}

fn seed_catalog(mock: &MockBackend) -> (ProductId, PackageId) {
    let product_id = ProductId::new(Uuid::new_v4());
    let package_id = PackageId::new(Uuid::new_v4());
    mock.seed(
        "products",
        vec![json!({
            "id": product_id,
            "name": "Spotify Premium",
            "slug": "spotify-premium",
            "category": "subscription",
            "is_active": true,
            "is_popular": true,
            "priority": 1,
            "packages": [{
                "id": package_id,
                "product_id": product_id,
                "name": "1 month",
                "duration_days": 30,
                "price": "500",
            }],
        })],
    );
    (product_id, package_id)
}

#[tokio::test]
async fn empty_cart_writes_nothing() {
    let mock = MockBackend::spawn().await;
    let client = mock.client();
    let service = CheckoutService::new(&client);

    let result = service.place_order(&test_user(), &Cart::new(), details()).await;

    assert!(matches!(result, Err(CheckoutError::EmptyCart)));
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn blank_required_field_writes_nothing() {
    let mock = MockBackend::spawn().await;
    let client = mock.client();
    let service = CheckoutService::new(&client);

    let mut cart = Cart::new();
    cart.add(ProductId::new(Uuid::new_v4()), PackageId::new(Uuid::new_v4()));

    let mut bad = details();
    bad.transaction_reference = "   ".to_string();

    let result = service.place_order(&test_user(), &cart, bad).await;

    assert!(matches!(
        result,
        Err(CheckoutError::MissingField("transaction reference"))
    ));
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn stale_cart_line_is_rejected_before_any_write() {
    let mock = MockBackend::spawn().await;
    seed_catalog(&mock);
    let client = mock.client();
    let service = CheckoutService::new(&client);

    // A line whose product never existed in the catalog
    let mut cart = Cart::new();
    cart.add(ProductId::new(Uuid::new_v4()), PackageId::new(Uuid::new_v4()));

    let result = service.place_order(&test_user(), &cart, details()).await;

    assert!(matches!(result, Err(CheckoutError::UnknownItem)));
    assert_eq!(mock.count("POST", "/rest/v1/orders"), 0);
}

#[tokio::test]
async fn successful_checkout_writes_order_then_items() {
    let mock = MockBackend::spawn().await;
    let (product_id, package_id) = seed_catalog(&mock);
    let client = mock.client();
    let service = CheckoutService::new(&client);

    let mut cart = Cart::new();
    cart.add(product_id, package_id);
    cart.add(product_id, package_id);

    let order = service
        .place_order(&test_user(), &cart, details())
        .await
        .unwrap();

    assert_eq!(order.total, Decimal::from(1000));
    assert_eq!(order.primary_product, "Spotify Premium");
    assert_eq!(mock.count("POST", "/rest/v1/orders"), 1);
    assert_eq!(mock.count("POST", "/rest/v1/order_items"), 1);

    // The item batch carries the quantity, not repeated rows
    let items_request = mock
        .requests()
        .into_iter()
        .find(|r| r.path == "/rest/v1/order_items")
        .unwrap();
    let items = items_request.body.unwrap();
    assert_eq!(items.as_array().unwrap().len(), 1);
    assert_eq!(items[0]["quantity"], json!(2));
}

#[tokio::test]
async fn rejected_promo_aborts_before_the_order_write() {
    let mock = MockBackend::spawn().await;
    let (product_id, package_id) = seed_catalog(&mock);
    mock.set_rpc(
        "validate_promo_code",
        json!({ "valid": false, "discount": "0", "message": "Promo code has expired" }),
    );
    let client = mock.client();
    let service = CheckoutService::new(&client);

    let mut cart = Cart::new();
    cart.add(product_id, package_id);

    let mut with_promo = details();
    with_promo.promo_code = Some("SUMMER50".to_string());

    let result = service.place_order(&test_user(), &cart, with_promo).await;

    match result {
        Err(CheckoutError::InvalidPromo(message)) => {
            assert_eq!(message, "Promo code has expired");
        }
        other => panic!("expected InvalidPromo, got {other:?}"),
    }
    assert_eq!(mock.count("POST", "/rest/v1/orders"), 0);
}

#[tokio::test]
async fn valid_promo_discounts_the_total_and_increments_usage() {
    let mock = MockBackend::spawn().await;
    let (product_id, package_id) = seed_catalog(&mock);
    mock.set_rpc(
        "validate_promo_code",
        json!({ "valid": true, "discount": "50", "message": "ok" }),
    );
    let client = mock.client();
    let service = CheckoutService::new(&client);

    let mut cart = Cart::new();
    cart.add(product_id, package_id);

    let mut with_promo = details();
    with_promo.promo_code = Some("SUMMER50".to_string());

    let order = service
        .place_order(&test_user(), &cart, with_promo)
        .await
        .unwrap();

    assert_eq!(order.total, Decimal::from(450));
    assert_eq!(order.discount, Decimal::from(50));
    assert_eq!(mock.count("POST", "/rest/v1/rpc/increment_promo_usage"), 1);
}

#[tokio::test]
async fn item_batch_failure_marks_the_order_failed() {
    let mock = MockBackend::spawn().await;
    let (product_id, package_id) = seed_catalog(&mock);
    mock.fail_inserts_into("order_items");
    let client = mock.client();
    let service = CheckoutService::new(&client);

    let mut cart = Cart::new();
    cart.add(product_id, package_id);

    let result = service.place_order(&test_user(), &cart, details()).await;

    assert!(matches!(result, Err(CheckoutError::ItemsWriteFailed(_))));

    // The compensating update flipped the header to failed
    let patches: Vec<_> = mock
        .requests()
        .into_iter()
        .filter(|r| r.method == "PATCH" && r.path == "/rest/v1/orders")
        .collect();
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].body.as_ref().unwrap()["status"], json!("failed"));

    let orders = mock.rows("orders");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["status"], json!("failed"));
}
