//! Integration tests for order history and the catalog.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::time::Duration;

use chrono::{TimeZone, Utc};
use medibook_client::ClientError;
use medibook_client::api::{ApiError, Category, Order, PatientInfo};
use medibook_client::navigation::Destination;
use medibook_core::{CategoryId, OrderId, OrderStatus, PaymentMethod, Price, Relation, TestId};
use medibook_integration_tests::{Endpoint, Failure, TestContext, complete_patient, lab_test};

const JANE: &str = "jane@example.com";

fn order(id: &str, day: u32, name: &str, relation: Relation) -> Order {
    Order {
        order_id: OrderId::new(id),
        patient_info: PatientInfo {
            name: name.to_string(),
            relation: Some(relation),
            ..complete_patient()
        },
        cart_items: Vec::new(),
        total_price: Price::new(599),
        payment_method: PaymentMethod::CashOnCollection,
        status: OrderStatus::Pending,
        created_at: Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0).single(),
    }
}

fn category(id: &str) -> Category {
    Category {
        id: CategoryId::new(id),
        name: id.to_uppercase(),
        description: None,
    }
}

// =============================================================================
// Orders
// =============================================================================

#[tokio::test]
async fn test_refresh_publishes_newest_first() {
    let ctx = TestContext::signed_in().await;
    ctx.api.add_order(JANE, order("ORD-1", 1, "Jane Doe", Relation::Myself));
    ctx.api.add_order(JANE, order("ORD-2", 9, "Jane Doe", Relation::Myself));
    ctx.api.add_order("john@example.com", order("ORD-3", 5, "John", Relation::Myself));
    let mut updates = ctx.app.orders().subscribe();

    let orders = ctx.app.orders().refresh().await.unwrap();

    let ids: Vec<_> = orders.iter().map(|o| o.order_id.as_str()).collect();
    assert_eq!(ids, ["ORD-2", "ORD-1"]);
    assert!(updates.has_changed().unwrap());
    assert_eq!(updates.borrow_and_update().len(), 2);
    assert_eq!(ctx.app.orders().orders(), orders);
}

#[tokio::test]
async fn test_failed_refresh_keeps_last_list() {
    let ctx = TestContext::signed_in().await;
    ctx.api.add_order(JANE, order("ORD-1", 1, "Jane Doe", Relation::Myself));
    ctx.app.orders().refresh().await.unwrap();
    ctx.api.fail_next(Endpoint::ListOrders, Failure::Status(503, None));

    let err = ctx.app.orders().refresh().await.unwrap_err();

    assert!(matches!(err, ClientError::Api(ApiError::Status { status: 503, .. })));
    assert_eq!(ctx.app.orders().orders().len(), 1);
    assert!(ctx.app.auth().is_authenticated());
}

#[tokio::test]
async fn test_rejected_session_on_refresh_signs_out() {
    let ctx = TestContext::signed_in().await;
    ctx.api.add_order(JANE, order("ORD-1", 1, "Jane Doe", Relation::Myself));
    ctx.app.orders().refresh().await.unwrap();
    ctx.api.fail_next(Endpoint::ListOrders, Failure::Unauthorized);

    let err = ctx.app.orders().refresh().await.unwrap_err();

    assert!(matches!(err, ClientError::Api(ApiError::Unauthorized)));
    assert!(ctx.app.orders().orders().is_empty());
    assert!(!ctx.app.auth().is_authenticated());
    assert_eq!(ctx.navigator.last_destination(), Some(Destination::SignIn));
}

#[tokio::test]
async fn test_refresh_while_signed_out() {
    let ctx = TestContext::new();
    ctx.app.initialize(None).await;

    let err = ctx.app.orders().refresh().await.unwrap_err();

    assert!(matches!(err, ClientError::NotSignedIn));
    assert_eq!(ctx.api.count(Endpoint::ListOrders), 0);
}

#[tokio::test]
async fn test_family_members_from_history() {
    let ctx = TestContext::signed_in().await;
    ctx.api.add_order(JANE, order("ORD-1", 1, "Jane Doe", Relation::Myself));
    ctx.api.add_order(JANE, order("ORD-2", 2, "Asha", Relation::Child));
    ctx.api.add_order(JANE, order("ORD-3", 3, "Ravi", Relation::Spouse));
    ctx.api.add_order(JANE, order("ORD-4", 4, " asha ", Relation::Child));
    ctx.api.add_order(JANE, order("ORD-5", 5, "  ", Relation::Parent));
    ctx.app.orders().refresh().await.unwrap();

    let members = ctx.app.orders().family_members();

    let names: Vec<_> = members.iter().map(|m| (m.name.as_str(), m.relation)).collect();
    assert_eq!(names, [("asha", Relation::Child), ("Ravi", Relation::Spouse)]);
}

#[tokio::test]
async fn test_sign_out_clears_order_history() {
    let ctx = TestContext::signed_in().await;
    ctx.api.add_order(JANE, order("ORD-1", 1, "Asha", Relation::Child));
    ctx.app.orders().refresh().await.unwrap();

    ctx.app.sign_out().await;

    assert!(ctx.app.orders().orders().is_empty());
    assert!(ctx.app.orders().family_members().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_order_watch_picks_up_new_orders() {
    let ctx = TestContext::signed_in().await;
    let mut updates = ctx.app.orders().subscribe();
    let _poll = ctx.app.orders().watch(Duration::from_secs(30));

    ctx.api.add_order(JANE, order("ORD-1", 1, "Jane Doe", Relation::Myself));
    tokio::time::timeout(Duration::from_secs(60), updates.changed())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(ctx.app.orders().orders().len(), 1);
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn test_catalog_is_cached() {
    let ctx = TestContext::new();
    ctx.api.set_catalog(
        vec![category("blood"), category("thyroid")],
        vec![lab_test("cbc", "blood", 599), lab_test("tsh", "thyroid", 399)],
    );
    let catalog = ctx.app.catalog();

    assert_eq!(catalog.categories().await.unwrap().len(), 2);
    assert_eq!(catalog.categories().await.unwrap().len(), 2);
    assert_eq!(ctx.api.count(Endpoint::ListCategories), 1);

    catalog.invalidate_all();
    catalog.categories().await.unwrap();
    assert_eq!(ctx.api.count(Endpoint::ListCategories), 2);
}

#[tokio::test]
async fn test_tests_are_cached_per_category() {
    let ctx = TestContext::new();
    ctx.api.set_catalog(
        vec![category("blood"), category("thyroid")],
        vec![lab_test("cbc", "blood", 599), lab_test("tsh", "thyroid", 399)],
    );
    let catalog = ctx.app.catalog();
    let blood = CategoryId::new("blood");

    let tests = catalog.tests(Some(&blood)).await.unwrap();
    assert_eq!(tests.len(), 1);
    assert_eq!(tests[0].id, TestId::new("cbc"));
    assert_eq!(catalog.tests(None).await.unwrap().len(), 2);
    catalog.tests(Some(&blood)).await.unwrap();

    assert_eq!(ctx.api.count(Endpoint::ListTests), 2);
}

#[tokio::test]
async fn test_find_test() {
    let ctx = TestContext::new();
    ctx.api
        .set_catalog(Vec::new(), vec![lab_test("cbc", "blood", 599)]);

    let found = ctx.app.catalog().find_test(&TestId::new("cbc")).await.unwrap();
    assert_eq!(found.unwrap().price, Some(Price::new(599)));
    assert!(
        ctx.app
            .catalog()
            .find_test(&TestId::new("nope"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_catalog_failure_is_not_cached() {
    let ctx = TestContext::new();
    ctx.api.set_catalog(vec![category("blood")], Vec::new());
    ctx.api.fail_next(Endpoint::ListCategories, Failure::Network);

    assert!(ctx.app.catalog().categories().await.is_err());
    assert_eq!(ctx.app.catalog().categories().await.unwrap().len(), 1);
}
