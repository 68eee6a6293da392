//! Integration tests for the checkout wizard.

#![allow(clippy::unwrap_used)]

use medibook_client::checkout::{
    CheckoutError, CheckoutStep, CheckoutWizard, Field, GENERIC_ORDER_FAILURE,
};
use medibook_client::navigation::Destination;
use medibook_client::storage::{KeyValueStore, keys};
use medibook_core::{PaymentMethod, Price};
use medibook_integration_tests::{Call, Endpoint, Failure, TestContext, complete_patient, item};

const JANE: &str = "jane@example.com";
const RETURN_PATH: &str = "/checkout";

/// Signed in with two tests in the cart, walked up to the payment step.
async fn at_payment_step() -> (TestContext, CheckoutWizard) {
    let ctx = TestContext::signed_in().await;
    ctx.app.cart().add_item(item("cbc", 100)).await;
    ctx.app.cart().add_item(item("tsh", 200)).await;

    let mut wizard = ctx.app.checkout(RETURN_PATH);
    *wizard.patient_mut() = complete_patient();
    for _ in 0..3 {
        wizard.advance().await.unwrap();
    }
    assert_eq!(wizard.current_step(), CheckoutStep::Payment);
    (ctx, wizard)
}

// =============================================================================
// Gating
// =============================================================================

#[tokio::test]
async fn test_signed_out_advance_sends_to_sign_in() {
    let ctx = TestContext::new();
    ctx.app.initialize(None).await;
    let mut wizard = ctx.app.checkout(RETURN_PATH);

    let err = wizard.advance().await.unwrap_err();

    assert!(matches!(err, CheckoutError::SignInRequired));
    assert_eq!(wizard.current_step(), CheckoutStep::CartReview);
    assert_eq!(ctx.navigator.last_destination(), Some(Destination::SignIn));
    assert_eq!(
        ctx.store.get(keys::REDIRECT_AFTER_LOGIN).unwrap().as_deref(),
        Some(RETURN_PATH)
    );
}

#[tokio::test]
async fn test_patient_step_lists_missing_fields() {
    let ctx = TestContext::signed_in().await;
    let mut wizard = ctx.app.checkout(RETURN_PATH);
    *wizard.patient_mut() = complete_patient();
    wizard.patient_mut().email = "  ".to_string();
    wizard.advance().await.unwrap();

    let err = wizard.advance().await.unwrap_err();

    match &err {
        CheckoutError::Validation { step, missing } => {
            assert_eq!(*step, CheckoutStep::PatientInfo);
            assert_eq!(missing, &[Field::Email]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("email"));
    assert_eq!(wizard.current_step(), CheckoutStep::PatientInfo);
}

#[tokio::test]
async fn test_address_step_requires_slot_and_address() {
    let ctx = TestContext::signed_in().await;
    let mut wizard = ctx.app.checkout(RETURN_PATH);
    *wizard.patient_mut() = complete_patient();
    wizard.patient_mut().time_slot = None;
    wizard.patient_mut().pincode.clear();
    wizard.advance().await.unwrap();
    wizard.advance().await.unwrap();

    let err = wizard.advance().await.unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::Validation { step: CheckoutStep::AddressTime, ref missing }
            if missing == &[Field::Pincode, Field::TimeSlot]
    ));
    assert_eq!(wizard.missing_fields(), [Field::Pincode, Field::TimeSlot]);
}

#[tokio::test]
async fn test_jump_only_to_reached_steps() {
    let ctx = TestContext::signed_in().await;
    let mut wizard = ctx.app.checkout(RETURN_PATH);
    *wizard.patient_mut() = complete_patient();
    wizard.advance().await.unwrap();
    wizard.advance().await.unwrap();

    assert!(!wizard.jump_to(CheckoutStep::Payment));
    assert!(wizard.jump_to(CheckoutStep::CartReview));
    assert_eq!(wizard.current_step(), CheckoutStep::CartReview);
    assert!(wizard.jump_to(CheckoutStep::AddressTime));
    assert_eq!(wizard.highest_step_reached(), CheckoutStep::AddressTime);

    assert_eq!(wizard.retreat(), CheckoutStep::PatientInfo);
    assert_eq!(wizard.retreat(), CheckoutStep::CartReview);
    assert_eq!(wizard.retreat(), CheckoutStep::CartReview);
}

#[tokio::test]
async fn test_signed_out_user_cannot_jump_ahead() {
    let ctx = TestContext::new();
    ctx.app.initialize(None).await;
    let mut wizard = ctx.app.checkout(RETURN_PATH);

    assert!(!wizard.jump_to(CheckoutStep::PatientInfo));
    assert!(wizard.jump_to(CheckoutStep::CartReview));
}

#[tokio::test]
async fn test_only_enabled_payment_methods_can_be_selected() {
    let ctx = TestContext::signed_in().await;
    let mut wizard = ctx.app.checkout(RETURN_PATH);

    let err = wizard.select_payment_method(PaymentMethod::Upi).unwrap_err();

    assert!(matches!(err, CheckoutError::PaymentMethodUnavailable(PaymentMethod::Upi)));
    assert_eq!(wizard.payment_method(), PaymentMethod::CashOnCollection);
    assert!(wizard.select_payment_method(PaymentMethod::CashOnCollection).is_ok());
}

// =============================================================================
// Placement
// =============================================================================

#[tokio::test]
async fn test_successful_order() {
    let (ctx, mut wizard) = at_payment_step().await;
    assert_eq!(wizard.total(), Price::new(300));

    let step = wizard.advance().await.unwrap();

    assert_eq!(step, CheckoutStep::Confirmation);
    let confirmation = wizard.confirmation().unwrap();
    assert_eq!(confirmation.order_id().as_str(), "ORD-0001");
    assert_eq!(confirmation.lines().len(), 2);
    assert_eq!(confirmation.total(), Price::new(300));
    assert_eq!(confirmation.patient(), &complete_patient());

    // The cart is emptied; the confirmation keeps its own copy.
    assert!(ctx.app.cart().items().is_empty());
    assert!(ctx.api.cart(JANE).is_empty());
    assert!(ctx.api.calls().contains(&Call::ClearCart(JANE.to_string())));
    assert_eq!(wizard.total(), Price::ZERO);

    let placed = ctx.api.placed_orders();
    assert_eq!(placed.len(), 1);
    let request = placed.first().unwrap();
    assert_eq!(request.user_id, JANE);
    assert_eq!(request.total_price, Price::new(300));
    assert_eq!(request.payment_method, PaymentMethod::CashOnCollection);
}

#[tokio::test]
async fn test_advance_after_confirmation_stays_put() {
    let (ctx, mut wizard) = at_payment_step().await;
    wizard.advance().await.unwrap();

    assert_eq!(wizard.advance().await.unwrap(), CheckoutStep::Confirmation);
    assert_eq!(ctx.api.count(Endpoint::PlaceOrder), 1);
}

#[tokio::test]
async fn test_empty_cart_is_not_sent() {
    let ctx = TestContext::signed_in().await;
    let mut wizard = ctx.app.checkout(RETURN_PATH);
    *wizard.patient_mut() = complete_patient();
    for _ in 0..3 {
        wizard.advance().await.unwrap();
    }

    let err = wizard.advance().await.unwrap_err();

    assert!(matches!(err, CheckoutError::EmptyCart));
    assert_eq!(ctx.api.count(Endpoint::PlaceOrder), 0);
    assert_eq!(wizard.current_step(), CheckoutStep::Payment);
}

#[tokio::test]
async fn test_place_order_only_from_payment_step() {
    let ctx = TestContext::signed_in().await;
    let mut wizard = ctx.app.checkout(RETURN_PATH);

    let err = wizard.place_order().await.unwrap_err();

    assert!(matches!(err, CheckoutError::NotOnPaymentStep));
    assert_eq!(ctx.api.count(Endpoint::PlaceOrder), 0);
}

#[tokio::test]
async fn test_rejected_order_shows_server_message() {
    let (ctx, mut wizard) = at_payment_step().await;
    ctx.api.fail_next(
        Endpoint::PlaceOrder,
        Failure::Status(422, Some("Slot no longer available".to_string())),
    );

    let err = wizard.advance().await.unwrap_err();

    assert_eq!(err.to_string(), "Slot no longer available");
    assert_eq!(wizard.current_step(), CheckoutStep::Payment);
    assert!(wizard.confirmation().is_none());
    assert_eq!(ctx.app.cart().items().len(), 2);
    assert_eq!(ctx.api.count(Endpoint::ClearCart), 0);
}

#[tokio::test]
async fn test_failed_order_without_message_uses_generic_text() {
    let (ctx, mut wizard) = at_payment_step().await;
    ctx.api.fail_next(Endpoint::PlaceOrder, Failure::Network);

    let err = wizard.advance().await.unwrap_err();

    assert_eq!(err.to_string(), GENERIC_ORDER_FAILURE);
    assert_eq!(wizard.current_step(), CheckoutStep::Payment);
    assert_eq!(ctx.app.cart().compute_total(), Price::new(300));
}

#[tokio::test]
async fn test_expired_session_during_placement_signs_out() {
    let (ctx, mut wizard) = at_payment_step().await;
    ctx.api.fail_next(Endpoint::PlaceOrder, Failure::Unauthorized);

    let err = wizard.advance().await.unwrap_err();

    assert!(matches!(err, CheckoutError::SignInRequired));
    assert!(!ctx.app.auth().is_authenticated());
    assert_eq!(ctx.navigator.last_destination(), Some(Destination::SignIn));
}

#[tokio::test]
async fn test_placement_finishes_when_wizard_is_dropped() {
    let (ctx, mut wizard) = at_payment_step().await;
    let gate = ctx.api.hold_next(Endpoint::PlaceOrder);

    {
        let advance = wizard.advance();
        tokio::pin!(advance);
        tokio::select! {
            _ = &mut advance => panic!("placement finished while held"),
            () = gate.entered() => {}
        }
    }
    drop(wizard);
    gate.release();

    for _ in 0..100 {
        if ctx.api.count(Endpoint::ClearCart) == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(ctx.api.count(Endpoint::ClearCart), 1);
    assert!(ctx.api.cart(JANE).is_empty());
    assert!(ctx.app.cart().items().is_empty());
}

#[tokio::test]
async fn test_reset_starts_over() {
    let (_ctx, mut wizard) = at_payment_step().await;
    wizard.advance().await.unwrap();

    wizard.reset();

    assert_eq!(wizard.current_step(), CheckoutStep::CartReview);
    assert_eq!(wizard.highest_step_reached(), CheckoutStep::CartReview);
    assert!(wizard.confirmation().is_none());
    assert_eq!(wizard.patient().name, "");
}
