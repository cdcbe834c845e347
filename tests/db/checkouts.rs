//! Checkout claims, forward-only status changes and download tokens

#[path = "../common/mod.rs"]
mod common;
use common::*;

use appmart::payments::ProviderStatus;
use appmart::reconcile::{Outcome, apply_status};

fn setup(ctx: &TestApp) -> (User, User, App, Checkout) {
    let conn = ctx.conn();
    let dev = create_test_user(&conn, "Dev", "dev@example.com");
    let buyer = create_test_user(&conn, "Buyer", "buyer@example.com");
    let app = create_test_app(&conn, &dev.email, "Notes", 2000, true);
    let checkout = create_test_checkout(&conn, "CHEC_TEST_1", &app, &buyer);
    (dev, buyer, app, checkout)
}

#[test]
fn test_claim_succeeds_once() {
    let ctx = create_test_app_state();
    let (_, _, _, checkout) = setup(&ctx);
    let conn = ctx.conn();

    assert!(queries::try_claim_checkout(&conn, &checkout.id, Some("PAID")).unwrap());
    assert!(!queries::try_claim_checkout(&conn, &checkout.id, Some("PAID")).unwrap());

    let stored = queries::get_checkout(&conn, &checkout.id).unwrap().unwrap();
    assert_eq!(stored.status, CheckoutStatus::Paid);
    assert_eq!(stored.provider_status.as_deref(), Some("PAID"));
}

#[test]
fn test_paid_report_applies_ledger_exactly_once() {
    let ctx = create_test_app_state();
    let (dev, buyer, app, checkout) = setup(&ctx);
    let mut conn = ctx.conn();
    let paid = ProviderStatus::from_raw("PAID");

    let first = apply_status(&mut conn, &checkout, &paid, TEST_TOKEN_TTL_SECS).unwrap();
    let confirmation = match first {
        Outcome::Confirmed(confirmation) => confirmation,
        other => panic!("first paid report should confirm, got {:?}", other),
    };
    assert_eq!(confirmation.split.admin_cents, 600);
    assert_eq!(confirmation.split.developer_cents, 1400);
    assert_eq!(confirmation.token.user_id, buyer.id);
    assert_eq!(confirmation.token.filename, app.filename);

    // Redelivery with the stale pending snapshot loses the claim
    let second = apply_status(&mut conn, &checkout, &paid, TEST_TOKEN_TTL_SECS).unwrap();
    assert!(matches!(second, Outcome::Unchanged(CheckoutStatus::Paid)));

    let app = queries::get_app_by_id(&conn, &app.id).unwrap().unwrap();
    assert_eq!(app.download_count, 1);
    assert_eq!(app.total_revenue_cents, 2000);
    assert_eq!(app.admin_share_cents, 600);
    assert_eq!(app.developer_share_cents, 1400);

    let dev = queries::get_user_by_id(&conn, &dev.id).unwrap().unwrap();
    assert_eq!(dev.total_revenue_cents, 2000);
    assert_eq!(dev.developer_share_cents, 1400);
}

#[test]
fn test_terminal_checkout_is_never_touched() {
    let ctx = create_test_app_state();
    let (_, _, app, checkout) = setup(&ctx);
    let mut conn = ctx.conn();

    assert!(queries::try_claim_checkout(&conn, &checkout.id, None).unwrap());
    let stored = queries::get_checkout(&conn, &checkout.id).unwrap().unwrap();

    let outcome = apply_status(&mut conn, &stored, &ProviderStatus::from_raw("DECLINED"), 60).unwrap();
    assert!(matches!(outcome, Outcome::Unchanged(CheckoutStatus::Paid)));
    assert!(!queries::advance_checkout_status(&conn, &checkout.id, CheckoutStatus::Canceled, None).unwrap());

    let stored = queries::get_checkout(&conn, &checkout.id).unwrap().unwrap();
    assert_eq!(stored.status, CheckoutStatus::Paid);

    // The raw claim above skipped the ledger
    let app = queries::get_app_by_id(&conn, &app.id).unwrap().unwrap();
    assert_eq!(app.total_revenue_cents, 0);
}

#[test]
fn test_declined_report_moves_no_money() {
    let ctx = create_test_app_state();
    let (_, _, app, checkout) = setup(&ctx);
    let mut conn = ctx.conn();

    let outcome =
        apply_status(&mut conn, &checkout, &ProviderStatus::from_raw("DECLINED"), 60).unwrap();
    assert!(matches!(outcome, Outcome::Updated(CheckoutStatus::Declined)));

    let stored = queries::get_checkout(&conn, &checkout.id).unwrap().unwrap();
    assert_eq!(stored.status, CheckoutStatus::Declined);
    assert_eq!(stored.provider_status.as_deref(), Some("DECLINED"));

    let app = queries::get_app_by_id(&conn, &app.id).unwrap().unwrap();
    assert_eq!(app.download_count, 0);
    assert_eq!(app.total_revenue_cents, 0);

    // A late paid report cannot reopen it
    let late = apply_status(&mut conn, &stored, &ProviderStatus::from_raw("PAID"), 60).unwrap();
    assert!(matches!(late, Outcome::Unchanged(CheckoutStatus::Declined)));
}

#[test]
fn test_authorized_does_not_fall_back_to_pending() {
    let ctx = create_test_app_state();
    let (_, _, _, checkout) = setup(&ctx);
    let conn = ctx.conn();

    assert!(
        queries::advance_checkout_status(&conn, &checkout.id, CheckoutStatus::Authorized, Some("AUTHORIZED"))
            .unwrap()
    );
    assert!(
        !queries::advance_checkout_status(&conn, &checkout.id, CheckoutStatus::Pending, Some("WAITING"))
            .unwrap()
    );

    let stored = queries::get_checkout(&conn, &checkout.id).unwrap().unwrap();
    assert_eq!(stored.status, CheckoutStatus::Authorized);
    assert_eq!(stored.provider_status.as_deref(), Some("AUTHORIZED"));
}

#[test]
fn test_repeated_status_report_is_not_a_change() {
    let ctx = create_test_app_state();
    let (_, _, _, checkout) = setup(&ctx);
    let mut conn = ctx.conn();

    let first = apply_status(&mut conn, &checkout, &ProviderStatus::from_raw("WAITING"), 60).unwrap();
    assert!(matches!(first, Outcome::Updated(CheckoutStatus::Pending)));

    let stored = queries::get_checkout(&conn, &checkout.id).unwrap().unwrap();
    let again = apply_status(&mut conn, &stored, &ProviderStatus::from_raw("WAITING"), 60).unwrap();
    assert!(matches!(again, Outcome::Unchanged(CheckoutStatus::Pending)));
    assert!(
        !queries::advance_checkout_status(&conn, &checkout.id, CheckoutStatus::Pending, None).unwrap()
    );

    // Same normalised status, new raw value still counts
    let stored = queries::get_checkout(&conn, &checkout.id).unwrap().unwrap();
    let moved = apply_status(&mut conn, &stored, &ProviderStatus::from_raw("CREATED"), 60).unwrap();
    assert!(matches!(moved, Outcome::Updated(CheckoutStatus::Pending)));
}

#[test]
fn test_paid_checkout_for_deleted_app_is_closed_without_credit() {
    let ctx = create_test_app_state();
    let (dev, _, app, checkout) = setup(&ctx);
    let mut conn = ctx.conn();
    queries::delete_app(&conn, &app.id).unwrap();

    let outcome = apply_status(&mut conn, &checkout, &ProviderStatus::from_raw("PAID"), 60).unwrap();
    assert!(matches!(outcome, Outcome::Updated(CheckoutStatus::Paid)));

    let stored = queries::get_checkout(&conn, &checkout.id).unwrap().unwrap();
    assert_eq!(stored.status, CheckoutStatus::Paid);
    assert!(
        queries::get_active_download_token_for_checkout(&conn, &checkout.id)
            .unwrap()
            .is_none()
    );

    let dev = queries::get_user_by_id(&conn, &dev.id).unwrap().unwrap();
    assert_eq!(dev.total_revenue_cents, 0);
}

#[test]
fn test_download_token_redeems_once() {
    let ctx = create_test_app_state();
    let (_, _, app, checkout) = setup(&ctx);
    let conn = ctx.conn();

    let token = queries::create_download_token(&conn, &checkout, &app.filename, 60).unwrap();
    let active = queries::get_active_download_token_for_checkout(&conn, &checkout.id)
        .unwrap()
        .unwrap();
    assert_eq!(active.token, token.token);

    assert!(
        queries::try_claim_download_token(&conn, &token.token, "other.apk")
            .unwrap()
            .is_none(),
        "token must be bound to its filename"
    );

    let claimed = queries::try_claim_download_token(&conn, &token.token, &app.filename)
        .unwrap()
        .unwrap();
    assert!(claimed.used_at.is_some());

    assert!(
        queries::try_claim_download_token(&conn, &token.token, &app.filename)
            .unwrap()
            .is_none()
    );
    assert!(
        queries::get_active_download_token_for_checkout(&conn, &checkout.id)
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_expired_download_token_is_refused() {
    let ctx = create_test_app_state();
    let (_, _, app, checkout) = setup(&ctx);
    let conn = ctx.conn();

    let token = queries::create_download_token(&conn, &checkout, &app.filename, -1).unwrap();

    assert!(
        queries::try_claim_download_token(&conn, &token.token, &app.filename)
            .unwrap()
            .is_none()
    );
    assert!(
        queries::get_active_download_token_for_checkout(&conn, &checkout.id)
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_duplicate_checkout_id_conflicts() {
    let ctx = create_test_app_state();
    let (_, buyer, app, checkout) = setup(&ctx);
    let conn = ctx.conn();

    let err = queries::create_checkout(
        &conn,
        &CreateCheckout {
            id: checkout.id.clone(),
            app_id: app.id.clone(),
            user_id: buyer.id.clone(),
            amount_cents: app.price_cents,
            provider: "pagbank".to_string(),
        },
    )
    .unwrap_err();
    assert!(matches!(err, appmart::error::AppError::Conflict(_)));
}
