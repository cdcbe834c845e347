//! Provider webhooks: authenticity, idempotent confirmation, live status fetch

#[path = "../common/mod.rs"]
mod common;
use common::*;

use appmart::crypto::sha256_hex;
use httpmock::prelude::*;

fn webhook(provider: &str, body: &Value, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/api/webhook/{}", provider))
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header("x-authenticity-token", signature);
    }
    builder
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

async fn send(ctx: &TestApp, request: Request<Body>) -> (StatusCode, String) {
    let response = ctx.router().oneshot(request).await.unwrap();
    let status = response.status();
    let text = String::from_utf8(body_bytes(response).await).unwrap();
    (status, text)
}

/// Dev, buyer, a 20.00 app and a pending checkout for it.
fn seed(ctx: &TestApp, checkout_id: &str) -> (User, User, App) {
    let conn = ctx.conn();
    let dev = create_test_user(&conn, "Dev", "dev@example.com");
    let buyer = create_test_user(&conn, "Buyer", "buyer@example.com");
    let app = create_test_app(&conn, &dev.email, "Notes", 2000, true);
    create_test_checkout(&conn, checkout_id, &app, &buyer);
    (dev, buyer, app)
}

#[tokio::test]
async fn test_paid_webhook_confirms_and_redelivery_is_a_noop() {
    let ctx = create_test_app_state();
    let (dev, _, app) = seed(&ctx, "CHEC_PAID");
    let event = json!({"id": "CHEC_PAID", "type": "CHECKOUT_PAID", "reference_id": "app_1_x"});

    let (status, text) = send(&ctx, webhook("pagbank", &event, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "OK");

    let (status, text) = send(&ctx, webhook("pagbank", &event, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "Already processed");

    let conn = ctx.conn();
    let checkout = queries::get_checkout(&conn, "CHEC_PAID").unwrap().unwrap();
    assert_eq!(checkout.status, CheckoutStatus::Paid);
    assert!(
        queries::get_active_download_token_for_checkout(&conn, "CHEC_PAID")
            .unwrap()
            .is_some()
    );

    let app = queries::get_app_by_id(&conn, &app.id).unwrap().unwrap();
    assert_eq!(app.download_count, 1);
    assert_eq!(app.total_revenue_cents, 2000);
    assert_eq!(app.admin_share_cents, 600);
    assert_eq!(app.developer_share_cents, 1400);

    let dev = queries::get_user_by_id(&conn, &dev.id).unwrap().unwrap();
    assert_eq!(dev.total_revenue_cents, 2000);
    assert_eq!(dev.admin_share_cents, 600);
    assert_eq!(dev.developer_share_cents, 1400);
}

#[tokio::test]
async fn test_concurrent_deliveries_credit_once() {
    let ctx = create_test_app_state();
    let (_, _, app) = seed(&ctx, "CHEC_RACE");
    let event = json!({"id": "CHEC_RACE", "charges": [{"status": "PAID"}]});

    let mut handles = Vec::new();
    for _ in 0..5 {
        let router = ctx.router();
        let request = webhook("pagbank", &event, None);
        handles.push(tokio::spawn(async move { router.oneshot(request).await.unwrap().status() }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }

    let app = queries::get_app_by_id(&ctx.conn(), &app.id).unwrap().unwrap();
    assert_eq!(app.download_count, 1);
    assert_eq!(app.total_revenue_cents, 2000);
}

#[tokio::test]
async fn test_declined_webhook_closes_checkout_without_credit() {
    let ctx = create_test_app_state();
    let (_, _, app) = seed(&ctx, "CHEC_NO");

    let (status, _) = send(
        &ctx,
        webhook(
            "pagbank",
            &json!({"id": "CHEC_NO", "charges": [{"id": "CHAR_1", "status": "DECLINED"}]}),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let conn = ctx.conn();
    let checkout = queries::get_checkout(&conn, "CHEC_NO").unwrap().unwrap();
    assert_eq!(checkout.status, CheckoutStatus::Declined);
    let app = queries::get_app_by_id(&conn, &app.id).unwrap().unwrap();
    assert_eq!(app.total_revenue_cents, 0);
}

#[tokio::test]
async fn test_unknown_checkout_is_acknowledged() {
    let ctx = create_test_app_state();

    let (status, text) = send(
        &ctx,
        webhook("pagbank", &json!({"id": "CHEC_NOPE", "type": "CHECKOUT_PAID"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "Unknown checkout");
}

#[tokio::test]
async fn test_invalid_payload_is_rejected() {
    let ctx = create_test_app_state();

    for body in [json!({"type": "CHECKOUT_PAID"}), json!({"id": "CHEC_1"}), json!("text")] {
        let (status, _) = send(&ctx, webhook("pagbank", &body, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
    }
}

#[tokio::test]
async fn test_webhook_for_other_provider_is_not_found() {
    let ctx = create_test_app_state();
    seed(&ctx, "CHEC_X");

    let (status, _) = send(
        &ctx,
        webhook("sumup", &json!({"id": "CHEC_X", "event_type": "CHECKOUT_STATUS_CHANGED"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let checkout = queries::get_checkout(&ctx.conn(), "CHEC_X").unwrap().unwrap();
    assert_eq!(checkout.status, CheckoutStatus::Pending);
}

#[tokio::test]
async fn test_pagbank_authenticity_token_is_enforced_when_enabled() {
    let mut config = pagbank_config("http://127.0.0.1:1");
    config.pagbank_verify_webhooks = true;
    let ctx = create_test_app_state_with(config);
    let (_, _, app) = seed(&ctx, "CHEC_SIG");

    let event = json!({"id": "CHEC_SIG", "type": "CHECKOUT_PAID"});
    let raw = serde_json::to_vec(&event).unwrap();

    let (status, _) = send(&ctx, webhook("pagbank", &event, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&ctx, webhook("pagbank", &event, Some(&sha256_hex(b"forged")))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let app_before = queries::get_app_by_id(&ctx.conn(), &app.id).unwrap().unwrap();
    assert_eq!(app_before.total_revenue_cents, 0);

    let mut signed = format!("{}-", PAGBANK_TEST_TOKEN).into_bytes();
    signed.extend_from_slice(&raw);
    let (status, _) = send(&ctx, webhook("pagbank", &event, Some(&sha256_hex(&signed)))).await;
    assert_eq!(status, StatusCode::OK);

    let checkout = queries::get_checkout(&ctx.conn(), "CHEC_SIG").unwrap().unwrap();
    assert_eq!(checkout.status, CheckoutStatus::Paid);
}

#[tokio::test]
async fn test_sumup_webhook_reads_status_from_api() {
    let server = MockServer::start_async().await;
    let status_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v0.1/checkouts/co_live")
            .header("authorization", "Bearer sup_sk_test");
        then.status(200).json_body(json!({"id": "co_live", "status": "PAID"}));
    });
    let ctx = create_test_app_state_with(sumup_config(&server.url("")));
    let (_, _, app) = seed(&ctx, "co_live");

    let event = json!({"id": "co_live", "event_type": "CHECKOUT_STATUS_CHANGED"});
    let (status, _) = send(&ctx, webhook("sumup", &event, None)).await;
    assert_eq!(status, StatusCode::OK);
    status_mock.assert_hits(1);

    let app = queries::get_app_by_id(&ctx.conn(), &app.id).unwrap().unwrap();
    assert_eq!(app.total_revenue_cents, 2000);

    // Terminal now, so a redelivery does not reach the API
    let (status, text) = send(&ctx, webhook("sumup", &event, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "Already processed");
    status_mock.assert_hits(1);
}

#[tokio::test]
async fn test_sumup_fetch_failure_asks_for_redelivery() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/v0.1/checkouts/co_down");
        then.status(500);
    });
    let ctx = create_test_app_state_with(sumup_config(&server.url("")));
    seed(&ctx, "co_down");

    let (status, _) = send(
        &ctx,
        webhook("sumup", &json!({"id": "co_down", "event_type": "CHECKOUT_STATUS_CHANGED"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let checkout = queries::get_checkout(&ctx.conn(), "co_down").unwrap().unwrap();
    assert_eq!(checkout.status, CheckoutStatus::Pending);
}
