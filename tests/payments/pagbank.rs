//! PagBank client against a mocked API

#[path = "../common/mod.rs"]
mod common;
use common::*;

use appmart::error::AppError;
use appmart::payments::CheckoutRequest;
use httpmock::prelude::*;

fn request(amount_cents: i64) -> CheckoutRequest {
    CheckoutRequest {
        reference_id: "app_1700000000000_abc".to_string(),
        item_name: "Notes Pro".to_string(),
        amount_cents,
        notification_url: Some("https://shop.example.com/api/webhook/pagbank".to_string()),
        redirect_url: None,
    }
}

fn gateway(server: &MockServer) -> PaymentGateway {
    PaymentGateway::from_config(&pagbank_config(&server.url(""))).unwrap()
}

#[tokio::test]
async fn test_create_checkout_returns_pay_link() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/checkouts")
            .header("authorization", format!("Bearer {}", PAGBANK_TEST_TOKEN))
            .body_contains("\"unit_amount\":2000")
            .body_contains("\"reference_id\":\"app_1700000000000_abc\"")
            .body_contains("https://shop.example.com/api/webhook/pagbank");
        then.status(201).json_body(json!({
            "id": "CHEC_5C4A",
            "links": [
                {"rel": "SELF", "href": "https://sandbox.api.pagseguro.com/checkouts/CHEC_5C4A"},
                {"rel": "PAY", "href": "https://pagamento.sandbox.pagbank.com.br/pagamento?code=abc"}
            ]
        }));
    });

    let created = gateway(&server).create_checkout(&request(2000)).await.unwrap();

    mock.assert_hits(1);
    assert_eq!(created.id, "CHEC_5C4A");
    assert_eq!(
        created.pay_url,
        "https://pagamento.sandbox.pagbank.com.br/pagamento?code=abc"
    );
}

#[tokio::test]
async fn test_provider_validation_errors_are_surfaced() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/checkouts");
        then.status(400).json_body(json!({
            "error_messages": [
                {"code": "40002", "description": "invalid_parameter", "parameter_name": "items[0].unit_amount"}
            ]
        }));
    });

    let err = gateway(&server).create_checkout(&request(2000)).await.unwrap_err();
    match err {
        AppError::ProviderRejected(detail) => {
            assert_eq!(detail, "invalid_parameter (items[0].unit_amount)")
        }
        other => panic!("expected ProviderRejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_pay_link_is_invalid_response() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/checkouts");
        then.status(201).json_body(json!({
            "id": "CHEC_1",
            "links": [{"rel": "SELF", "href": "https://example.com/self"}]
        }));
    });

    let err = gateway(&server).create_checkout(&request(2000)).await.unwrap_err();
    assert!(matches!(err, AppError::ProviderUnavailable(_)));
}

#[tokio::test]
async fn test_server_error_is_unavailable_and_not_retried() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(POST).path("/checkouts");
        then.status(502).body("Bad Gateway");
    });

    let err = gateway(&server).create_checkout(&request(2000)).await.unwrap_err();
    assert!(matches!(err, AppError::ProviderUnavailable(_)));
    mock.assert_hits(1);
}

#[tokio::test]
async fn test_fetch_status_prefers_charge_status() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET)
            .path("/checkouts/CHEC_1")
            .header("authorization", format!("Bearer {}", PAGBANK_TEST_TOKEN));
        then.status(200).json_body(json!({
            "id": "CHEC_1",
            "status": "ACTIVE",
            "orders": [{"id": "ORDE_1", "charges": [{"id": "CHAR_1", "status": "PAID"}]}]
        }));
    });

    let status = gateway(&server).fetch_status("CHEC_1").await.unwrap();
    assert_eq!(status.status, CheckoutStatus::Paid);
    assert_eq!(status.raw, "PAID");
}

#[tokio::test]
async fn test_fetch_status_retries_transient_failures() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(GET).path("/checkouts/CHEC_1");
        then.status(503);
    });

    let err = gateway(&server).fetch_status("CHEC_1").await.unwrap_err();
    assert!(matches!(err, AppError::ProviderUnavailable(_)));
    mock.assert_hits(3);
}

#[tokio::test]
async fn test_fetch_status_does_not_retry_rejections() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.method(GET).path("/checkouts/CHEC_404");
        then.status(404).json_body(json!({"message": "Checkout not found"}));
    });

    let err = gateway(&server).fetch_status("CHEC_404").await.unwrap_err();
    assert!(matches!(err, AppError::ProviderRejected(_)));
    mock.assert_hits(1);
}

#[tokio::test]
async fn test_unconfigured_gateway_makes_no_calls() {
    let server = MockServer::start_async().await;
    let mock = server.mock(|when, then| {
        when.any_request();
        then.status(200);
    });

    let mut config = pagbank_config(&server.url(""));
    config.pagbank_token = None;
    let gateway = PaymentGateway::from_config(&config).unwrap();

    assert!(!gateway.is_configured());
    let err = gateway.create_checkout(&request(2000)).await.unwrap_err();
    assert!(matches!(err, AppError::ServiceUnavailable(_)));
    mock.assert_hits(0);
}
