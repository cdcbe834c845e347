use axum::http::HeaderMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::PaymentConfig;
use crate::crypto::{constant_time_eq, sha256_hex};
use crate::error::{AppError, Result, msg};

use super::{
    CheckoutRequest, CreatedCheckout, ProviderStatus, WebhookEvent, WebhookProvider,
    get_json_with_retry, send_json, str_field,
};

const PROVIDER: &str = "pagbank";

/// Webhook event types that mean the order was paid.
const PAID_EVENT_TYPES: &[&str] = &["ORDER_PAID", "CHECKOUT_PAID"];

#[derive(Debug, Serialize)]
struct CreateCheckoutBody<'a> {
    reference_id: &'a str,
    items: [CheckoutItem<'a>; 1],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    notification_urls: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_url: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct CheckoutItem<'a> {
    reference_id: String,
    name: &'a str,
    quantity: u32,
    unit_amount: i64,
}

#[derive(Debug, Deserialize)]
struct CheckoutResponse {
    id: Option<String>,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    rel: Option<String>,
    href: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    id: Option<String>,
    #[serde(rename = "type")]
    event_type: Option<String>,
    status: Option<String>,
    #[serde(default)]
    charges: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct PagBankClient {
    client: Client,
    token: Option<String>,
    base_url: String,
    verify_webhooks: bool,
}

impl PagBankClient {
    pub fn new(client: Client, config: &PaymentConfig) -> Self {
        Self {
            client,
            token: config.pagbank_token.clone(),
            base_url: config.pagbank_base_url.trim_end_matches('/').to_string(),
            verify_webhooks: config.pagbank_verify_webhooks,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    fn token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| AppError::ServiceUnavailable(msg::PAYMENT_NOT_CONFIGURED.into()))
    }

    pub async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CreatedCheckout> {
        let body = CreateCheckoutBody {
            reference_id: &request.reference_id,
            items: [CheckoutItem {
                reference_id: format!("item_{}", request.reference_id),
                name: &request.item_name,
                quantity: 1,
                unit_amount: request.amount_cents,
            }],
            notification_urls: request.notification_url.as_deref().into_iter().collect(),
            redirect_url: request.redirect_url.as_deref(),
        };

        tracing::debug!(reference_id = %request.reference_id, amount_cents = request.amount_cents, "Creating PagBank checkout");

        let response = send_json(
            PROVIDER,
            self.client
                .post(format!("{}/checkouts", self.base_url))
                .bearer_auth(self.token()?)
                .json(&body),
        )
        .await?;

        let checkout: CheckoutResponse = serde_json::from_value(response).map_err(|e| {
            tracing::error!("Unexpected PagBank checkout response: {}", e);
            AppError::ProviderUnavailable(msg::INVALID_PROVIDER_RESPONSE.into())
        })?;

        let pay_url = checkout
            .links
            .iter()
            .find(|l| l.rel.as_deref().is_some_and(|r| r.eq_ignore_ascii_case("PAY")))
            .and_then(|l| l.href.clone())
            .filter(|href| !href.is_empty());

        match (checkout.id.filter(|id| !id.is_empty()), pay_url) {
            (Some(id), Some(pay_url)) => Ok(CreatedCheckout { id, pay_url }),
            _ => {
                tracing::error!("PagBank checkout response is missing an id or PAY link");
                Err(AppError::ProviderUnavailable(msg::INVALID_PROVIDER_RESPONSE.into()))
            }
        }
    }

    /// GET the checkout resource, retrying transient failures.
    async fn get_checkout(&self, checkout_id: &str) -> Result<Value> {
        let token = self.token()?;
        let url = format!("{}/checkouts/{}", self.base_url, checkout_id);
        get_json_with_retry(PROVIDER, || self.client.get(&url).bearer_auth(token)).await
    }

    pub async fn fetch_status(&self, checkout_id: &str) -> Result<ProviderStatus> {
        let body = self.get_checkout(checkout_id).await?;

        status_from_resource(&body)
            .map(|raw| ProviderStatus::from_raw(&raw))
            .ok_or_else(|| AppError::ProviderUnavailable(msg::INVALID_PROVIDER_RESPONSE.into()))
    }

    /// The `pix.artefacts` block of a checkout, if PagBank has generated one.
    pub async fn fetch_pix_artifacts(&self, checkout_id: &str) -> Result<Option<Value>> {
        let body = self.get_checkout(checkout_id).await?;

        Ok(body
            .get("pix")
            .and_then(|pix| pix.get("artefacts"))
            .filter(|artefacts| !artefacts.is_null())
            .cloned())
    }
}

/// First charge status wins over the resource status; a checkout is "ACTIVE"
/// long after its charge has been paid.
fn status_from_resource(body: &Value) -> Option<String> {
    let charges = body.get("charges").and_then(Value::as_array).or_else(|| {
        body.get("orders")
            .and_then(Value::as_array)
            .and_then(|orders| orders.first())
            .and_then(|order| order.get("charges"))
            .and_then(Value::as_array)
    });

    charges
        .and_then(|c| c.first())
        .and_then(|c| str_field(c, "status"))
        .or_else(|| str_field(body, "status"))
        .map(String::from)
}

impl WebhookProvider for PagBankClient {
    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    /// PagBank signs notifications as `sha256("{token}-{body}")` in
    /// `x-authenticity-token`. Only enforced when enabled.
    fn verify_webhook(&self, headers: &HeaderMap, body: &[u8]) -> bool {
        if !self.verify_webhooks {
            return true;
        }
        let Some(token) = self.token.as_deref() else {
            return false;
        };
        let Some(signature) = headers
            .get("x-authenticity-token")
            .and_then(|v| v.to_str().ok())
        else {
            return false;
        };

        let mut signed = Vec::with_capacity(token.len() + 1 + body.len());
        signed.extend_from_slice(token.as_bytes());
        signed.push(b'-');
        signed.extend_from_slice(body);

        constant_time_eq(&sha256_hex(&signed), &signature.to_ascii_lowercase())
    }

    fn parse_webhook(&self, body: &[u8]) -> Result<WebhookEvent> {
        let payload: WebhookPayload = serde_json::from_slice(body)
            .map_err(|_| AppError::BadRequest(msg::INVALID_PAYLOAD.into()))?;

        let checkout_id = payload
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::BadRequest(msg::INVALID_PAYLOAD.into()))?;

        let raw = match (&payload.event_type, &payload.status) {
            (Some(t), _) if PAID_EVENT_TYPES.contains(&t.to_ascii_uppercase().as_str()) => t.clone(),
            _ => payload
                .charges
                .first()
                .and_then(|c| str_field(c, "status"))
                .map(String::from)
                .or(payload.status)
                .or(payload.event_type)
                .ok_or_else(|| AppError::BadRequest(msg::INVALID_PAYLOAD.into()))?,
        };

        let status = if PAID_EVENT_TYPES.contains(&raw.to_ascii_uppercase().as_str()) {
            ProviderStatus {
                raw,
                status: crate::models::CheckoutStatus::Paid,
            }
        } else {
            ProviderStatus::from_raw(&raw)
        };

        Ok(WebhookEvent {
            checkout_id,
            status: Some(status),
        })
    }
}
