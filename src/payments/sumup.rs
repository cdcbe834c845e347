use axum::http::HeaderMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::PaymentConfig;
use crate::error::{AppError, Result, msg};

use super::{
    CheckoutRequest, CreatedCheckout, ProviderStatus, WebhookEvent, WebhookProvider,
    get_json_with_retry, send_json, str_field,
};

const PROVIDER: &str = "sumup";

#[derive(Debug, Serialize)]
struct CreateCheckoutBody<'a> {
    checkout_reference: &'a str,
    /// Major units; SumUp does not accept minor-unit integers
    amount: f64,
    currency: &'a str,
    merchant_code: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    return_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_url: Option<&'a str>,
    hosted_checkout: HostedCheckout,
}

#[derive(Debug, Serialize)]
struct HostedCheckout {
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct CheckoutResponse {
    id: Option<String>,
    hosted_checkout_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    id: Option<String>,
    event_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SumUpClient {
    client: Client,
    api_key: Option<String>,
    merchant_code: Option<String>,
    base_url: String,
    currency: String,
}

impl SumUpClient {
    pub fn new(client: Client, config: &PaymentConfig) -> Self {
        Self {
            client,
            api_key: config.sumup_api_key.clone(),
            merchant_code: config.sumup_merchant_code.clone(),
            base_url: config.sumup_base_url.trim_end_matches('/').to_string(),
            currency: config.currency.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.merchant_code.is_some()
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        match (self.api_key.as_deref(), self.merchant_code.as_deref()) {
            (Some(key), Some(merchant)) => Ok((key, merchant)),
            _ => Err(AppError::ServiceUnavailable(msg::PAYMENT_NOT_CONFIGURED.into())),
        }
    }

    pub async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CreatedCheckout> {
        let (api_key, merchant_code) = self.credentials()?;

        let body = CreateCheckoutBody {
            checkout_reference: &request.reference_id,
            amount: request.amount_cents as f64 / 100.0,
            currency: &self.currency,
            merchant_code,
            description: &request.item_name,
            return_url: request.notification_url.as_deref(),
            redirect_url: request.redirect_url.as_deref(),
            hosted_checkout: HostedCheckout { enabled: true },
        };

        tracing::debug!(reference_id = %request.reference_id, amount_cents = request.amount_cents, "Creating SumUp checkout");

        let response = send_json(
            PROVIDER,
            self.client
                .post(format!("{}/v0.1/checkouts", self.base_url))
                .bearer_auth(api_key)
                .json(&body),
        )
        .await?;

        let checkout: CheckoutResponse = serde_json::from_value(response).map_err(|e| {
            tracing::error!("Unexpected SumUp checkout response: {}", e);
            AppError::ProviderUnavailable(msg::INVALID_PROVIDER_RESPONSE.into())
        })?;

        match (
            checkout.id.filter(|id| !id.is_empty()),
            checkout.hosted_checkout_url.filter(|url| !url.is_empty()),
        ) {
            (Some(id), Some(pay_url)) => Ok(CreatedCheckout { id, pay_url }),
            _ => {
                tracing::error!("SumUp checkout response is missing an id or hosted_checkout_url");
                Err(AppError::ProviderUnavailable(msg::INVALID_PROVIDER_RESPONSE.into()))
            }
        }
    }

    pub async fn fetch_status(&self, checkout_id: &str) -> Result<ProviderStatus> {
        let (api_key, _) = self.credentials()?;
        let url = format!("{}/v0.1/checkouts/{}", self.base_url, checkout_id);
        let body = get_json_with_retry(PROVIDER, || self.client.get(&url).bearer_auth(api_key)).await?;

        str_field(&body, "status")
            .map(ProviderStatus::from_raw)
            .ok_or_else(|| AppError::ProviderUnavailable(msg::INVALID_PROVIDER_RESPONSE.into()))
    }
}

impl WebhookProvider for SumUpClient {
    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    // SumUp does not sign checkout notifications; the status is always
    // re-read from the API, so an unsigned event cannot mark anything paid.
    fn verify_webhook(&self, _headers: &HeaderMap, _body: &[u8]) -> bool {
        true
    }

    fn parse_webhook(&self, body: &[u8]) -> Result<WebhookEvent> {
        let payload: WebhookPayload = serde_json::from_slice(body)
            .map_err(|_| AppError::BadRequest(msg::INVALID_PAYLOAD.into()))?;

        let checkout_id = payload
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::BadRequest(msg::INVALID_PAYLOAD.into()))?;

        if payload.event_type.as_deref().is_none_or(|t| t.trim().is_empty()) {
            return Err(AppError::BadRequest(msg::INVALID_PAYLOAD.into()));
        }

        Ok(WebhookEvent {
            checkout_id,
            status: None,
        })
    }
}
