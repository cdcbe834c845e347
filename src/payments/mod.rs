//! Payment gateway capability: open hosted checkouts, read their status and
//! interpret webhook deliveries. One implementation per provider, chosen by
//! `PAYMENT_PROVIDER`; the reconciler never branches on the provider.

mod pagbank;
mod sumup;

pub use pagbank::PagBankClient;
pub use sumup::SumUpClient;

use std::time::Duration;

use axum::http::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use strum::{AsRefStr, EnumString};

use crate::config::PaymentConfig;
use crate::error::{AppError, Result, msg};
use crate::models::CheckoutStatus;
use crate::util::truncate_chars;

/// Provider field limits.
pub const MAX_REFERENCE_LEN: usize = 50;
pub const MAX_ITEM_NAME_LEN: usize = 100;

/// Backoff before each retry of an idempotent status read.
const STATUS_RETRY_DELAYS_MS: &[u64] = &[250, 1000];

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PaymentProvider {
    PagBank,
    SumUp,
}

/// Provider-neutral description of the checkout to open.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub reference_id: String,
    pub item_name: String,
    pub amount_cents: i64,
    /// Only set for publicly reachable deployments
    pub notification_url: Option<String>,
    pub redirect_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreatedCheckout {
    pub id: String,
    pub pay_url: String,
}

/// Status as reported by the provider, raw and normalised.
#[derive(Debug, Clone)]
pub struct ProviderStatus {
    pub raw: String,
    pub status: CheckoutStatus,
}

impl ProviderStatus {
    pub fn from_raw(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            status: CheckoutStatus::from_provider(raw),
        }
    }
}

/// What a webhook delivery says about a checkout.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub checkout_id: String,
    /// None when the provider only signals "something changed" and the
    /// live status has to be fetched.
    pub status: Option<ProviderStatus>,
}

/// Reference id unique per checkout attempt: time first so truncation to the
/// provider limit never drops the part that makes it unique.
pub fn reference_id(app_id: &str, unix_millis: i64) -> String {
    truncate_chars(&format!("app_{}_{}", unix_millis, app_id), MAX_REFERENCE_LEN)
}

/// Per-provider webhook interpretation.
pub trait WebhookProvider: Send + Sync {
    /// Provider name for logging and database storage
    fn provider_name(&self) -> &'static str;

    /// Check delivery authenticity. Providers without signatures accept everything.
    fn verify_webhook(&self, headers: &HeaderMap, body: &[u8]) -> bool;

    /// Parse the raw body. Missing id, or missing status/type, is `INVALID_PAYLOAD`.
    fn parse_webhook(&self, body: &[u8]) -> Result<WebhookEvent>;
}

/// The configured payment gateway.
pub enum PaymentGateway {
    PagBank(PagBankClient),
    SumUp(SumUpClient),
}

impl PaymentGateway {
    pub fn from_config(config: &PaymentConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(match config.provider {
            PaymentProvider::PagBank => PaymentGateway::PagBank(PagBankClient::new(client, config)),
            PaymentProvider::SumUp => PaymentGateway::SumUp(SumUpClient::new(client, config)),
        })
    }

    pub fn provider(&self) -> PaymentProvider {
        match self {
            PaymentGateway::PagBank(_) => PaymentProvider::PagBank,
            PaymentGateway::SumUp(_) => PaymentProvider::SumUp,
        }
    }

    /// Whether credentials are present. Checked before any provider call.
    pub fn is_configured(&self) -> bool {
        match self {
            PaymentGateway::PagBank(c) => c.is_configured(),
            PaymentGateway::SumUp(c) => c.is_configured(),
        }
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(AppError::ServiceUnavailable(msg::PAYMENT_NOT_CONFIGURED.into()))
        }
    }

    /// Open a hosted checkout. Never retried: a lost response could
    /// otherwise leave two live checkouts for one attempt.
    pub async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CreatedCheckout> {
        self.ensure_configured()?;
        match self {
            PaymentGateway::PagBank(c) => c.create_checkout(request).await,
            PaymentGateway::SumUp(c) => c.create_checkout(request).await,
        }
    }

    pub async fn fetch_status(&self, checkout_id: &str) -> Result<ProviderStatus> {
        self.ensure_configured()?;
        match self {
            PaymentGateway::PagBank(c) => c.fetch_status(checkout_id).await,
            PaymentGateway::SumUp(c) => c.fetch_status(checkout_id).await,
        }
    }

    /// PIX artifacts (QR code and copy-paste code) of an open checkout.
    /// Only PagBank issues them.
    pub async fn fetch_pix_artifacts(&self, checkout_id: &str) -> Result<Value> {
        self.ensure_configured()?;
        let artifacts = match self {
            PaymentGateway::PagBank(c) => c.fetch_pix_artifacts(checkout_id).await?,
            PaymentGateway::SumUp(_) => {
                return Err(AppError::BadRequest(msg::PIX_NOT_SUPPORTED.into()));
            }
        };
        artifacts.ok_or_else(|| AppError::NotFound(msg::PIX_NOT_FOUND.into()))
    }

    fn webhook_provider(&self) -> &dyn WebhookProvider {
        match self {
            PaymentGateway::PagBank(c) => c,
            PaymentGateway::SumUp(c) => c,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.webhook_provider().provider_name()
    }

    pub fn verify_webhook(&self, headers: &HeaderMap, body: &[u8]) -> bool {
        self.webhook_provider().verify_webhook(headers, body)
    }

    pub fn parse_webhook(&self, body: &[u8]) -> Result<WebhookEvent> {
        self.webhook_provider().parse_webhook(body)
    }
}

/// Collect a provider's error messages into one string, verbatim.
///
/// Understands PagBank's `error_messages[{description, parameter_name}]`,
/// SumUp's top-level array or `{message, param}`, and a bare `message`.
pub(crate) fn provider_error_message(body: &Value) -> Option<String> {
    fn describe(item: &Value) -> Option<String> {
        let text = item
            .get("description")
            .or_else(|| item.get("message"))
            .or_else(|| item.get("error"))
            .and_then(Value::as_str)?;
        let param = item
            .get("parameter_name")
            .or_else(|| item.get("param"))
            .and_then(Value::as_str);
        Some(match param {
            Some(param) => format!("{} ({})", text, param),
            None => text.to_string(),
        })
    }

    let list = body
        .get("error_messages")
        .and_then(Value::as_array)
        .or_else(|| body.as_array());
    if let Some(list) = list {
        let messages: Vec<String> = list.iter().filter_map(describe).collect();
        if !messages.is_empty() {
            return Some(messages.join("; "));
        }
    }

    describe(body).or_else(|| {
        body.get("error_message")
            .or_else(|| body.get("detail"))
            .and_then(Value::as_str)
            .map(String::from)
    })
}

/// Send a request and decode the JSON body, mapping failures onto the error taxonomy:
/// network errors, 429 and 5xx are `ProviderUnavailable`, other 4xx are
/// `ProviderRejected` carrying the provider's own messages.
pub(crate) async fn send_json(provider: &str, request: RequestBuilder) -> Result<Value> {
    let response = request.send().await.map_err(|e| {
        AppError::ProviderUnavailable(format!("{} request failed: {}", provider, e))
    })?;

    let status = response.status();
    let text = response.text().await.map_err(|e| {
        AppError::ProviderUnavailable(format!("{} response unreadable: {}", provider, e))
    })?;
    let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(body);
    }

    let detail = provider_error_message(&body).unwrap_or_else(|| {
        if text.is_empty() {
            format!("HTTP {}", status)
        } else {
            truncate_chars(&text, 500)
        }
    });
    tracing::warn!(provider, status = %status, detail = %detail, "Payment provider returned an error");

    if is_transient(status) {
        Err(AppError::ProviderUnavailable(format!("{}: {}", provider, detail)))
    } else {
        Err(AppError::ProviderRejected(detail))
    }
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// GET with limited retries. Only `ProviderUnavailable` is retried.
pub(crate) async fn get_json_with_retry(
    provider: &str,
    make_request: impl Fn() -> RequestBuilder,
) -> Result<Value> {
    let mut last_error = None;

    for (attempt, delay_ms) in std::iter::once(&0u64).chain(STATUS_RETRY_DELAYS_MS).enumerate() {
        if attempt > 0 {
            tracing::warn!(provider, attempt, delay_ms, "Retrying status request");
            tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
        }
        match send_json(provider, make_request()).await {
            Ok(body) => return Ok(body),
            Err(e @ AppError::ProviderUnavailable(_)) => last_error = Some(e),
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| AppError::ProviderUnavailable(msg::PROVIDER_UNREACHABLE.into())))
}

/// Read a string field, trimming and rejecting empties.
pub(crate) fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
