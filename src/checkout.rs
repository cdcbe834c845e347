//! Checkout initiation: validate a purchase, open a hosted checkout with the
//! configured provider and persist it as pending.

use chrono::Utc;
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::models::{App, Checkout, CreateCheckout, User};
use crate::payments::{self, CheckoutRequest, MAX_ITEM_NAME_LEN};
use crate::util::{is_loopback_url, truncate_chars};

pub use crate::models::MAX_PRICE_CENTS;

pub const MAX_TITLE_CHARS: usize = 100;

#[derive(Debug, Serialize)]
pub struct StartedCheckout {
    pub checkout_id: String,
    pub payment_url: String,
    pub amount_cents: i64,
    pub app_name: String,
}

/// Purchase preconditions, in reporting order. Returns the amount to charge.
pub fn validate_purchase(app: &App) -> Result<i64> {
    if app.price_cents <= 0 {
        return Err(AppError::BadRequest(msg::NOT_PURCHASABLE.into()));
    }
    if app.price_cents > MAX_PRICE_CENTS {
        return Err(AppError::BadRequest(msg::INVALID_PRICE.into()));
    }

    let title = app.title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest(msg::TITLE_EMPTY.into()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::BadRequest(msg::TITLE_TOO_LONG.into()));
    }

    Ok(app.price_cents)
}

/// Callback URLs for the provider; none when the site is only reachable locally.
fn callback_urls(state: &AppState) -> (Option<String>, Option<String>) {
    if is_loopback_url(&state.site_url) {
        return (None, None);
    }
    (
        Some(format!(
            "{}/api/webhook/{}",
            state.site_url,
            state.payments.provider().as_ref()
        )),
        Some(format!("{}/payment-return", state.site_url)),
    )
}

/// Open a provider checkout for `buyer` and record it locally as pending.
///
/// Nothing is persisted when the provider refuses or fails.
pub async fn start_checkout(state: &AppState, buyer: &User, app_id: &str) -> Result<StartedCheckout> {
    let app = {
        let conn = state.db.get()?;
        queries::get_app_by_id(&conn, app_id)?
            .filter(|a| a.approved)
            .or_not_found(msg::APP_NOT_FOUND)?
    };

    let amount_cents = validate_purchase(&app)?;

    if !state.payments.is_configured() {
        tracing::error!(provider = state.payments.provider_name(), "Checkout requested but payment provider credentials are missing");
        return Err(AppError::ServiceUnavailable(msg::PAYMENT_NOT_CONFIGURED.into()));
    }

    let (notification_url, redirect_url) = callback_urls(state);
    let request = CheckoutRequest {
        reference_id: payments::reference_id(&app.id, Utc::now().timestamp_millis()),
        item_name: truncate_chars(app.title.trim(), MAX_ITEM_NAME_LEN),
        amount_cents,
        notification_url,
        redirect_url,
    };

    let created = state.payments.create_checkout(&request).await?;

    let checkout: Checkout = {
        let conn = state.db.get()?;
        queries::create_checkout(
            &conn,
            &CreateCheckout {
                id: created.id.clone(),
                app_id: app.id.clone(),
                user_id: buyer.id.clone(),
                amount_cents,
                provider: state.payments.provider_name().to_string(),
            },
        )?
    };

    tracing::info!(
        checkout_id = %checkout.id,
        app_id = %app.id,
        user_id = %buyer.id,
        amount_cents,
        reference_id = %request.reference_id,
        "Checkout created"
    );

    Ok(StartedCheckout {
        checkout_id: checkout.id,
        payment_url: created.pay_url,
        amount_cents,
        app_name: app.title,
    })
}
