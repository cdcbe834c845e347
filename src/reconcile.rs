//! Payment reconciliation: map provider status reports (webhook or poll) onto
//! local checkouts and run the ledger exactly once per confirmed payment.
//!
//! The only gate in front of the ledger is the conditional `pending|authorized
//! -> paid` update in `try_claim_checkout`. Claim, ledger and download token
//! share one transaction; the buyer email goes out after commit.

use axum::{
    body::Bytes,
    http::{HeaderMap, StatusCode},
};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::ledger::{self, RevenueSplit};
use crate::models::{Checkout, CheckoutStatus, DownloadToken, User};
use crate::payments::ProviderStatus;

/// Result type for webhook operations.
pub type WebhookResult = (StatusCode, &'static str);

/// A checkout that was confirmed by this call.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub checkout: Checkout,
    pub app_title: String,
    pub split: RevenueSplit,
    pub token: DownloadToken,
}

#[derive(Debug, Clone)]
pub enum Outcome {
    /// This call won the claim; ledger applied and token issued.
    Confirmed(Box<Confirmation>),
    /// Non-paid status recorded.
    Updated(CheckoutStatus),
    /// Nothing changed; carries the stored status.
    Unchanged(CheckoutStatus),
}

/// Apply a provider status to a stored checkout.
///
/// Terminal checkouts are never touched. A paid report claims the checkout,
/// credits the ledger and issues a download token, all in one transaction.
pub fn apply_status(
    conn: &mut Connection,
    checkout: &Checkout,
    reported: &ProviderStatus,
    token_ttl_secs: i64,
) -> Result<Outcome> {
    if checkout.status.is_terminal() {
        return Ok(Outcome::Unchanged(checkout.status));
    }

    if reported.status != CheckoutStatus::Paid {
        let changed = queries::advance_checkout_status(
            conn,
            &checkout.id,
            reported.status,
            Some(&reported.raw),
        )?;
        return Ok(if changed {
            tracing::info!(
                checkout_id = %checkout.id,
                status = reported.status.as_ref(),
                raw = %reported.raw,
                "Checkout status updated"
            );
            Outcome::Updated(reported.status)
        } else {
            Outcome::Unchanged(checkout.status)
        });
    }

    let tx = conn.transaction()?;

    if !queries::try_claim_checkout(&tx, &checkout.id, Some(&reported.raw))? {
        tracing::info!(checkout_id = %checkout.id, "Checkout already claimed by another delivery");
        return Ok(Outcome::Unchanged(CheckoutStatus::Paid));
    }

    // Errors below roll the claim back so the provider's retry can claim again
    let Some(app) = queries::get_app_by_id(&tx, &checkout.app_id)? else {
        // Retrying cannot help; keep the paid state for the audit trail
        tx.commit()?;
        tracing::error!(
            checkout_id = %checkout.id,
            app_id = %checkout.app_id,
            "Paid checkout references a deleted app, no revenue credited"
        );
        return Ok(Outcome::Updated(CheckoutStatus::Paid));
    };

    let split = ledger::apply_sale(&tx, &app, checkout.amount_cents)?;
    let token = queries::create_download_token(&tx, checkout, &app.filename, token_ttl_secs)?;

    tx.commit()?;

    tracing::info!(
        checkout_id = %checkout.id,
        app_id = %app.id,
        amount_cents = split.amount_cents,
        admin_cents = split.admin_cents,
        developer_cents = split.developer_cents,
        "Payment confirmed"
    );

    let mut confirmed = checkout.clone();
    confirmed.status = CheckoutStatus::Paid;
    confirmed.provider_status = Some(reported.raw.clone());

    Ok(Outcome::Confirmed(Box::new(Confirmation {
        checkout: confirmed,
        app_title: app.title,
        split,
        token,
    })))
}

pub fn download_url(site_url: &str, token: &DownloadToken) -> String {
    format!("{}/download/{}/{}", site_url, token.token, token.filename)
}

/// Email the buyer their download link in the background. Failures are logged only.
pub fn spawn_payment_email(state: &AppState, confirmation: &Confirmation) {
    let buyer = match state
        .db
        .get()
        .map_err(AppError::from)
        .and_then(|conn| queries::get_user_by_id(&conn, &confirmation.checkout.user_id))
    {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::warn!(user_id = %confirmation.checkout.user_id, "Buyer account gone, skipping payment email");
            return;
        }
        Err(e) => {
            tracing::error!("Failed to load buyer for payment email: {}", e);
            return;
        }
    };

    let email_service = state.email_service.clone();
    let url = download_url(&state.site_url, &confirmation.token);
    let title = confirmation.app_title.clone();
    let amount_cents = confirmation.checkout.amount_cents;
    let checkout_id = confirmation.checkout.id.clone();

    tokio::spawn(async move {
        if let Err(e) = email_service
            .send_payment_confirmed(&buyer.email, &title, amount_cents, &url)
            .await
        {
            tracing::error!(checkout_id = %checkout_id, "Failed to send payment confirmation email: {}", e);
        }
    });
}

/// Process one webhook delivery end to end.
///
/// Unknown and already-terminal checkouts are acknowledged with 200 so the
/// provider stops retrying; only transient failures answer 5xx.
pub async fn handle_webhook(state: &AppState, headers: &HeaderMap, body: &Bytes) -> WebhookResult {
    let provider = state.payments.provider_name();

    if !state.payments.verify_webhook(headers, body) {
        tracing::warn!(provider, "Webhook failed authenticity check");
        return (StatusCode::UNAUTHORIZED, "Invalid signature");
    }

    let event = match state.payments.parse_webhook(body) {
        Ok(event) => event,
        Err(_) => {
            tracing::warn!(provider, "Webhook with invalid payload");
            return (StatusCode::BAD_REQUEST, "Invalid payload");
        }
    };

    let checkout = {
        let conn = match state.db.get() {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!("DB connection error: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
            }
        };
        match queries::get_checkout(&conn, &event.checkout_id) {
            Ok(Some(checkout)) => checkout,
            Ok(None) => {
                tracing::warn!(provider, checkout_id = %event.checkout_id, "Webhook for unknown checkout");
                return (StatusCode::OK, "Unknown checkout");
            }
            Err(e) => {
                tracing::error!("DB error: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Database error");
            }
        }
    };

    if checkout.status.is_terminal() {
        tracing::info!(
            checkout_id = %checkout.id,
            status = checkout.status.as_ref(),
            "Webhook for terminal checkout ignored"
        );
        return (StatusCode::OK, "Already processed");
    }

    let reported = match event.status {
        Some(status) => status,
        None => match state.payments.fetch_status(&checkout.id).await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(checkout_id = %checkout.id, "Failed to fetch live checkout status: {}", e);
                return (StatusCode::SERVICE_UNAVAILABLE, "Provider unavailable");
            }
        },
    };

    let outcome = state
        .db
        .get()
        .map_err(AppError::from)
        .and_then(|mut conn| apply_status(&mut conn, &checkout, &reported, state.download_token_ttl_secs));

    match outcome {
        Ok(Outcome::Confirmed(confirmation)) => {
            spawn_payment_email(state, &confirmation);
            (StatusCode::OK, "OK")
        }
        Ok(Outcome::Updated(_)) => (StatusCode::OK, "OK"),
        Ok(Outcome::Unchanged(_)) => (StatusCode::OK, "Already processed"),
        Err(e) => {
            // Nothing committed; the provider will redeliver
            tracing::error!(checkout_id = %checkout.id, "Failed to reconcile checkout: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to process payment")
        }
    }
}

/// Checkout state as returned to the polling buyer.
#[derive(Debug, Serialize)]
pub struct CheckoutStatusView {
    pub checkout_id: String,
    pub app_id: String,
    pub status: CheckoutStatus,
    pub provider_status: Option<String>,
    pub amount_cents: i64,
    /// Present while the buyer still holds an unredeemed link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

/// Load a checkout on behalf of its buyer: 404 if unknown, 403 for anyone else.
fn buyer_checkout(state: &AppState, requester: &User, checkout_id: &str) -> Result<Checkout> {
    let conn = state.db.get()?;
    let checkout = queries::get_checkout(&conn, checkout_id)?.or_not_found(msg::CHECKOUT_NOT_FOUND)?;

    if checkout.user_id != requester.id {
        return Err(AppError::Forbidden(msg::NOT_CHECKOUT_BUYER.into()));
    }
    Ok(checkout)
}

/// Buyer-initiated status check.
///
/// Only the buyer may poll. Open checkouts are refreshed from the provider and
/// a paid report goes through the same claim as a webhook.
pub async fn poll_status(state: &AppState, requester: &User, checkout_id: &str) -> Result<CheckoutStatusView> {
    let checkout = buyer_checkout(state, requester, checkout_id)?;

    if !checkout.status.is_terminal() {
        let reported = state.payments.fetch_status(&checkout.id).await?;
        let mut conn = state.db.get()?;
        if let Outcome::Confirmed(confirmation) =
            apply_status(&mut conn, &checkout, &reported, state.download_token_ttl_secs)?
        {
            spawn_payment_email(state, &confirmation);
        }
    }

    let conn = state.db.get()?;
    let current = queries::get_checkout(&conn, checkout_id)?.or_not_found(msg::CHECKOUT_NOT_FOUND)?;
    let download_url = if current.status == CheckoutStatus::Paid {
        queries::get_active_download_token_for_checkout(&conn, &current.id)?
            .map(|token| download_url(&state.site_url, &token))
    } else {
        None
    };

    Ok(CheckoutStatusView {
        checkout_id: current.id,
        app_id: current.app_id,
        status: current.status,
        provider_status: current.provider_status,
        amount_cents: current.amount_cents,
        download_url,
    })
}

#[derive(Debug, Serialize)]
pub struct PixArtifactsView {
    pub checkout_id: String,
    pub pix_artifacts: Value,
}

/// PIX payment artifacts for the buyer's own checkout, read live from the provider.
pub async fn pix_artifacts(state: &AppState, requester: &User, checkout_id: &str) -> Result<PixArtifactsView> {
    let checkout = buyer_checkout(state, requester, checkout_id)?;
    let pix_artifacts = state.payments.fetch_pix_artifacts(&checkout.id).await?;

    Ok(PixArtifactsView {
        checkout_id: checkout.id,
        pix_artifacts,
    })
}
