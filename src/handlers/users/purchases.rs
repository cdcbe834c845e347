use axum::extract::{Extension, State};
use serde::Serialize;

use crate::checkout::{self, StartedCheckout};
use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path};
use crate::handlers::public::FREE_TOKEN;
use crate::ledger::{self, RevenueSplit};
use crate::middleware::AuthUser;
use crate::reconcile::{self, CheckoutStatusView, PixArtifactsView};

#[derive(Debug, Serialize)]
pub struct TrackDownloadResponse {
    pub revenue: RevenueSplit,
    pub download_url: String,
}

/// POST /api/pay/{id} - open a provider checkout for a paid app
pub async fn create_payment(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(app_id): Path<String>,
) -> Result<Json<StartedCheckout>> {
    let started = checkout::start_checkout(&state, &user, &app_id).await?;
    Ok(Json(started))
}

/// GET /api/pay/{id}/status - buyer-only status refresh
pub async fn payment_status(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(checkout_id): Path<String>,
) -> Result<Json<CheckoutStatusView>> {
    let view = reconcile::poll_status(&state, &user, &checkout_id).await?;
    Ok(Json(view))
}

/// GET /api/pay/{id}/pix-artifacts - QR code and copy-paste code for the buyer
pub async fn pix_artifacts(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(checkout_id): Path<String>,
) -> Result<Json<PixArtifactsView>> {
    let view = reconcile::pix_artifacts(&state, &user, &checkout_id).await?;
    Ok(Json(view))
}

/// POST /api/apps/{id}/download - credit a free download with the nominal ad amount.
///
/// Paid apps are refused; their revenue only moves through a confirmed checkout.
pub async fn track_download(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(app_id): Path<String>,
) -> Result<Json<TrackDownloadResponse>> {
    let conn = state.db.get()?;
    let app = queries::get_app_by_id(&conn, &app_id)?
        .filter(|a| a.approved)
        .or_not_found(msg::APP_NOT_FOUND)?;

    if !app.is_free() {
        return Err(AppError::BadRequest(msg::PAID_APP_TRACKING.into()));
    }

    let revenue = ledger::record_free_download(&conn, &app, state.free_download_ad_cents)?;
    tracing::info!(app_id = %app.id, user_id = %user.id, "Free download tracked");

    Ok(Json(TrackDownloadResponse {
        revenue,
        download_url: format!("{}/download/{}/{}", state.site_url, FREE_TOKEN, app.filename),
    }))
}
