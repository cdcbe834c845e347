use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};

use crate::db::AppState;
use crate::extractors::Path;
use crate::reconcile::{self, WebhookResult};

/// POST /api/webhook/{provider}
///
/// Only the configured provider's path is live; the other answers 404.
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookResult {
    if !provider.eq_ignore_ascii_case(state.payments.provider().as_ref()) {
        tracing::warn!(provider = %provider, "Webhook for a provider that is not configured");
        return (StatusCode::NOT_FOUND, "Unknown provider");
    }

    reconcile::handle_webhook(&state, &headers, &body).await
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/webhook/{provider}", post(handle_payment_webhook))
}
