mod account;
mod developer;
mod purchases;

pub use account::*;
pub use developer::*;
pub use purchases::*;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::db::AppState;
use crate::middleware::require_user;

/// Routes for any signed-in user.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/me", get(me))
        // Developer
        .route("/api/upload", post(upload_app))
        .route("/api/developer/apps", get(my_apps))
        .route("/api/developer/revenue", get(my_revenue))
        // Buyer
        .route("/api/apps/{id}/download", post(track_download))
        .route("/api/pay/{id}", post(create_payment))
        .route("/api/pay/{id}/status", get(payment_status))
        .route("/api/pay/{id}/pix-artifacts", get(pix_artifacts))
        .layer(middleware::from_fn_with_state(state, require_user))
}
