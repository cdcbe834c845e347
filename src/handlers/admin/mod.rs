mod apps;
mod revenue;
mod users;

pub use apps::*;
pub use revenue::*;
pub use users::*;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::db::AppState;
use crate::middleware::require_admin;

/// Admin-only routes.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/apps/pending", get(list_pending_apps))
        .route("/api/admin/approve/{id}", post(approve_app))
        .route("/api/apps/{id}", delete(delete_app))
        .route("/api/users", get(list_users))
        .route("/api/users/{id}/make-admin", post(make_admin))
        .route("/api/users/{id}", delete(delete_user))
        .route("/api/revenue", get(revenue_report))
        .layer(middleware::from_fn_with_state(state, require_admin))
}
