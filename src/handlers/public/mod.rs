mod accounts;
mod catalog;
mod downloads;

pub use accounts::*;
pub use catalog::*;
pub use downloads::*;

use axum::{routing::{get, post}, Json, Router};
use serde::Serialize;

use crate::db::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/apps", get(list_apps))
        // Token "free" serves approved free apps; anything else is a one-time purchase token
        .route("/download/{token}/{filename}", get(download_file))
}
