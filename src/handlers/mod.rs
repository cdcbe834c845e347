pub mod admin;
pub mod public;
pub mod users;
pub mod webhooks;

use std::path::{Path, PathBuf};

use axum::{Router, extract::DefaultBodyLimit};

use crate::db::AppState;
use crate::error::{AppError, Result, msg};
use crate::util::is_safe_filename;

/// Every route, with state applied. Layers that wrap the whole service
/// (tracing, CORS) are added by the caller.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .merge(public::router())
        .merge(users::router(state.clone()))
        .merge(admin::router(state.clone()))
        .merge(webhooks::router())
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Resolve a stored file name inside the upload directory.
pub(crate) fn upload_path(upload_dir: &Path, filename: &str) -> Result<PathBuf> {
    if !is_safe_filename(filename) {
        return Err(AppError::BadRequest(msg::INVALID_FILENAME.into()));
    }
    Ok(upload_dir.join(filename))
}
