use axum::{
    extract::{Extension, State},
    http::StatusCode,
};

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path};
use crate::middleware::AuthUser;
use crate::models::App;

/// GET /api/apps/pending
pub async fn list_pending_apps(State(state): State<AppState>) -> Result<Json<Vec<App>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_pending_apps(&conn)?))
}

/// POST /api/admin/approve/{id} - list the app and tell its owner
pub async fn approve_app(
    State(state): State<AppState>,
    Extension(AuthUser(admin)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<App>> {
    let app = {
        let conn = state.db.get()?;
        if !queries::approve_app(&conn, &id)? {
            return Err(AppError::NotFound(msg::APP_NOT_FOUND.into()));
        }
        queries::get_app_by_id(&conn, &id)?.or_not_found(msg::APP_NOT_FOUND)?
    };

    tracing::info!(app_id = %app.id, admin_id = %admin.id, "App approved");

    let email_service = state.email_service.clone();
    let approved = app.clone();
    tokio::spawn(async move {
        if let Err(e) = email_service.send_app_approved(&approved).await {
            tracing::warn!(app_id = %approved.id, "Failed to send approval email: {}", e);
        }
    });

    Ok(Json(app))
}

/// DELETE /api/apps/{id}
///
/// Checkouts for the app stay behind as the purchase record. Stored files are
/// removed best effort.
pub async fn delete_app(
    State(state): State<AppState>,
    Extension(AuthUser(admin)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let app = {
        let conn = state.db.get()?;
        let app = queries::get_app_by_id(&conn, &id)?.or_not_found(msg::APP_NOT_FOUND)?;
        if !queries::delete_app(&conn, &id)? {
            return Err(AppError::NotFound(msg::APP_NOT_FOUND.into()));
        }
        app
    };

    tracing::info!(app_id = %app.id, admin_id = %admin.id, "App deleted");

    let files = std::iter::once(&app.filename)
        .chain(app.screenshots.iter())
        .chain(app.icon.iter());
    for name in files {
        if let Err(e) = tokio::fs::remove_file(state.upload_dir.join(name)).await {
            tracing::warn!(app_id = %app.id, file = %name, "Failed to remove app file: {}", e);
        }
    }

    Ok(StatusCode::NO_CONTENT)
}
