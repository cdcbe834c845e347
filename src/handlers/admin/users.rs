use axum::{
    extract::{Extension, State},
    http::StatusCode,
};

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path};
use crate::middleware::AuthUser;
use crate::models::{User, UserRole};

/// GET /api/users - newest first
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_users(&conn)?))
}

/// POST /api/users/{id}/make-admin
pub async fn make_admin(
    State(state): State<AppState>,
    Extension(AuthUser(admin)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<User>> {
    let conn = state.db.get()?;
    if !queries::set_user_role(&conn, &id, UserRole::Admin)? {
        return Err(AppError::NotFound(msg::USER_NOT_FOUND.into()));
    }
    let user = queries::get_user_by_id(&conn, &id)?.or_not_found(msg::USER_NOT_FOUND)?;

    tracing::info!(user_id = %user.id, admin_id = %admin.id, "User promoted to admin");
    Ok(Json(user))
}

/// DELETE /api/users/{id} - refuses to remove the last admin
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(AuthUser(admin)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let conn = state.db.get()?;
    if !queries::delete_user(&conn, &id)? {
        return Err(AppError::NotFound(msg::USER_NOT_FOUND.into()));
    }

    tracing::info!(user_id = %id, admin_id = %admin.id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
