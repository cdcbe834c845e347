use axum::extract::Extension;

use crate::error::Result;
use crate::extractors::Json;
use crate::middleware::AuthUser;
use crate::models::User;

/// GET /api/me
pub async fn me(Extension(AuthUser(user)): Extension<AuthUser>) -> Result<Json<User>> {
    Ok(Json(user))
}
