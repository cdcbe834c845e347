use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::models::User;

/// The authenticated caller, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// Verify the session token and reload the account, so role changes and
/// deletions apply to tokens already issued.
fn authenticate(state: &AppState, auth: Option<TypedHeader<Authorization<Bearer>>>) -> Result<User> {
    let TypedHeader(auth) = auth.ok_or(AppError::Unauthorized)?;
    let claims = state.session_keys.verify(auth.token())?;
    let user_id = claims.subject.ok_or(AppError::Unauthorized)?;

    let conn = state.db.get()?;
    queries::get_user_by_id(&conn, &user_id)?.ok_or(AppError::Unauthorized)
}

pub async fn require_user(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let user = authenticate(&state, auth)?;

    request.extensions_mut().insert(AuthUser(user));
    Ok(next.run(request).await)
}

pub async fn require_admin(
    State(state): State<AppState>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let user = authenticate(&state, auth)?;

    if !user.is_admin() {
        tracing::warn!(user_id = %user.id, "Non-admin attempted an admin action");
        return Err(AppError::Forbidden(msg::ADMIN_REQUIRED.into()));
    }

    request.extensions_mut().insert(AuthUser(user));
    Ok(next.run(request).await)
}
