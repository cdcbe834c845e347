use axum::{extract::State, http::StatusCode};
use serde::Serialize;

use crate::crypto::{hash_password, verify_password};
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::models::{CreateUser, LoginRequest, User, UserRole};

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// POST /api/register
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<CreateUser>,
) -> Result<(StatusCode, Json<User>)> {
    input.validate()?;

    let password = input.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;

    let user = {
        let conn = state.db.get()?;
        queries::create_user(&conn, &input, &password_hash, UserRole::User)?
    };

    tracing::info!(user_id = %user.id, "User registered");

    let email_service = state.email_service.clone();
    let welcome_to = user.clone();
    tokio::spawn(async move {
        if let Err(e) = email_service.send_welcome(&welcome_to).await {
            tracing::warn!(user_id = %welcome_to.id, "Failed to send welcome email: {}", e);
        }
    });

    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/login
///
/// Unknown email and wrong password answer the same way.
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let user = {
        let conn = state.db.get()?;
        queries::get_user_by_email(&conn, &input.email)?
    };

    let Some(user) = user else {
        return Err(AppError::Unauthorized);
    };

    let hash = user.password_hash.clone();
    let password = input.password;
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?;
    if !valid {
        tracing::debug!(user_id = %user.id, "Login with wrong password");
        return Err(AppError::Unauthorized);
    }

    let token = state.session_keys.issue(&user)?;
    Ok(Json(LoginResponse { token, user }))
}
