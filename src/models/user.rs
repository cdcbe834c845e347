use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::{AppError, Result, msg};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Basic email format validation.
///
/// Requires exactly one @, a non-empty local part without spaces, and a
/// domain containing a dot that neither starts nor ends with one. Not meant
/// to be RFC 5322 compliant.
pub fn validate_email_format(email: &str) -> Result<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(AppError::BadRequest(msg::EMAIL_EMPTY.into()));
    }

    let Some((local_part, domain_part)) = email.split_once('@') else {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    };

    if local_part.is_empty()
        || local_part.contains(' ')
        || domain_part.contains('@')
        || !domain_part.contains('.')
        || domain_part.starts_with('.')
        || domain_part.ends_with('.')
    {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

/// Marketplace account. Developers and buyers share this table; the
/// cumulative revenue fields only move for users who own apps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: UserRole,
    pub created_at: i64,
    pub total_revenue_cents: i64,
    pub admin_share_cents: i64,
    pub developer_share_cents: i64,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl CreateUser {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest(msg::NAME_EMPTY.into()));
        }
        validate_email_format(&self.email)?;
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::BadRequest(msg::PASSWORD_TOO_SHORT.into()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}
