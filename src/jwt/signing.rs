use jwt_simple::prelude::*;

use crate::error::{AppError, Result};
use crate::models::User;

use super::SessionClaims;

const ISSUER: &str = "appmart";
const SESSION_DAYS: u64 = 7;

/// HS256 key used to issue and verify session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    key: HS256Key,
}

impl SessionKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            key: HS256Key::from_bytes(secret.as_bytes()),
        }
    }

    /// Issue a session token for a user, valid for seven days.
    pub fn issue(&self, user: &User) -> Result<String> {
        let claims = Claims::with_custom_claims(
            SessionClaims::from(user),
            Duration::from_days(SESSION_DAYS),
        )
        .with_issuer(ISSUER)
        .with_subject(&user.id);

        self.key
            .authenticate(claims)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Verify a session token. Any failure is reported as unauthorized.
    pub fn verify(&self, token: &str) -> Result<JWTClaims<SessionClaims>> {
        let options = VerificationOptions {
            allowed_issuers: Some(HashSet::from_strings(&[ISSUER])),
            ..Default::default()
        };

        self.key
            .verify_token::<SessionClaims>(token, Some(options))
            .map_err(|e| {
                tracing::debug!("Session token rejected: {}", e);
                AppError::Unauthorized
            })
    }
}
