use serde::{Deserialize, Serialize};

use crate::models::{User, UserRole};

/// Custom claims carried by a session token.
/// Standard claims (iss, sub, iat, exp) are handled by jwt-simple; `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

impl From<&User> for SessionClaims {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}
