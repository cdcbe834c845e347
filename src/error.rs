use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Shared user-facing error messages.
pub mod msg {
    pub const APP_NOT_FOUND: &str = "App not found";
    pub const USER_NOT_FOUND: &str = "User not found";
    pub const CHECKOUT_NOT_FOUND: &str = "Checkout not found";
    pub const DOWNLOAD_NOT_FOUND: &str = "Download link not found or expired";

    pub const NOT_PURCHASABLE: &str = "App is free and not purchasable";
    pub const INVALID_PRICE: &str = "Invalid price: must be greater than 0 and at most 10000";
    pub const TITLE_EMPTY: &str = "App title cannot be empty";
    pub const TITLE_TOO_LONG: &str = "App title must be at most 100 characters";
    pub const PAYMENT_NOT_CONFIGURED: &str = "Payment provider is not configured";
    pub const INVALID_PROVIDER_RESPONSE: &str = "Invalid provider response";
    pub const PROVIDER_UNREACHABLE: &str = "Payment provider unavailable";

    pub const INVALID_PAYLOAD: &str = "Invalid payload";
    pub const NOT_CHECKOUT_BUYER: &str = "Checkout belongs to another user";
    pub const PIX_NOT_FOUND: &str = "PIX artifacts not found";
    pub const PIX_NOT_SUPPORTED: &str = "PIX is not offered by the configured payment provider";

    pub const EMAIL_EMPTY: &str = "Email cannot be empty";
    pub const INVALID_EMAIL_FORMAT: &str = "Invalid email format";
    pub const NAME_EMPTY: &str = "Name cannot be empty";
    pub const PASSWORD_TOO_SHORT: &str = "Password must be at least 6 characters";
    pub const EMAIL_TAKEN: &str = "Email already registered";
    pub const ADMIN_REQUIRED: &str = "Admin access required";
    pub const LAST_ADMIN: &str = "Cannot delete the last admin";

    pub const FILE_REQUIRED: &str = "App file is required";
    pub const SCREENSHOTS_REQUIRED: &str = "At least 3 screenshots are required";
    pub const INVALID_UPLOAD_PRICE: &str = "Price must be 0 for free apps, or between 0.01 and 10000";
    pub const PAID_APP_TRACKING: &str = "Paid apps are downloaded through checkout";
    pub const INVALID_DOWNLOAD_TOKEN: &str = "Invalid download token";
    pub const INVALID_FILENAME: &str = "Invalid filename";
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The payment provider refused the request; carries its messages verbatim.
    #[error("Provider rejected request: {0}")]
    ProviderRejected(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl From<StatusCode> for AppError {
    fn from(code: StatusCode) -> Self {
        match code {
            StatusCode::UNAUTHORIZED => AppError::Unauthorized,
            StatusCode::FORBIDDEN => AppError::Forbidden("Access denied".into()),
            StatusCode::NOT_FOUND => AppError::NotFound("Resource not found".into()),
            _ => AppError::Internal(format!("Status: {}", code)),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("Blocking task failed: {}", e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone())),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "Forbidden", Some(msg.clone())),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", Some(msg.clone())),
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable", Some(msg.clone()))
            }
            AppError::ProviderRejected(msg) => {
                (StatusCode::BAD_REQUEST, "Payment provider error", Some(msg.clone()))
            }
            AppError::ProviderUnavailable(msg) => {
                tracing::error!("Provider unavailable: {}", msg);
                (StatusCode::BAD_GATEWAY, "Payment provider error", Some(msg.clone()))
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (StatusCode::BAD_REQUEST, "Invalid JSON", Some(e.to_string()))
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Turns a missing row into a 404 with the given message.
pub trait OptionExt<T> {
    fn or_not_found(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(msg.to_string()))
    }
}
