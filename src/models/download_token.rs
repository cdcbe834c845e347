use serde::{Deserialize, Serialize};

/// One-time credential that lets a buyer fetch a purchased app file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadToken {
    pub token: String,
    pub checkout_id: String,
    pub app_id: String,
    pub user_id: String,
    pub filename: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub used_at: Option<i64>,
}
