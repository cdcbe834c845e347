mod from_row;
mod schema;
pub mod queries;

pub use schema::init_db;

use std::path::PathBuf;
use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::email::EmailService;
use crate::jwt::SessionKeys;
use crate::payments::PaymentGateway;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Public base URL for webhooks, redirects and download links (no trailing slash)
    pub site_url: String,
    pub session_keys: SessionKeys,
    pub payments: Arc<PaymentGateway>,
    pub email_service: Arc<EmailService>,
    /// Where uploaded app files, screenshots and icons live
    pub upload_dir: PathBuf,
    pub free_download_ad_cents: i64,
    pub download_token_ttl_secs: i64,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;"));
    Pool::builder().max_size(10).build(manager)
}
