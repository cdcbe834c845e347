use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result, msg};

/// Screenshots an upload must carry.
pub const MIN_SCREENSHOTS: usize = 3;

/// Published application. Prices and revenue are integer cents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct App {
    pub id: String,
    pub title: String,
    pub description: String,
    /// 0 = free
    pub price_cents: i64,
    pub platform: String,
    /// Stored file name under the upload directory
    pub filename: String,
    pub original_name: String,
    pub size: i64,
    pub owner_email: String,
    pub approved: bool,
    pub download_count: i64,
    pub total_revenue_cents: i64,
    pub admin_share_cents: i64,
    pub developer_share_cents: i64,
    /// Ordered stored file names
    pub screenshots: Vec<String>,
    pub icon: Option<String>,
    pub created_at: i64,
}

impl App {
    pub fn is_free(&self) -> bool {
        self.price_cents == 0
    }
}

#[derive(Debug, Clone)]
pub struct CreateApp {
    pub title: String,
    pub description: String,
    pub price_cents: i64,
    pub platform: String,
    pub filename: String,
    pub original_name: String,
    pub size: i64,
    pub owner_email: String,
    pub screenshots: Vec<String>,
    pub icon: Option<String>,
}

impl CreateApp {
    pub fn validate(&self) -> Result<()> {
        if self.filename.is_empty() {
            return Err(AppError::BadRequest(msg::FILE_REQUIRED.into()));
        }
        if self.screenshots.len() < MIN_SCREENSHOTS {
            return Err(AppError::BadRequest(msg::SCREENSHOTS_REQUIRED.into()));
        }
        if self.price_cents < 0 {
            return Err(AppError::BadRequest(msg::INVALID_UPLOAD_PRICE.into()));
        }
        Ok(())
    }
}

/// Revenue aggregated per developer for the admin report.
#[derive(Debug, Clone, Serialize)]
pub struct DeveloperRevenue {
    pub email: String,
    /// None when the owning account has been deleted
    pub name: Option<String>,
    pub app_count: i64,
    pub download_count: i64,
    pub total_revenue_cents: i64,
    pub admin_share_cents: i64,
    pub developer_share_cents: i64,
}

/// Platform-wide sums across every app.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RevenueTotals {
    pub app_count: i64,
    pub download_count: i64,
    pub total_revenue_cents: i64,
    pub admin_share_cents: i64,
    pub developer_share_cents: i64,
}

/// Ceiling on an app price, in cents (10000.00).
pub const MAX_PRICE_CENTS: i64 = 1_000_000;

/// Parse a decimal price ("19.90", "5", "") into cents.
///
/// An empty value or zero means free. A positive price must come to at least
/// one cent and at most `MAX_PRICE_CENTS`, so a paid app never rounds to free.
pub fn parse_price_cents(raw: &str) -> Result<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }
    let invalid = || AppError::BadRequest(msg::INVALID_UPLOAD_PRICE.into());
    let price: f64 = raw.parse().map_err(|_| invalid())?;
    if !price.is_finite() || price < 0.0 {
        return Err(invalid());
    }

    let cents = (price * 100.0).round();
    if cents > MAX_PRICE_CENTS as f64 || (price > 0.0 && cents < 1.0) {
        return Err(invalid());
    }
    Ok(cents as i64)
}
