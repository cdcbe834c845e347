//! Row mapping trait and helpers for reducing boilerplate in queries.
//!
//! Models implement `FromRow` against the column order of their `*_COLS`
//! constant, then `query_one` / `query_all` do the rest.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to rusqlite errors.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Parse a JSON array column; corrupt data surfaces as a conversion error.
fn parse_json_list(row: &Row, col: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(col)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const USER_COLS: &str = "id, name, email, password_hash, role, created_at, total_revenue_cents, admin_share_cents, developer_share_cents";

pub const APP_COLS: &str = "id, title, description, price_cents, platform, filename, original_name, size, owner_email, approved, download_count, total_revenue_cents, admin_share_cents, developer_share_cents, screenshots, icon, created_at";

pub const CHECKOUT_COLS: &str =
    "id, app_id, user_id, amount_cents, status, provider, provider_status, created_at, updated_at";

pub const DOWNLOAD_TOKEN_COLS: &str =
    "token, checkout_id, app_id, user_id, filename, created_at, expires_at, used_at";

// ============ FromRow Implementations ============

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            role: parse_enum(row, 4, "role")?,
            created_at: row.get(5)?,
            total_revenue_cents: row.get(6)?,
            admin_share_cents: row.get(7)?,
            developer_share_cents: row.get(8)?,
        })
    }
}

impl FromRow for App {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(App {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            price_cents: row.get(3)?,
            platform: row.get(4)?,
            filename: row.get(5)?,
            original_name: row.get(6)?,
            size: row.get(7)?,
            owner_email: row.get(8)?,
            approved: row.get::<_, i32>(9)? != 0,
            download_count: row.get(10)?,
            total_revenue_cents: row.get(11)?,
            admin_share_cents: row.get(12)?,
            developer_share_cents: row.get(13)?,
            screenshots: parse_json_list(row, 14)?,
            icon: row.get(15)?,
            created_at: row.get(16)?,
        })
    }
}

impl FromRow for Checkout {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Checkout {
            id: row.get(0)?,
            app_id: row.get(1)?,
            user_id: row.get(2)?,
            amount_cents: row.get(3)?,
            status: parse_enum(row, 4, "status")?,
            provider: row.get(5)?,
            provider_status: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl FromRow for DownloadToken {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(DownloadToken {
            token: row.get(0)?,
            checkout_id: row.get(1)?,
            app_id: row.get(2)?,
            user_id: row.get(3)?,
            filename: row.get(4)?,
            created_at: row.get(5)?,
            expires_at: row.get(6)?,
            used_at: row.get(7)?,
        })
    }
}

impl FromRow for DeveloperRevenue {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(DeveloperRevenue {
            email: row.get(0)?,
            name: row.get(1)?,
            app_count: row.get(2)?,
            download_count: row.get(3)?,
            total_revenue_cents: row.get(4)?,
            admin_share_cents: row.get(5)?,
            developer_share_cents: row.get(6)?,
        })
    }
}
