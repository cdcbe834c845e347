//! Revenue ledger: the 30/70 platform/developer split and the counters it moves.
//!
//! Every mutation is a single `col = col + ?` statement, so concurrent sales
//! never lose an update. Paid sales only reach this module after the checkout
//! claim succeeded, which is what makes them apply exactly once.

use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::error::Result;
use crate::models::App;

/// Platform share, in percent.
pub const ADMIN_SHARE_PERCENT: i64 = 30;

/// One sale divided between platform and developer, in cents.
///
/// The admin share is rounded half-up and the developer gets the remainder,
/// so `admin_cents + developer_cents == amount_cents` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RevenueSplit {
    pub amount_cents: i64,
    pub admin_cents: i64,
    pub developer_cents: i64,
}

impl RevenueSplit {
    pub fn of(amount_cents: i64) -> Self {
        let admin_cents = (amount_cents * ADMIN_SHARE_PERCENT + 50).div_euclid(100);
        Self {
            amount_cents,
            admin_cents,
            developer_cents: amount_cents - admin_cents,
        }
    }
}

/// Credit a confirmed sale to the app and its developer.
///
/// Runs on whatever connection or transaction the caller holds; the
/// reconciler passes the transaction that also claimed the checkout.
pub fn apply_sale(conn: &Connection, app: &App, amount_cents: i64) -> Result<RevenueSplit> {
    let split = RevenueSplit::of(amount_cents);

    queries::add_app_revenue(conn, &app.id, &split)?;
    if !queries::add_user_revenue(conn, &app.owner_email, &split)? {
        tracing::warn!(
            app_id = %app.id,
            owner = %app.owner_email,
            "No developer account for app owner, user counters not updated"
        );
    }

    Ok(split)
}

/// Credit one free download at the nominal ad-impression amount. No checkout involved.
pub fn record_free_download(conn: &Connection, app: &App, ad_amount_cents: i64) -> Result<RevenueSplit> {
    let split = apply_sale(conn, app, ad_amount_cents)?;
    tracing::debug!(
        app_id = %app.id,
        amount_cents = split.amount_cents,
        "Free download recorded"
    );
    Ok(split)
}
