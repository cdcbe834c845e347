use chrono::Utc;
use rusqlite::{Connection, ErrorCode, params};
use uuid::Uuid;

use crate::error::{AppError, Result, msg};
use crate::ledger::RevenueSplit;
use crate::models::*;

use super::from_row::{
    APP_COLS, CHECKOUT_COLS, DOWNLOAD_TOKEN_COLS, USER_COLS, query_all, query_one,
};

pub fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation
    )
}

// ============ Users ============

pub fn create_user(
    conn: &Connection,
    input: &CreateUser,
    password_hash: &str,
    role: UserRole,
) -> Result<User> {
    let id = gen_id();
    let now = now();
    let email = input.email.trim().to_lowercase();
    let name = input.name.trim().to_string();

    conn.execute(
        "INSERT INTO users (id, name, email, password_hash, role, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![&id, &name, &email, password_hash, role.as_ref(), now],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(msg::EMAIL_TAKEN.into())
        } else {
            e.into()
        }
    })?;

    Ok(User {
        id,
        name,
        email,
        password_hash: password_hash.to_string(),
        role,
        created_at: now,
        total_revenue_cents: 0,
        admin_share_cents: 0,
        developer_share_cents: 0,
    })
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let email = email.trim().to_lowercase();
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE email = ?1", USER_COLS),
        &[&email],
    )
}

pub fn list_users(conn: &Connection) -> Result<Vec<User>> {
    query_all(
        conn,
        &format!("SELECT {} FROM users ORDER BY created_at DESC, id", USER_COLS),
        &[],
    )
}

pub fn set_user_role(conn: &Connection, id: &str, role: UserRole) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE users SET role = ?1 WHERE id = ?2",
        params![role.as_ref(), id],
    )?;
    Ok(affected > 0)
}

pub fn set_user_password(conn: &Connection, id: &str, password_hash: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE id = ?2",
        params![password_hash, id],
    )?;
    Ok(affected > 0)
}

pub fn count_admins(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = 'admin'",
        [],
        |row| row.get(0),
    )
    .map_err(Into::into)
}

/// Delete a user unless it is the last admin.
///
/// The admin count check and the delete run as one statement so two
/// concurrent deletes cannot both remove "the other" admin.
pub fn delete_user(conn: &Connection, id: &str) -> Result<bool> {
    let user = get_user_by_id(conn, id)?.ok_or_else(|| AppError::NotFound(msg::USER_NOT_FOUND.into()))?;

    let affected = conn.execute(
        "DELETE FROM users WHERE id = ?1
           AND (role != 'admin' OR (SELECT COUNT(*) FROM users WHERE role = 'admin') > 1)",
        params![id],
    )?;

    if affected == 0 && user.is_admin() {
        return Err(AppError::BadRequest(msg::LAST_ADMIN.into()));
    }
    Ok(affected > 0)
}

/// Add a sale's deltas to a developer's cumulative counters.
///
/// Returns false when no account owns the email (apps survive their owner).
pub fn add_user_revenue(conn: &Connection, email: &str, split: &RevenueSplit) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE users SET
            total_revenue_cents = total_revenue_cents + ?1,
            admin_share_cents = admin_share_cents + ?2,
            developer_share_cents = developer_share_cents + ?3
         WHERE email = ?4",
        params![split.amount_cents, split.admin_cents, split.developer_cents, email],
    )?;
    Ok(affected > 0)
}

// ============ Apps ============

pub fn create_app(conn: &Connection, input: &CreateApp) -> Result<App> {
    let id = gen_id();
    let now = now();
    let screenshots = serde_json::to_string(&input.screenshots)?;
    let owner_email = input.owner_email.trim().to_lowercase();

    conn.execute(
        "INSERT INTO apps (id, title, description, price_cents, platform, filename, original_name,
                           size, owner_email, approved, screenshots, icon, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10, ?11, ?12)",
        params![
            &id,
            &input.title,
            &input.description,
            input.price_cents,
            &input.platform,
            &input.filename,
            &input.original_name,
            input.size,
            &owner_email,
            &screenshots,
            &input.icon,
            now,
        ],
    )?;

    Ok(App {
        id,
        title: input.title.clone(),
        description: input.description.clone(),
        price_cents: input.price_cents,
        platform: input.platform.clone(),
        filename: input.filename.clone(),
        original_name: input.original_name.clone(),
        size: input.size,
        owner_email,
        approved: false,
        download_count: 0,
        total_revenue_cents: 0,
        admin_share_cents: 0,
        developer_share_cents: 0,
        screenshots: input.screenshots.clone(),
        icon: input.icon.clone(),
        created_at: now,
    })
}

pub fn get_app_by_id(conn: &Connection, id: &str) -> Result<Option<App>> {
    query_one(
        conn,
        &format!("SELECT {} FROM apps WHERE id = ?1", APP_COLS),
        &[&id],
    )
}

pub fn list_approved_apps(conn: &Connection) -> Result<Vec<App>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM apps WHERE approved = 1 ORDER BY created_at DESC, id",
            APP_COLS
        ),
        &[],
    )
}

pub fn list_pending_apps(conn: &Connection) -> Result<Vec<App>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM apps WHERE approved = 0 ORDER BY created_at ASC, id",
            APP_COLS
        ),
        &[],
    )
}

pub fn list_apps_by_owner(conn: &Connection, owner_email: &str) -> Result<Vec<App>> {
    let owner_email = owner_email.trim().to_lowercase();
    query_all(
        conn,
        &format!(
            "SELECT {} FROM apps WHERE owner_email = ?1 ORDER BY created_at DESC, id",
            APP_COLS
        ),
        &[&owner_email],
    )
}

/// Free, approved app serving the given stored file, if any.
pub fn get_free_app_by_filename(conn: &Connection, filename: &str) -> Result<Option<App>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM apps WHERE filename = ?1 AND price_cents = 0 AND approved = 1",
            APP_COLS
        ),
        &[&filename],
    )
}

pub fn approve_app(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute("UPDATE apps SET approved = 1 WHERE id = ?1", params![id])?;
    Ok(affected > 0)
}

pub fn delete_app(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute("DELETE FROM apps WHERE id = ?1", params![id])?;
    Ok(affected > 0)
}

/// Add one download and a sale's deltas to an app's counters in a single statement.
pub fn add_app_revenue(conn: &Connection, app_id: &str, split: &RevenueSplit) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE apps SET
            download_count = download_count + 1,
            total_revenue_cents = total_revenue_cents + ?1,
            admin_share_cents = admin_share_cents + ?2,
            developer_share_cents = developer_share_cents + ?3
         WHERE id = ?4",
        params![split.amount_cents, split.admin_cents, split.developer_cents, app_id],
    )?;
    Ok(affected > 0)
}

pub fn revenue_totals(conn: &Connection) -> Result<RevenueTotals> {
    conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(download_count), 0),
                COALESCE(SUM(total_revenue_cents), 0),
                COALESCE(SUM(admin_share_cents), 0),
                COALESCE(SUM(developer_share_cents), 0)
         FROM apps",
        [],
        |row| {
            Ok(RevenueTotals {
                app_count: row.get(0)?,
                download_count: row.get(1)?,
                total_revenue_cents: row.get(2)?,
                admin_share_cents: row.get(3)?,
                developer_share_cents: row.get(4)?,
            })
        },
    )
    .map_err(Into::into)
}

pub fn revenue_by_developer(conn: &Connection) -> Result<Vec<DeveloperRevenue>> {
    query_all(
        conn,
        "SELECT a.owner_email, u.name, COUNT(*),
                SUM(a.download_count), SUM(a.total_revenue_cents),
                SUM(a.admin_share_cents), SUM(a.developer_share_cents)
         FROM apps a
         LEFT JOIN users u ON u.email = a.owner_email
         GROUP BY a.owner_email
         ORDER BY SUM(a.total_revenue_cents) DESC, a.owner_email",
        &[],
    )
}

// ============ Checkouts ============

pub fn create_checkout(conn: &Connection, input: &CreateCheckout) -> Result<Checkout> {
    let now = now();

    conn.execute(
        "INSERT INTO checkouts (id, app_id, user_id, amount_cents, status, provider, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6, ?6)",
        params![
            &input.id,
            &input.app_id,
            &input.user_id,
            input.amount_cents,
            &input.provider,
            now,
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!("Checkout {} already exists", input.id))
        } else {
            e.into()
        }
    })?;

    Ok(Checkout {
        id: input.id.clone(),
        app_id: input.app_id.clone(),
        user_id: input.user_id.clone(),
        amount_cents: input.amount_cents,
        status: CheckoutStatus::Pending,
        provider: input.provider.clone(),
        provider_status: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_checkout(conn: &Connection, id: &str) -> Result<Option<Checkout>> {
    query_one(
        conn,
        &format!("SELECT {} FROM checkouts WHERE id = ?1", CHECKOUT_COLS),
        &[&id],
    )
}

/// Atomically move an open checkout to paid.
///
/// Returns true only for the one caller whose update won; the ledger runs
/// behind that result.
pub fn try_claim_checkout(conn: &Connection, id: &str, provider_status: Option<&str>) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE checkouts SET status = 'paid', provider_status = COALESCE(?2, provider_status), updated_at = ?3
         WHERE id = ?1 AND status IN ('pending', 'authorized')",
        params![id, provider_status, now()],
    )?;
    Ok(affected > 0)
}

/// Forward-only status change for anything other than paid.
///
/// Terminal rows are never touched, and a report that repeats the stored
/// status and raw value is not a change. Returns whether a row changed.
pub fn advance_checkout_status(
    conn: &Connection,
    id: &str,
    status: CheckoutStatus,
    provider_status: Option<&str>,
) -> Result<bool> {
    if status == CheckoutStatus::Paid {
        return try_claim_checkout(conn, id, provider_status);
    }
    let affected = conn.execute(
        "UPDATE checkouts SET status = ?2, provider_status = COALESCE(?3, provider_status), updated_at = ?4
         WHERE id = ?1 AND status IN ('pending', 'authorized')
           AND NOT (status = 'authorized' AND ?2 = 'pending')
           AND (status != ?2 OR provider_status IS NOT COALESCE(?3, provider_status))",
        params![id, status.as_ref(), provider_status, now()],
    )?;
    Ok(affected > 0)
}

// ============ Download tokens ============

pub fn create_download_token(
    conn: &Connection,
    checkout: &Checkout,
    filename: &str,
    ttl_secs: i64,
) -> Result<DownloadToken> {
    let token = gen_id();
    let now = now();
    let expires_at = now + ttl_secs;

    conn.execute(
        "INSERT INTO download_tokens (token, checkout_id, app_id, user_id, filename, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            &token,
            &checkout.id,
            &checkout.app_id,
            &checkout.user_id,
            filename,
            now,
            expires_at,
        ],
    )?;

    Ok(DownloadToken {
        token,
        checkout_id: checkout.id.clone(),
        app_id: checkout.app_id.clone(),
        user_id: checkout.user_id.clone(),
        filename: filename.to_string(),
        created_at: now,
        expires_at,
        used_at: None,
    })
}

pub fn get_download_token(conn: &Connection, token: &str) -> Result<Option<DownloadToken>> {
    query_one(
        conn,
        &format!("SELECT {} FROM download_tokens WHERE token = ?1", DOWNLOAD_TOKEN_COLS),
        &[&token],
    )
}

/// The unredeemed, unexpired token issued for a checkout, if any.
pub fn get_active_download_token_for_checkout(
    conn: &Connection,
    checkout_id: &str,
) -> Result<Option<DownloadToken>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM download_tokens
             WHERE checkout_id = ?1 AND used_at IS NULL AND expires_at > ?2
             ORDER BY created_at DESC LIMIT 1",
            DOWNLOAD_TOKEN_COLS
        ),
        &[&checkout_id, &now()],
    )
}

/// Redeem a token for its bound filename. None if unknown, used, expired or
/// bound to a different file.
pub fn try_claim_download_token(
    conn: &Connection,
    token: &str,
    filename: &str,
) -> Result<Option<DownloadToken>> {
    let now = now();

    let affected = conn.execute(
        "UPDATE download_tokens SET used_at = ?3
         WHERE token = ?1 AND filename = ?2 AND used_at IS NULL AND expires_at > ?3",
        params![token, filename, now],
    )?;

    if affected == 0 {
        return Ok(None);
    }

    get_download_token(conn, token)
}
