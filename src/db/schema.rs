use rusqlite::Connection;

/// Create every table and index if missing. Safe to run on each startup.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    // WAL keeps webhook writes from blocking concurrent readers
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;

        -- Accounts. Revenue columns are cumulative cents, only moved by the ledger.
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
            created_at INTEGER NOT NULL,
            total_revenue_cents INTEGER NOT NULL DEFAULT 0,
            admin_share_cents INTEGER NOT NULL DEFAULT 0,
            developer_share_cents INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);

        -- Apps are owned by email so a re-registered developer keeps the link
        CREATE TABLE IF NOT EXISTS apps (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            price_cents INTEGER NOT NULL DEFAULT 0 CHECK (price_cents >= 0),
            platform TEXT NOT NULL,
            filename TEXT NOT NULL,
            original_name TEXT NOT NULL,
            size INTEGER NOT NULL,
            owner_email TEXT NOT NULL,
            approved INTEGER NOT NULL DEFAULT 0,
            download_count INTEGER NOT NULL DEFAULT 0,
            total_revenue_cents INTEGER NOT NULL DEFAULT 0,
            admin_share_cents INTEGER NOT NULL DEFAULT 0,
            developer_share_cents INTEGER NOT NULL DEFAULT 0,
            screenshots TEXT NOT NULL DEFAULT '[]',  -- JSON array of stored file names
            icon TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_apps_owner ON apps(owner_email);
        CREATE INDEX IF NOT EXISTS idx_apps_approved ON apps(approved, created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_apps_filename ON apps(filename);

        -- Checkouts keyed by the provider's id. No FK on app_id: rows outlive app deletion.
        CREATE TABLE IF NOT EXISTS checkouts (
            id TEXT PRIMARY KEY,
            app_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'authorized', 'paid', 'declined', 'canceled', 'expired')),
            provider TEXT NOT NULL,
            provider_status TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_checkouts_app ON checkouts(app_id);
        CREATE INDEX IF NOT EXISTS idx_checkouts_user ON checkouts(user_id);

        -- One-time download credentials issued after a confirmed payment
        CREATE TABLE IF NOT EXISTS download_tokens (
            token TEXT PRIMARY KEY,
            checkout_id TEXT NOT NULL REFERENCES checkouts(id),
            app_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            filename TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            used_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_download_tokens_checkout ON download_tokens(checkout_id);
        "#,
    )?;
    Ok(())
}
