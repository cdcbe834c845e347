use std::sync::Arc;

use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use appmart::config::Config;
use appmart::crypto::hash_password;
use appmart::db::{AppState, create_pool, init_db, queries};
use appmart::email::EmailService;
use appmart::handlers;
use appmart::jwt::SessionKeys;
use appmart::models::{CreateUser, UserRole};
use appmart::payments::PaymentGateway;

#[derive(Parser, Debug)]
#[command(name = "appmart")]
#[command(about = "App marketplace server")]
struct Cli {
    /// Create (or promote) an admin account and exit. Password comes from ADMIN_PASSWORD.
    #[arg(long)]
    create_admin: bool,

    /// Email for --create-admin
    #[arg(long, requires = "create_admin")]
    admin_email: Option<String>,

    /// Display name for --create-admin
    #[arg(long, default_value = "Admin")]
    admin_name: String,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Create the admin account, or promote and reset the password of an existing one.
fn bootstrap_admin(state: &AppState, email: &str, name: &str) -> Result<(), String> {
    let password = std::env::var("ADMIN_PASSWORD")
        .map_err(|_| "ADMIN_PASSWORD must be set for --create-admin".to_string())?;

    let input = CreateUser {
        name: name.to_string(),
        email: email.to_string(),
        password,
    };
    input.validate().map_err(|e| e.to_string())?;

    let password_hash = hash_password(&input.password).map_err(|e| e.to_string())?;
    let conn = state
        .db
        .get()
        .map_err(|e| format!("Failed to get database connection: {}", e))?;

    match queries::get_user_by_email(&conn, email).map_err(|e| e.to_string())? {
        Some(existing) => {
            queries::set_user_role(&conn, &existing.id, UserRole::Admin).map_err(|e| e.to_string())?;
            queries::set_user_password(&conn, &existing.id, &password_hash)
                .map_err(|e| e.to_string())?;
            tracing::info!(user_id = %existing.id, "Existing user promoted to admin");
        }
        None => {
            let user = queries::create_user(&conn, &input, &password_hash, UserRole::Admin)
                .map_err(|e| e.to_string())?;
            tracing::info!(user_id = %user.id, "Admin account created");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "appmart=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let payments = PaymentGateway::from_config(&config.payments).expect("Failed to set up payment gateway");
    if !payments.is_configured() {
        tracing::warn!(
            provider = payments.provider_name(),
            "Payment provider credentials missing; checkouts will be refused"
        );
    }

    let email_service = EmailService::new(config.smtp.as_ref(), &config.mail_from)
        .expect("Failed to set up email service");
    if !email_service.is_enabled() {
        tracing::info!("SMTP_HOST not set, notification emails are disabled");
    }

    let state = AppState {
        db: db_pool,
        site_url: config.site_url.clone(),
        session_keys: SessionKeys::new(&config.jwt_secret),
        payments: Arc::new(payments),
        email_service: Arc::new(email_service),
        upload_dir: config.upload_dir.clone().into(),
        free_download_ad_cents: config.free_download_ad_cents,
        download_token_ttl_secs: config.download_token_ttl_hours * 3600,
    };

    if cli.create_admin {
        let Some(email) = cli.admin_email.as_deref() else {
            eprintln!("--create-admin requires --admin-email");
            std::process::exit(1);
        };
        if let Err(e) = bootstrap_admin(&state, email, &cli.admin_name) {
            eprintln!("Failed to create admin: {}", e);
            std::process::exit(1);
        }
        return;
    }

    std::fs::create_dir_all(&state.upload_dir).expect("Failed to create upload directory");

    let app = handlers::router(state, config.max_upload_bytes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    if cli.ephemeral && !config.dev_mode {
        tracing::warn!("--ephemeral ignored: not in dev mode (set APPMART_ENV=dev)");
    }
    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!(
        provider = config.payments.provider.as_ref(),
        site_url = %config.site_url,
        "AppMart server listening on {}",
        addr
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    if cleanup_on_exit {
        let db_path = &config.database_path;
        if let Err(e) = std::fs::remove_file(db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
