use std::path::Path as FsPath;

use axum::{
    body::Bytes,
    extract::{Extension, Multipart, State, multipart::MultipartError},
    http::StatusCode,
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::extractors::Json;
use crate::handlers::upload_path;
use crate::middleware::AuthUser;
use crate::models::{App, CreateApp, MIN_SCREENSHOTS, RevenueTotals, parse_price_cents};

const DEFAULT_TITLE: &str = "Untitled";
const DEFAULT_PLATFORM: &str = "android";

struct UploadedFile {
    original_name: String,
    bytes: Bytes,
}

#[derive(Debug, Serialize)]
pub struct AccountRevenue {
    pub total_revenue_cents: i64,
    pub admin_share_cents: i64,
    pub developer_share_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct MyRevenueResponse {
    pub apps: Vec<App>,
    /// Sums over `apps`
    pub totals: RevenueTotals,
    /// The account's own cumulative counters
    pub account: AccountRevenue,
}

fn bad_multipart(e: MultipartError) -> AppError {
    AppError::BadRequest(format!("Invalid multipart body: {}", e.body_text()))
}

/// Generated storage name keeping a short alphanumeric extension.
fn stored_name(original: &str) -> String {
    let ext = FsPath::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 10 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    format!("{}-{}{}", Utc::now().timestamp_millis(), Uuid::new_v4().simple(), ext)
}

async fn store(state: &AppState, file: &UploadedFile) -> Result<String> {
    let name = stored_name(&file.original_name);
    let path = upload_path(&state.upload_dir, &name)?;
    tokio::fs::write(&path, &file.bytes).await.map_err(|e| {
        AppError::Internal(format!("Failed to store upload {}: {}", path.display(), e))
    })?;
    Ok(name)
}

async fn remove_stored(state: &AppState, names: &[String]) {
    for name in names {
        if let Err(e) = tokio::fs::remove_file(state.upload_dir.join(name)).await {
            tracing::warn!(file = %name, "Failed to remove stored upload: {}", e);
        }
    }
}

/// POST /api/upload - multipart app upload, created unapproved
///
/// Fields: `title`, `description`, `price`, `platform`; files `file`,
/// `screenshots` (repeated, at least three) and optional `icon`.
pub async fn upload_app(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<App>)> {
    let mut title = None;
    let mut description = String::new();
    let mut price_raw = String::new();
    let mut platform = None;
    let mut app_file: Option<UploadedFile> = None;
    let mut screenshots: Vec<UploadedFile> = Vec::new();
    let mut icon: Option<UploadedFile> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" | "screenshots" | "icon" => {
                let original_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                if bytes.is_empty() {
                    continue;
                }
                let upload = UploadedFile { original_name, bytes };
                match name.as_str() {
                    "file" => app_file = Some(upload),
                    "screenshots" => screenshots.push(upload),
                    _ => icon = Some(upload),
                }
            }
            "title" => title = Some(field.text().await.map_err(bad_multipart)?),
            "description" => description = field.text().await.map_err(bad_multipart)?,
            "price" => price_raw = field.text().await.map_err(bad_multipart)?,
            "platform" => platform = Some(field.text().await.map_err(bad_multipart)?),
            other => tracing::debug!(field = %other, "Ignoring unknown upload field"),
        }
    }

    let price_cents = parse_price_cents(&price_raw)?;
    let app_file = app_file.ok_or_else(|| AppError::BadRequest(msg::FILE_REQUIRED.into()))?;
    if screenshots.len() < MIN_SCREENSHOTS {
        return Err(AppError::BadRequest(msg::SCREENSHOTS_REQUIRED.into()));
    }

    tokio::fs::create_dir_all(&state.upload_dir)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create upload directory: {}", e)))?;

    let mut stored = Vec::with_capacity(screenshots.len() + 2);
    let result: Result<App> = async {
        let filename = store(&state, &app_file).await?;
        stored.push(filename.clone());

        let mut screenshot_names = Vec::with_capacity(screenshots.len());
        for shot in &screenshots {
            let name = store(&state, shot).await?;
            stored.push(name.clone());
            screenshot_names.push(name);
        }

        let icon_name = match &icon {
            Some(file) => {
                let name = store(&state, file).await?;
                stored.push(name.clone());
                Some(name)
            }
            None => None,
        };

        let input = CreateApp {
            title: title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            description: description.trim().to_string(),
            price_cents,
            platform: platform
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| DEFAULT_PLATFORM.to_string()),
            filename,
            original_name: app_file.original_name.clone(),
            size: app_file.bytes.len() as i64,
            owner_email: user.email.clone(),
            screenshots: screenshot_names,
            icon: icon_name,
        };
        input.validate()?;

        let conn = state.db.get()?;
        queries::create_app(&conn, &input)
    }
    .await;

    match result {
        Ok(app) => {
            tracing::info!(app_id = %app.id, owner = %app.owner_email, price_cents = app.price_cents, "App uploaded");
            Ok((StatusCode::CREATED, Json(app)))
        }
        Err(e) => {
            remove_stored(&state, &stored).await;
            Err(e)
        }
    }
}

/// GET /api/developer/apps
pub async fn my_apps(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<Json<Vec<App>>> {
    let conn = state.db.get()?;
    let apps = queries::list_apps_by_owner(&conn, &user.email)?;
    Ok(Json(apps))
}

/// GET /api/developer/revenue
pub async fn my_revenue(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Result<Json<MyRevenueResponse>> {
    let conn = state.db.get()?;
    let apps = queries::list_apps_by_owner(&conn, &user.email)?;

    let totals = apps.iter().fold(
        RevenueTotals {
            app_count: apps.len() as i64,
            ..Default::default()
        },
        |mut acc, app| {
            acc.download_count += app.download_count;
            acc.total_revenue_cents += app.total_revenue_cents;
            acc.admin_share_cents += app.admin_share_cents;
            acc.developer_share_cents += app.developer_share_cents;
            acc
        },
    );

    Ok(Json(MyRevenueResponse {
        apps,
        totals,
        account: AccountRevenue {
            total_revenue_cents: user.total_revenue_cents,
            admin_share_cents: user.admin_share_cents,
            developer_share_cents: user.developer_share_cents,
        },
    }))
}
