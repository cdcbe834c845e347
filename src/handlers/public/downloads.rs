use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use tokio_util::io::ReaderStream;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result, msg};
use crate::extractors::Path;
use crate::handlers::upload_path;
use crate::util::is_valid_download_token;

/// Path segment that marks a free download instead of a purchase token.
pub const FREE_TOKEN: &str = "free";

/// GET /download/{token}/{filename}
///
/// Purchase tokens are single use: the file is opened first, then the token is
/// claimed and the file streamed. A second request gets 404.
pub async fn download_file(
    State(state): State<AppState>,
    Path((token, filename)): Path<(String, String)>,
) -> Result<Response> {
    if token != FREE_TOKEN && !is_valid_download_token(&token) {
        return Err(AppError::BadRequest(msg::INVALID_DOWNLOAD_TOKEN.into()));
    }
    let path = upload_path(&state.upload_dir, &filename)?;

    // Open the file before burning a token on a missing upload
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) => {
            tracing::error!(filename = %filename, "App file missing from upload directory: {}", e);
            return Err(AppError::NotFound(msg::DOWNLOAD_NOT_FOUND.into()));
        }
    };
    let length = file
        .metadata()
        .await
        .map_err(|e| AppError::Internal(format!("Failed to stat app file: {}", e)))?
        .len();

    {
        let conn = state.db.get()?;
        if token == FREE_TOKEN {
            if queries::get_free_app_by_filename(&conn, &filename)?.is_none() {
                return Err(AppError::NotFound(msg::DOWNLOAD_NOT_FOUND.into()));
            }
        } else {
            let claimed = queries::try_claim_download_token(&conn, &token, &filename)?
                .ok_or_else(|| AppError::NotFound(msg::DOWNLOAD_NOT_FOUND.into()))?;
            tracing::info!(
                checkout_id = %claimed.checkout_id,
                user_id = %claimed.user_id,
                "Download token redeemed"
            );
        }
    }

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_LENGTH, length.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}
