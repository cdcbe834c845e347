use axum::extract::State;

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::Json;
use crate::models::App;

/// GET /api/apps - approved apps, newest first
pub async fn list_apps(State(state): State<AppState>) -> Result<Json<Vec<App>>> {
    let conn = state.db.get()?;
    let apps = queries::list_approved_apps(&conn)?;
    Ok(Json(apps))
}
