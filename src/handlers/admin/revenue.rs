use axum::extract::State;
use serde::Serialize;

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::Json;
use crate::models::{DeveloperRevenue, RevenueTotals};

#[derive(Debug, Serialize)]
pub struct RevenueReport {
    pub totals: RevenueTotals,
    pub developers: Vec<DeveloperRevenue>,
}

/// GET /api/revenue - platform totals and per-developer breakdown
pub async fn revenue_report(State(state): State<AppState>) -> Result<Json<RevenueReport>> {
    let conn = state.db.get()?;
    Ok(Json(RevenueReport {
        totals: queries::revenue_totals(&conn)?,
        developers: queries::revenue_by_developer(&conn)?,
    }))
}
