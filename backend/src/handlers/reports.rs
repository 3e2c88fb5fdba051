//! HTTP handlers for snapshots and inventory alerts

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use shared::{AlertReport, DailySnapshot};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::store::InventoryStore;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    /// Defaults to today (UTC)
    pub date: Option<NaiveDate>,
}

/// Snapshot rows for one date
pub async fn get_daily_snapshot<S: InventoryStore>(
    State(state): State<AppState<S>>,
    current_user: CurrentUser,
    Query(query): Query<SnapshotQuery>,
) -> AppResult<Json<Vec<DailySnapshot>>> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let rows = state
        .reconciliation
        .snapshots_for_date(&current_user.0, date)
        .await?;
    Ok(Json(rows))
}

/// Alert report computed from current stock
pub async fn get_inventory_alerts<S: InventoryStore>(
    State(state): State<AppState<S>>,
    current_user: CurrentUser,
) -> AppResult<Json<AlertReport>> {
    let report = state.reconciliation.current_alerts(&current_user.0).await?;
    Ok(Json(report))
}

/// Report published by the most recent alert sweep
pub async fn get_latest_alerts<S: InventoryStore>(
    State(state): State<AppState<S>>,
    current_user: CurrentUser,
) -> AppResult<Json<Option<AlertReport>>> {
    let report = state.reconciliation.latest_alerts(&current_user.0)?;
    Ok(Json(report))
}
