use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, resolve_target, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct RunsQuery {
    pub limit: Option<i64>,
    /// Optional target handle to scope the listing.
    pub target: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct RunItem {
    pub(super) run_id: Uuid,
    pub(super) trigger_source: String,
    pub(super) status: String,
    pub(super) extracted_count: i32,
    pub(super) coverage_ratio: Option<f64>,
    pub(super) trusted: Option<bool>,
    /// `committed` when the diff landed, `skipped_low_coverage` when the
    /// coverage gate suppressed it — the field behind "detection disabled,
    /// scan was only N% complete" in the UI. `null` until the gate has run.
    pub(super) detection: Option<String>,
    pub(super) started_at: Option<DateTime<Utc>>,
    pub(super) completed_at: Option<DateTime<Utc>>,
    pub(super) error_message: Option<String>,
    pub(super) created_at: DateTime<Utc>,
}

impl RunItem {
    fn from_row(row: churnwatch_db::ScanRunRow) -> Self {
        let detection = row.trusted.map(|trusted| {
            if trusted {
                "committed".to_string()
            } else {
                "skipped_low_coverage".to_string()
            }
        });

        Self {
            run_id: row.public_id,
            trigger_source: row.trigger_source,
            status: row.status,
            extracted_count: row.extracted_count,
            coverage_ratio: row.coverage_ratio,
            trusted: row.trusted,
            detection,
            started_at: row.started_at,
            completed_at: row.completed_at,
            error_message: row.error_message,
            created_at: row.created_at,
        }
    }
}

pub(super) async fn list_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<ApiResponse<Vec<RunItem>>>, ApiError> {
    let target_id = match &query.target {
        Some(handle) => Some(resolve_target(&state.pool, &req_id.0, handle).await?.id),
        None => None,
    };

    let rows = churnwatch_db::list_scan_runs(&state.pool, target_id, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows.into_iter().map(RunItem::from_row).collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<ApiResponse<RunItem>>, ApiError> {
    let row = match churnwatch_db::get_scan_run_by_public_id(&state.pool, run_id).await {
        Ok(row) => row,
        Err(churnwatch_db::DbError::NotFound) => {
            return Err(ApiError::new(
                req_id.0,
                "not_found",
                format!("no scan run with id {run_id}"),
            ));
        }
        Err(e) => return Err(map_db_error(req_id.0, &e)),
    };

    Ok(Json(ApiResponse {
        data: RunItem::from_row(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}
