use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_db_error, resolve_target, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct TargetItem {
    pub(super) target_id: Uuid,
    pub(super) handle: String,
    pub(super) display_name: Option<String>,
    /// Populated on detail fetches; omitted from list responses where one
    /// count query per row would be wasteful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) active_follower_count: Option<i64>,
    pub(super) created_at: DateTime<Utc>,
}

impl TargetItem {
    fn from_row(row: churnwatch_db::TrackedTargetRow, active_follower_count: Option<i64>) -> Self {
        Self {
            target_id: row.public_id,
            handle: row.handle,
            display_name: row.display_name,
            active_follower_count,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateTargetBody {
    pub handle: String,
    pub display_name: Option<String>,
}

pub(super) async fn list_targets(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<TargetItem>>>, ApiError> {
    let rows = churnwatch_db::list_targets(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| TargetItem::from_row(row, None))
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_target(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(handle): Path<String>,
) -> Result<Json<ApiResponse<TargetItem>>, ApiError> {
    let target = resolve_target(&state.pool, &req_id.0, &handle).await?;
    let active = churnwatch_db::count_active_followers(&state.pool, target.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: TargetItem::from_row(target, Some(active)),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn create_target(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateTargetBody>,
) -> Result<Json<ApiResponse<TargetItem>>, ApiError> {
    // The same normalization the ingest path applies; a handle that cannot
    // become a storage key cannot be tracked.
    let handle = churnwatch_extract::normalize_identity(&body.handle)
        .map_err(|e| ApiError::new(req_id.0.clone(), "validation_error", e.to_string()))?;

    let row = match churnwatch_db::create_target(
        &state.pool,
        &handle,
        body.display_name.as_deref(),
        None,
    )
    .await
    {
        Ok(row) => row,
        Err(churnwatch_db::DbError::Sqlx(sqlx::Error::Database(db_err)))
            if db_err.is_unique_violation() =>
        {
            return Err(ApiError::new(
                req_id.0,
                "conflict",
                format!("target '{handle}' is already tracked"),
            ));
        }
        Err(e) => return Err(map_db_error(req_id.0, &e)),
    };

    tracing::info!(handle = %row.handle, "tracked target created");

    Ok(Json(ApiResponse {
        data: TargetItem::from_row(row, Some(0)),
        meta: ResponseMeta::new(req_id.0),
    }))
}
