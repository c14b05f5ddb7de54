use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, resolve_target, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct UnfollowersQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct UnfollowerItem {
    pub(super) identity_key: String,
    pub(super) display_name: Option<String>,
    pub(super) verified: bool,
    pub(super) followers_count: i32,
    pub(super) following_count: i32,
    pub(super) first_seen_at: DateTime<Utc>,
    pub(super) unfollowed_at: Option<DateTime<Utc>>,
}

/// Current unfollowers for a target, most recent unfollow first.
pub(super) async fn list_unfollowers(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(handle): Path<String>,
    Query(query): Query<UnfollowersQuery>,
) -> Result<Json<ApiResponse<Vec<UnfollowerItem>>>, ApiError> {
    let target = resolve_target(&state.pool, &req_id.0, &handle).await?;

    let rows = churnwatch_db::list_unfollowers(&state.pool, target.id, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| UnfollowerItem {
            identity_key: row.identity_key,
            display_name: row.display_name,
            verified: row.verified,
            followers_count: row.followers_count,
            following_count: row.following_count,
            first_seen_at: row.first_seen_at,
            unfollowed_at: row.unfollowed_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
