use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, resolve_target, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct EventsQuery {
    pub limit: Option<i64>,
    pub cursor: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct EventItem {
    pub(super) identity_key: String,
    pub(super) event_type: String,
    pub(super) display_name: Option<String>,
    pub(super) verified: bool,
    pub(super) followers_count: i32,
    pub(super) following_count: i32,
    pub(super) occurred_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct PaginatedEvents {
    pub(super) items: Vec<EventItem>,
    /// Pass back as `cursor` to fetch the next page; `null` when exhausted.
    pub(super) next_cursor: Option<i64>,
}

/// Change events for a target, most recent first, keyset-paginated.
pub(super) async fn list_events(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(handle): Path<String>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<ApiResponse<PaginatedEvents>>, ApiError> {
    let target = resolve_target(&state.pool, &req_id.0, &handle).await?;
    let limit = normalize_limit(query.limit);

    let rows = churnwatch_db::list_change_events(&state.pool, target.id, limit, query.cursor)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let next_cursor = if rows.len() as i64 == limit {
        rows.last().map(|row| row.id)
    } else {
        None
    };

    let items = rows
        .into_iter()
        .map(|row| EventItem {
            identity_key: row.identity_key,
            event_type: row.event_type,
            display_name: row.display_name,
            verified: row.verified,
            followers_count: row.followers_count,
            following_count: row.following_count,
            occurred_at: row.occurred_at,
        })
        .collect();

    Ok(Json(ApiResponse {
        data: PaginatedEvents { items, next_cursor },
        meta: ResponseMeta::new(req_id.0),
    }))
}
