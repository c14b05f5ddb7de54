use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Serialize;

use churnwatch_engine::{classify, EventKind, IdentityEvent, PatternReport};

use crate::middleware::RequestId;

use super::{map_db_error, resolve_target, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct PatternsData {
    /// Window used for the quick-unfollower bucket, echoed so the UI can
    /// label the report.
    pub(super) quick_unfollow_window_days: i64,
    #[serde(flatten)]
    pub(super) report: PatternReport,
}

/// Behavioral pattern report for a target, projected from the event ledger.
pub(super) async fn get_patterns(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(handle): Path<String>,
) -> Result<Json<ApiResponse<PatternsData>>, ApiError> {
    let target = resolve_target(&state.pool, &req_id.0, &handle).await?;

    let rows = churnwatch_db::list_events_for_classification(&state.pool, target.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let events: Vec<IdentityEvent> = rows
        .into_iter()
        .filter_map(|row| {
            let Some(kind) = EventKind::parse(&row.event_type) else {
                tracing::warn!(
                    event_type = %row.event_type,
                    "skipping ledger row with unknown event type"
                );
                return None;
            };
            Some(IdentityEvent {
                identity_key: row.identity_key,
                kind,
                occurred_at: row.occurred_at,
            })
        })
        .collect();

    let window = state.config.quick_unfollow_window_days;
    let report = classify(&events, window);

    Ok(Json(ApiResponse {
        data: PatternsData {
            quick_unfollow_window_days: window,
            report,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
