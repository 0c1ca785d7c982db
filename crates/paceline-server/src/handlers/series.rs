use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use paceline_core::{series_points, SeriesFilter, SeriesPoint};

use crate::handlers::suites::status_for;
use crate::AppState;

/// The chart-renderer read path: one suite's measurements flattened into
/// plottable points, ingestion-ordered, optionally bounded and filtered.
pub async fn get_series(
    State(state): State<AppState>,
    Path((repo_id, suite)): Path<(String, String)>,
    Query(filter): Query<SeriesFilter>,
) -> Result<Json<Vec<SeriesPoint>>, StatusCode> {
    let document = state.store.load(&repo_id).await.map_err(status_for)?;

    let records = document
        .repository
        .suite(&suite)
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(series_points(records, &filter).collect()))
}
