use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::store::StoreError;
use crate::AppState;

#[derive(Serialize)]
pub struct SuiteSummary {
    pub name: String,
    pub runs: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoResponse {
    pub repo_url: String,
    pub last_update: i64,
    pub suites: Vec<SuiteSummary>,
}

pub async fn list_suites(
    State(state): State<AppState>,
    Path(repo_id): Path<String>,
) -> Result<Json<RepoResponse>, StatusCode> {
    let document = state.store.load(&repo_id).await.map_err(status_for)?;

    let suites = document
        .repository
        .entries
        .iter()
        .map(|(name, records)| SuiteSummary {
            name: name.clone(),
            runs: records.len(),
        })
        .collect();

    Ok(Json(RepoResponse {
        repo_url: document.repository.repo_url,
        last_update: document.last_update,
        suites,
    }))
}

pub(crate) fn status_for(err: StoreError) -> StatusCode {
    match err {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::InvalidRepoId(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
