use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use paceline_core::{MeasurementVerdict, MergeOutcome, RunSubmission};
use serde::Serialize;

use crate::coordinator::AppendError;
use crate::ingest::IngestOutcome;
use crate::store::StoreError;
use crate::AppState;

/// Structured submission result; `status` is the field CI jobs branch on.
#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitResponse {
    Accepted {
        outcome: &'static str,
        commit: String,
        date: i64,
        verdicts: Vec<MeasurementVerdict>,
    },
    Rejected {
        reason: String,
    },
    Failed {
        reason: String,
    },
}

pub async fn submit_run(
    State(state): State<AppState>,
    Path((repo_id, suite)): Path<(String, String)>,
    Json(submission): Json<RunSubmission>,
) -> (StatusCode, Json<SubmitResponse>) {
    match state.ingest.submit(&repo_id, &suite, submission).await {
        Ok(IngestOutcome::Accepted {
            merge,
            record,
            verdicts,
        }) => {
            let outcome = match merge {
                MergeOutcome::Appended => "appended",
                MergeOutcome::Unchanged => "unchanged",
                MergeOutcome::Replaced { .. } => "replaced",
            };
            (
                StatusCode::OK,
                Json(SubmitResponse::Accepted {
                    outcome,
                    commit: record.commit.id,
                    date: record.date,
                    verdicts,
                }),
            )
        }
        Ok(IngestOutcome::Rejected { reason }) => (
            StatusCode::BAD_REQUEST,
            Json(SubmitResponse::Rejected {
                reason: reason.to_string(),
            }),
        ),
        Err(err) => {
            tracing::error!(repo_id, suite, error = %err, "submission failed");
            (
                failure_status(&err),
                Json(SubmitResponse::Failed {
                    reason: err.to_string(),
                }),
            )
        }
    }
}

fn failure_status(err: &AppendError) -> StatusCode {
    match err {
        // The caller should retry the whole submission later.
        AppendError::TooManyRetries { .. } => StatusCode::SERVICE_UNAVAILABLE,
        AppendError::Store(StoreError::InvalidRepoId(_)) => StatusCode::BAD_REQUEST,
        AppendError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
