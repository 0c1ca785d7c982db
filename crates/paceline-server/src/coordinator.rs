//! Optimistic-concurrency coordination for history appends
//!
//! Multiple CI jobs can finish near-simultaneously and race to update the
//! same repository document. Appends go through a read-merge-CAS loop: on
//! version conflict the local update is discarded and rebuilt against the
//! freshly read document, with bounded retries and backoff.

use crate::store::{CasOutcome, HistoryDocument, HistoryStore, StoreError};
use paceline_core::{merge_record, MergeOutcome, Record};
use std::sync::Arc;
use std::time::{Duration, Instant};

const CAS_MAX_ATTEMPTS: usize = 16;
const IO_MAX_ATTEMPTS: usize = 4;
const CAS_BACKOFF_BASE_MS: u64 = 2;
const CAS_BACKOFF_MAX_MS: u64 = 256;

#[derive(Debug, thiserror::Error)]
pub enum AppendError {
    #[error("append of {commit_id} to suite {suite:?} lost the CAS race {attempts} times")]
    TooManyRetries {
        suite: String,
        commit_id: String,
        attempts: usize,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What an append did, plus the baseline input for regression evaluation.
#[derive(Debug, Clone)]
pub struct AppendOutcome {
    pub merge: MergeOutcome,
    pub record: Record,
    /// Suite records as they stood before this append, minus any earlier
    /// record for the same commit. A re-run is never its own baseline.
    pub prior_history: Vec<Record>,
}

/// Exponential backoff with jitter derived from the commit hash, so retry
/// spacing is reproducible under test while distinct writers still spread
/// out.
fn cas_retry_backoff(attempt: usize, commit_id: &str) -> Duration {
    let shift = attempt.saturating_sub(1).min(5) as u32;
    let exp_ms = CAS_BACKOFF_BASE_MS.saturating_mul(1u64 << shift);
    let base_ms = exp_ms.min(CAS_BACKOFF_MAX_MS);
    let jitter_window = (base_ms / 2).max(1);
    let seed = commit_id
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(131).wrapping_add(b as u64));
    let jitter_ms = seed.wrapping_add(attempt as u64) % jitter_window;
    Duration::from_millis(base_ms + jitter_ms)
}

pub struct MergeCoordinator {
    store: Arc<dyn HistoryStore>,
}

impl MergeCoordinator {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// Append `record` to `suite` of `repo_id`, reconciling resubmissions.
    ///
    /// Either the whole record becomes durably visible or nothing does.
    /// Idempotent retries (same commit, same payload) succeed without
    /// writing. `repo_url` is only used when the repository document does
    /// not exist yet.
    pub async fn append(
        &self,
        repo_id: &str,
        repo_url: &str,
        suite: &str,
        record: Record,
    ) -> Result<AppendOutcome, AppendError> {
        let commit_id = record.commit.id.clone();
        let started_at = Instant::now();
        let mut cas_retries = 0usize;

        for attempt in 1..=CAS_MAX_ATTEMPTS {
            let mut document = match self.load_current(repo_id).await {
                Ok(Some(document)) => document,
                Ok(None) => HistoryDocument::empty(repo_url),
                Err(e) => return Err(e.into()),
            };
            let expected_version = document.version;

            let prior_history: Vec<Record> = document
                .repository
                .suite(suite)
                .unwrap_or(&[])
                .iter()
                .filter(|r| r.commit.id != commit_id)
                .cloned()
                .collect();

            let last_update = record.date;
            let merge = merge_record(&mut document.repository, suite, record.clone());

            if merge == MergeOutcome::Unchanged {
                tracing::debug!(
                    repo_id,
                    suite,
                    commit_id = %commit_id,
                    attempt,
                    "idempotent resubmission; history untouched"
                );
                return Ok(AppendOutcome {
                    merge,
                    record,
                    prior_history,
                });
            }

            match self
                .commit_current(repo_id, expected_version, document, last_update)
                .await?
            {
                CasOutcome::Committed { version } => {
                    tracing::debug!(
                        repo_id,
                        suite,
                        commit_id = %commit_id,
                        attempt,
                        cas_retries,
                        version,
                        latency_ms = started_at.elapsed().as_millis() as u64,
                        "history append committed"
                    );
                    return Ok(AppendOutcome {
                        merge,
                        record,
                        prior_history,
                    });
                }
                CasOutcome::Conflict { version } => {
                    cas_retries += 1;
                    if attempt == CAS_MAX_ATTEMPTS {
                        break;
                    }
                    let backoff = cas_retry_backoff(attempt, &commit_id);
                    tracing::warn!(
                        repo_id,
                        suite,
                        commit_id = %commit_id,
                        attempt,
                        stored_version = version,
                        expected_version,
                        backoff_ms = backoff.as_millis() as u64,
                        "CAS contention detected; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        tracing::error!(
            repo_id,
            suite,
            commit_id = %commit_id,
            attempts = CAS_MAX_ATTEMPTS,
            latency_ms = started_at.elapsed().as_millis() as u64,
            "CAS retry limit exceeded; submission must be retried by the caller"
        );
        Err(AppendError::TooManyRetries {
            suite: suite.to_string(),
            commit_id,
            attempts: CAS_MAX_ATTEMPTS,
        })
    }

    /// Load the current document, retrying transient I/O failures.
    /// `Ok(None)` means no history exists yet.
    async fn load_current(
        &self,
        repo_id: &str,
    ) -> Result<Option<HistoryDocument>, StoreError> {
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match self.store.load(repo_id).await {
                Ok(document) => return Ok(Some(document)),
                Err(StoreError::NotFound(_)) => return Ok(None),
                Err(e) if e.is_transient() && attempt < IO_MAX_ATTEMPTS => {
                    tracing::warn!(repo_id, attempt, error = %e, "transient load failure; retrying");
                    tokio::time::sleep(cas_retry_backoff(attempt, repo_id)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Commit with bounded retry of transient I/O failures. CAS conflicts
    /// are not retried here; the caller must re-read and re-merge first.
    async fn commit_current(
        &self,
        repo_id: &str,
        expected_version: u64,
        document: HistoryDocument,
        last_update: i64,
    ) -> Result<CasOutcome, StoreError> {
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match self
                .store
                .commit(
                    repo_id,
                    expected_version,
                    document.repository.clone(),
                    last_update,
                )
                .await
            {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_transient() && attempt < IO_MAX_ATTEMPTS => {
                    tracing::warn!(repo_id, attempt, error = %e, "transient commit failure; retrying");
                    tokio::time::sleep(cas_retry_backoff(attempt, repo_id)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
