//! The public ingestion entry point
//!
//! Ties the pieces together for one submission: validate, append through
//! the coordinator, evaluate regression verdicts against the pre-append
//! history, broadcast events, and hand the caller a structured result.

use crate::coordinator::{AppendError, MergeCoordinator};
use crate::events::{Event, EventManager};
use crate::store::HistoryStore;
use chrono::Utc;
use paceline_core::{
    evaluate, MeasurementVerdict, MergeOutcome, Record, RegressionPolicy, RunSubmission,
    ValidationError, Verdict,
};
use std::sync::Arc;

/// Terminal result of one submission. Storage failures are `Err` on
/// [`IngestService::submit`] instead; nothing here is lossy.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Accepted {
        merge: MergeOutcome,
        record: Record,
        verdicts: Vec<MeasurementVerdict>,
    },
    /// Invalid submission; the store was never touched.
    Rejected { reason: ValidationError },
}

pub struct IngestService {
    coordinator: MergeCoordinator,
    events: Arc<EventManager>,
    policy: RegressionPolicy,
}

impl IngestService {
    pub fn new(
        store: Arc<dyn HistoryStore>,
        events: Arc<EventManager>,
        policy: RegressionPolicy,
    ) -> Self {
        Self {
            coordinator: MergeCoordinator::new(store),
            events,
            policy,
        }
    }

    /// Ingest one benchmark run for `suite` of `repo_id`.
    pub async fn submit(
        &self,
        repo_id: &str,
        suite: &str,
        submission: RunSubmission,
    ) -> Result<IngestOutcome, AppendError> {
        if let Err(reason) = submission.validate() {
            tracing::debug!(repo_id, suite, error = %reason, "submission rejected");
            return Ok(IngestOutcome::Rejected { reason });
        }

        let record = submission.into_record(Utc::now().timestamp_millis());
        let repo_url = repo_url_from_commit(&record.commit.url);

        let outcome = self
            .coordinator
            .append(repo_id, &repo_url, suite, record)
            .await?;

        let verdicts = evaluate(&outcome.prior_history, &outcome.record, &self.policy);

        let commit_id = outcome.record.commit.id.clone();
        match outcome.merge {
            MergeOutcome::Appended => {
                self.events
                    .broadcast(
                        repo_id,
                        Event::RunAppended {
                            suite: suite.to_string(),
                            commit_id: commit_id.clone(),
                        },
                    )
                    .await;
            }
            MergeOutcome::Replaced { .. } => {
                tracing::info!(
                    repo_id,
                    suite,
                    commit_id = %commit_id,
                    "conflicting resubmission reconciled in place"
                );
                self.events
                    .broadcast(
                        repo_id,
                        Event::RunReconciled {
                            suite: suite.to_string(),
                            commit_id: commit_id.clone(),
                        },
                    )
                    .await;
            }
            MergeOutcome::Unchanged => {}
        }

        for verdict in verdicts.iter().filter(|v| v.verdict == Verdict::Regressed) {
            tracing::warn!(
                repo_id,
                suite,
                commit_id = %commit_id,
                measurement = %verdict.name,
                baseline = verdict.baseline,
                value = verdict.value,
                ratio = verdict.ratio,
                "regression detected"
            );
            self.events
                .broadcast(
                    repo_id,
                    Event::RegressionDetected {
                        suite: suite.to_string(),
                        commit_id: commit_id.clone(),
                        measurement: verdict.name.clone(),
                        ratio: verdict.ratio.unwrap_or(0.0),
                    },
                )
                .await;
        }

        Ok(IngestOutcome::Accepted {
            merge: outcome.merge,
            record: outcome.record,
            verdicts,
        })
    }
}

/// Derive the repository URL from a commit URL of the usual
/// `<repo>/commit/<hash>` form. Falls back to the commit URL itself for
/// anything unrecognized.
fn repo_url_from_commit(commit_url: &str) -> String {
    match commit_url.split_once("/commit/") {
        Some((repo, _)) => repo.to_string(),
        None => commit_url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use paceline_core::{CommitInfo, Measurement, Signature};

    fn service(policy: RegressionPolicy) -> (IngestService, Arc<EventManager>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let events = Arc::new(EventManager::new());
        let service = IngestService::new(store.clone(), events.clone(), policy);
        (service, events, store)
    }

    fn submission(n: usize, name: &str, value: f64, unit: &str) -> RunSubmission {
        RunSubmission {
            commit: CommitInfo {
                id: format!("{n:040x}"),
                message: None,
                author: Signature {
                    name: "Ada".to_string(),
                    email: None,
                },
                committer: Signature {
                    name: "Ada".to_string(),
                    email: None,
                },
                timestamp: "2026-01-05T10:00:00Z".parse().unwrap(),
                url: format!("https://github.com/acme/chain/commit/{n:040x}"),
            },
            tool: "cargo".to_string(),
            benches: vec![Measurement {
                name: name.to_string(),
                value,
                range: None,
                unit: unit.to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn invalid_submission_never_touches_the_store() {
        let (service, _events, store) = service(RegressionPolicy::default());

        let mut bad = submission(1, "decode", 1.0, "ns/iter");
        bad.commit.id = "nope".to_string();
        let outcome = service.submit("acme", "Benchmark", bad).await.unwrap();
        assert!(matches!(
            outcome,
            IngestOutcome::Rejected {
                reason: ValidationError::MalformedCommitHash(_)
            }
        ));
        assert!(store.load("acme").await.is_err());
    }

    #[tokio::test]
    async fn duplicate_submission_is_idempotent() {
        let (service, _events, store) = service(RegressionPolicy::default());

        service
            .submit("acme", "Benchmark", submission(1, "decode", 1.0, "ns/iter"))
            .await
            .unwrap();
        let outcome = service
            .submit("acme", "Benchmark", submission(1, "decode", 1.0, "ns/iter"))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            IngestOutcome::Accepted {
                merge: MergeOutcome::Unchanged,
                ..
            }
        ));

        let doc = store.load("acme").await.unwrap();
        assert_eq!(doc.repository.suite("Benchmark").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn regression_is_reported_and_broadcast() {
        let (service, events, _store) = service(RegressionPolicy::default());
        let mut rx = events.subscribe("acme").await;

        // Build up a throughput history, then drop hard.
        for n in 1..=3 {
            service
                .submit("acme", "Benchmark", submission(n, "proving", 10.0, "Mgas/s"))
                .await
                .unwrap();
        }
        let outcome = service
            .submit("acme", "Benchmark", submission(4, "proving", 9.0, "Mgas/s"))
            .await
            .unwrap();

        let IngestOutcome::Accepted { verdicts, .. } = outcome else {
            panic!("expected acceptance");
        };
        assert_eq!(verdicts[0].verdict, Verdict::Regressed);

        // Events: three appends, a fourth append, then the regression.
        let mut regressions = 0;
        let mut appends = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                Event::RunAppended { .. } => appends += 1,
                Event::RegressionDetected { measurement, ratio, .. } => {
                    assert_eq!(measurement, "proving");
                    assert!((ratio + 0.1).abs() < 1e-9);
                    regressions += 1;
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(appends, 4);
        assert_eq!(regressions, 1);
    }

    #[tokio::test]
    async fn reconciliation_emits_its_event() {
        let (service, events, _store) = service(RegressionPolicy::default());
        let mut rx = events.subscribe("acme").await;

        service
            .submit("acme", "Benchmark", submission(1, "decode", 1.0, "ns/iter"))
            .await
            .unwrap();
        let outcome = service
            .submit("acme", "Benchmark", submission(1, "decode", 2.0, "ns/iter"))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            IngestOutcome::Accepted {
                merge: MergeOutcome::Replaced { index: 0 },
                ..
            }
        ));

        let mut saw_reconciled = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, Event::RunReconciled { .. }) {
                saw_reconciled = true;
            }
        }
        assert!(saw_reconciled);
    }

    #[tokio::test]
    async fn end_to_end_improvement_with_single_point_minimum() {
        let policy = RegressionPolicy {
            min_history: 1,
            ..Default::default()
        };
        let (service, _events, store) = service(policy);

        service
            .submit("acme", "Benchmark", submission(0xabc, "X", 100.0, "ns/iter"))
            .await
            .unwrap();
        let outcome = service
            .submit("acme", "Benchmark", submission(0xdef, "X", 50.0, "ns/iter"))
            .await
            .unwrap();

        let IngestOutcome::Accepted { verdicts, .. } = outcome else {
            panic!("expected acceptance");
        };
        assert_eq!(verdicts[0].verdict, Verdict::Improved);

        let doc = store.load("acme").await.unwrap();
        assert_eq!(doc.repository.suite("Benchmark").unwrap().len(), 2);
        assert_eq!(doc.repository.repo_url, "https://github.com/acme/chain");
    }

    #[test]
    fn repo_url_strips_commit_suffix() {
        assert_eq!(
            repo_url_from_commit("https://github.com/acme/chain/commit/abc123"),
            "https://github.com/acme/chain"
        );
        assert_eq!(
            repo_url_from_commit("https://example.com/weird"),
            "https://example.com/weird"
        );
    }
}
