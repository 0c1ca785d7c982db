//! Ingestion payload validation

use crate::types::{CommitInfo, Measurement, Record};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Full git commit hashes only; short forms would weaken the dedup key.
pub const COMMIT_HASH_LEN: usize = 40;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("malformed commit hash: {0:?}")]
    MalformedCommitHash(String),
    #[error("submission contains no measurements")]
    EmptyMeasurementSet,
    #[error("duplicate measurement name: {0:?}")]
    DuplicateMeasurementName(String),
    #[error("measurement {0:?} has an empty unit")]
    EmptyUnit(String),
}

/// One benchmark run as submitted by a CI job.
///
/// This is the ingestion wire shape: a [`Record`] minus the ingestion
/// timestamp, which the store stamps at append time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSubmission {
    pub commit: CommitInfo,
    pub tool: String,
    pub benches: Vec<Measurement>,
}

impl RunSubmission {
    /// Check the submission against the ingestion contract. Pure; no
    /// storage is touched until this has passed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let id = self.commit.id.trim();
        if id.is_empty() {
            return Err(ValidationError::MissingField("commit.id".to_string()));
        }
        if id.len() != COMMIT_HASH_LEN || hex::decode(id).is_err() {
            return Err(ValidationError::MalformedCommitHash(id.to_string()));
        }

        if self.tool.trim().is_empty() {
            return Err(ValidationError::MissingField("tool".to_string()));
        }
        if self.commit.url.trim().is_empty() {
            return Err(ValidationError::MissingField("commit.url".to_string()));
        }

        if self.benches.is_empty() {
            return Err(ValidationError::EmptyMeasurementSet);
        }

        let mut seen = HashSet::new();
        for bench in &self.benches {
            if bench.name.trim().is_empty() {
                return Err(ValidationError::MissingField("bench.name".to_string()));
            }
            if bench.unit.trim().is_empty() {
                return Err(ValidationError::EmptyUnit(bench.name.clone()));
            }
            if !seen.insert(bench.name.as_str()) {
                return Err(ValidationError::DuplicateMeasurementName(
                    bench.name.clone(),
                ));
            }
        }

        Ok(())
    }

    /// Convert a validated submission into a record, stamping the ingestion
    /// timestamp and normalizing the commit hash to lowercase.
    pub fn into_record(self, date: i64) -> Record {
        let mut commit = self.commit;
        commit.id = commit.id.trim().to_ascii_lowercase();
        Record {
            commit,
            date,
            tool: self.tool,
            benches: self.benches,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Signature;

    fn submission() -> RunSubmission {
        RunSubmission {
            commit: CommitInfo {
                id: "ABCDEF0123456789abcdef0123456789abcdef01".to_string(),
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
                url: "https://github.com/acme/chain/commit/abcdef0".to_string(),
            },
            tool: "cargo".to_string(),
            benches: vec![Measurement {
                name: "decode".to_string(),
                value: 910.0,
                range: Some(14.0),
                unit: "ns/iter".to_string(),
            }],
        }
    }

    #[test]
    fn accepts_well_formed_submission() {
        assert_eq!(submission().validate(), Ok(()));
    }

    #[test]
    fn into_record_normalizes_hash_case() {
        let record = submission().into_record(1_767_600_000_000);
        assert_eq!(record.commit.id, "abcdef0123456789abcdef0123456789abcdef01");
        assert_eq!(record.date, 1_767_600_000_000);
    }

    #[test]
    fn rejects_short_or_non_hex_hashes() {
        let mut s = submission();
        s.commit.id = "abc123".to_string();
        assert!(matches!(
            s.validate(),
            Err(ValidationError::MalformedCommitHash(_))
        ));

        let mut s = submission();
        s.commit.id = "z".repeat(40);
        assert!(matches!(
            s.validate(),
            Err(ValidationError::MalformedCommitHash(_))
        ));

        let mut s = submission();
        s.commit.id = String::new();
        assert_eq!(
            s.validate(),
            Err(ValidationError::MissingField("commit.id".to_string()))
        );
    }

    #[test]
    fn rejects_empty_measurement_set() {
        let mut s = submission();
        s.benches.clear();
        assert_eq!(s.validate(), Err(ValidationError::EmptyMeasurementSet));
    }

    #[test]
    fn rejects_duplicate_measurement_names() {
        let mut s = submission();
        let dup = s.benches[0].clone();
        s.benches.push(dup);
        assert_eq!(
            s.validate(),
            Err(ValidationError::DuplicateMeasurementName(
                "decode".to_string()
            ))
        );
    }

    #[test]
    fn rejects_blank_tool_and_unit() {
        let mut s = submission();
        s.tool = "  ".to_string();
        assert_eq!(
            s.validate(),
            Err(ValidationError::MissingField("tool".to_string()))
        );

        let mut s = submission();
        s.benches[0].unit = String::new();
        assert_eq!(
            s.validate(),
            Err(ValidationError::EmptyUnit("decode".to_string()))
        );
    }
}
