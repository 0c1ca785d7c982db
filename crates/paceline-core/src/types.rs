//! Core types for Paceline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Author or committer identity as reported by CI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Immutable identity of the code state a benchmark ran against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Full commit hash, 40 lowercase hex chars once validated
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub author: Signature,
    pub committer: Signature,
    pub timestamp: DateTime<Utc>,
    pub url: String,
}

/// One named numeric sample within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub value: f64,
    /// Error half-width in the same unit as `value`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<f64>,
    pub unit: String,
}

/// One benchmark run as stored in a suite's history.
///
/// `date` is the ingestion timestamp in epoch millis, stamped by the store
/// at append time. It is distinct from `commit.timestamp` and is the sole
/// ordering key within a suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub commit: CommitInfo,
    pub date: i64,
    pub tool: String,
    pub benches: Vec<Measurement>,
}

impl Record {
    /// Compare everything a CI job submitted, ignoring the store-stamped
    /// ingestion date. Used to recognize idempotent retries.
    pub fn same_payload(&self, other: &Record) -> bool {
        self.commit == other.commit && self.tool == other.tool && self.benches == other.benches
    }

    /// Look up a measurement by name.
    pub fn measurement(&self, name: &str) -> Option<&Measurement> {
        self.benches.iter().find(|m| m.name == name)
    }
}

/// Root aggregate: one tracked repository's full benchmark history,
/// partitioned into named suites.
///
/// Suites map to the top-level groupings of the persisted document
/// (`entries` keyed by suite name, each an append-ordered run list).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub repo_url: String,
    pub entries: BTreeMap<String, Vec<Record>>,
}

impl Repository {
    /// Create an empty repository history.
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Read-only view of a suite's records, if the suite exists.
    pub fn suite(&self, name: &str) -> Option<&[Record]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Mutable access to a suite, creating an empty one if absent.
    pub fn suite_mut(&mut self, name: &str) -> &mut Vec<Record> {
        self.entries.entry(name.to_string()).or_default()
    }
}
