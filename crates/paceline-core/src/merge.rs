//! Suite merge semantics for repeated and conflicting submissions

use crate::types::{Record, Repository};

/// What merging one record into a suite did to the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// New commit, appended at the end of the suite.
    Appended,
    /// Identical resubmission of a known commit; history untouched.
    Unchanged,
    /// Known commit resubmitted with a different payload, replaced in
    /// place at `index`. Positions of every other record are unchanged.
    Replaced { index: usize },
}

/// Merge `record` into `suite` within `repo`, creating the suite if absent.
///
/// The commit hash is the dedup key: a suite never holds two records for
/// the same commit. A replacement keeps the original record's ingestion
/// date so the suite stays monotonically ordered by ingestion time and
/// baselines referencing later positions stay valid.
pub fn merge_record(repo: &mut Repository, suite: &str, record: Record) -> MergeOutcome {
    let records = repo.suite_mut(suite);
    match records.iter().position(|r| r.commit.id == record.commit.id) {
        Some(index) if records[index].same_payload(&record) => MergeOutcome::Unchanged,
        Some(index) => {
            let mut record = record;
            record.date = records[index].date;
            records[index] = record;
            MergeOutcome::Replaced { index }
        }
        None => {
            records.push(record);
            MergeOutcome::Appended
        }
    }
}
