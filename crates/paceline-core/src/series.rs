//! Read-side series queries for chart tooling

use crate::types::Record;
use serde::{Deserialize, Serialize};

/// Bounds and filters for a series query. Timestamp bounds are on the
/// ingestion date and inclusive at both ends.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SeriesFilter {
    pub bench: Option<String>,
    pub since: Option<i64>,
    pub until: Option<i64>,
}

impl SeriesFilter {
    fn matches_record(&self, record: &Record) -> bool {
        self.since.map_or(true, |since| record.date >= since)
            && self.until.map_or(true, |until| record.date <= until)
    }

    fn matches_name(&self, name: &str) -> bool {
        self.bench.as_deref().map_or(true, |bench| bench == name)
    }
}

/// One plottable point, flattened from a record's measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    pub commit_hash: String,
    /// Ingestion timestamp, epoch millis
    pub timestamp: i64,
    pub name: String,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<f64>,
    pub unit: String,
}

/// Flatten a suite's records into plottable points in ingestion order.
/// Records with no measurement matching the filter contribute nothing.
pub fn series_points<'a>(
    records: &'a [Record],
    filter: &'a SeriesFilter,
) -> impl Iterator<Item = SeriesPoint> + 'a {
    records
        .iter()
        .filter(|record| filter.matches_record(record))
        .flat_map(move |record| {
            record
                .benches
                .iter()
                .filter(|m| filter.matches_name(&m.name))
                .map(|m| SeriesPoint {
                    commit_hash: record.commit.id.clone(),
                    timestamp: record.date,
                    name: m.name.clone(),
                    value: m.value,
                    range: m.range,
                    unit: m.unit.clone(),
                })
        })
}
