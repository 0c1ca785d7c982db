//! Rolling-baseline regression detection

use crate::types::Record;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which way a measurement's value improves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Latency / cost style units: smaller is better.
    LowerIsBetter,
    /// Throughput style units: bigger is better.
    HigherIsBetter,
}

/// Built-in unit table. Deliberately a closed match, not string sniffing:
/// units outside this table get no direction and evaluate to
/// [`Verdict::Inconclusive`] unless the policy maps them explicitly.
fn builtin_direction(unit: &str) -> Option<Direction> {
    match unit {
        "ns/iter" | "ns" | "us" | "ms" | "s" | "gas" | "bytes" => Some(Direction::LowerIsBetter),
        "Mgas/s" | "Ggas/s" | "ops/s" | "ops/sec" | "MB/s" | "GB/s" | "items/s" => {
            Some(Direction::HigherIsBetter)
        }
        _ => None,
    }
}

/// Tunables for regression evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionPolicy {
    /// Global relative-change threshold (0.05 = 5%).
    pub threshold_ratio: f64,
    /// How many recent prior points form the baseline window.
    pub window: usize,
    /// Minimum prior points required before a verdict is attempted.
    pub min_history: usize,
    /// Per-measurement-name threshold overrides. Wins over `unit_thresholds`.
    pub name_thresholds: BTreeMap<String, f64>,
    /// Per-unit threshold overrides. Wins over `threshold_ratio`.
    pub unit_thresholds: BTreeMap<String, f64>,
    /// Extensions/overrides to the built-in unit direction table.
    pub unit_directions: BTreeMap<String, Direction>,
}

impl Default for RegressionPolicy {
    fn default() -> Self {
        Self {
            threshold_ratio: 0.05,
            window: 10,
            min_history: 2,
            name_thresholds: BTreeMap::new(),
            unit_thresholds: BTreeMap::new(),
            unit_directions: BTreeMap::new(),
        }
    }
}

impl RegressionPolicy {
    /// Resolve the threshold for one measurement: name override, then unit
    /// override, then the global ratio.
    pub fn threshold_for(&self, name: &str, unit: &str) -> f64 {
        self.name_thresholds
            .get(name)
            .or_else(|| self.unit_thresholds.get(unit))
            .copied()
            .unwrap_or(self.threshold_ratio)
    }

    /// Resolve the improvement direction for a unit, if known.
    pub fn direction_for(&self, unit: &str) -> Option<Direction> {
        self.unit_directions
            .get(unit)
            .copied()
            .or_else(|| builtin_direction(unit))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Regressed,
    Improved,
    Stable,
    /// Unknown unit direction or undefined ratio; deliberately non-alerting.
    Inconclusive,
    /// Fewer prior points than `min_history`; no baseline attempted.
    InsufficientHistory,
}

/// The verdict for one measurement of a newly ingested record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementVerdict {
    pub name: String,
    /// Median of the baseline window, when one was computed.
    pub baseline: Option<f64>,
    pub value: f64,
    /// Signed relative change `(value - baseline) / baseline`.
    pub ratio: Option<f64>,
    pub verdict: Verdict,
}

/// Evaluate every measurement of `new` against the suite's prior history.
///
/// `prior` must be the suite's records before this ingestion, in ingestion
/// order, excluding any earlier record for the same commit. Pure: no side
/// effects, no alerting. Callers decide what to do with `Regressed`.
pub fn evaluate(
    prior: &[Record],
    new: &Record,
    policy: &RegressionPolicy,
) -> Vec<MeasurementVerdict> {
    new.benches
        .iter()
        .map(|m| {
            let mut history: Vec<f64> = prior
                .iter()
                .filter_map(|record| record.measurement(&m.name))
                .map(|prev| prev.value)
                .collect();
            if history.len() > policy.window {
                history.drain(..history.len() - policy.window);
            }

            if history.len() < policy.min_history {
                return MeasurementVerdict {
                    name: m.name.clone(),
                    baseline: None,
                    value: m.value,
                    ratio: None,
                    verdict: Verdict::InsufficientHistory,
                };
            }

            let baseline = median(&mut history);
            if baseline == 0.0 {
                return MeasurementVerdict {
                    name: m.name.clone(),
                    baseline: Some(baseline),
                    value: m.value,
                    ratio: None,
                    verdict: Verdict::Inconclusive,
                };
            }

            let ratio = (m.value - baseline) / baseline;
            let verdict = match policy.direction_for(&m.unit) {
                None => Verdict::Inconclusive,
                Some(direction) => {
                    let threshold = policy.threshold_for(&m.name, &m.unit);
                    let worsened = match direction {
                        Direction::LowerIsBetter => ratio > threshold,
                        Direction::HigherIsBetter => ratio < -threshold,
                    };
                    let bettered = match direction {
                        Direction::LowerIsBetter => ratio < -threshold,
                        Direction::HigherIsBetter => ratio > threshold,
                    };
                    if worsened {
                        Verdict::Regressed
                    } else if bettered {
                        Verdict::Improved
                    } else {
                        Verdict::Stable
                    }
                }
            };

            MeasurementVerdict {
                name: m.name.clone(),
                baseline: Some(baseline),
                value: m.value,
                ratio: Some(ratio),
                verdict,
            }
        })
        .collect()
}

/// Median of the window. Chosen over the mean so a single outlier run does
/// not drag the baseline.
fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
