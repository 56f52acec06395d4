//! Data types produced by the analysis pipeline.

use serde::{Serialize, Serializer};

use super::outliers::OutlierRecord;
use crate::providers::Provider;
use crate::stats::CaseSummary;
use crate::table::ResultTable;

/// Per-row errors of `target` against `competitor`, aligned with the rows of
/// the table they were computed from. `None` where either value is missing.
#[derive(Debug, Clone, PartialEq)]
pub struct PairErrors {
    pub target: Provider,
    pub competitor: Provider,
    pub absolute: Vec<Option<f64>>,
    pub relative: Vec<Option<f64>>,
}

impl PairErrors {
    pub fn absolute_values(&self) -> Vec<f64> {
        self.absolute.iter().flatten().copied().collect()
    }

    pub fn relative_values(&self) -> Vec<f64> {
        self.relative.iter().flatten().copied().collect()
    }
}

/// Absolute and relative error at one quantile, truncated towards zero.
/// Infinite errors stay infinite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantileErrorResult {
    pub absolute_error: f64,
    pub relative_error: f64,
}

/// One line of the accuracy summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyRow {
    #[serde(rename = "Provider", serialize_with = "display_name")]
    pub provider: Provider,
    #[serde(rename = "Accuracy Score")]
    pub accuracy: f64,
    #[serde(rename = "Relative Time")]
    pub relative_time: f64,
}

fn display_name<S: Serializer>(provider: &Provider, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(provider.display_name())
}

/// How providers are scored in the accuracy summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Scoring {
    /// Against one reference provider, which scores exactly 100.
    Baseline,
    /// Against the average of every other provider on the same row.
    PeerAverage,
}

/// Everything one analysis run produced.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub summary: CaseSummary,
    pub outliers: Vec<OutlierRecord>,
    /// Complete rows with their case category, for export.
    pub table: ResultTable,
    /// Errors aligned with `table`.
    pub differences: Vec<PairErrors>,
    /// Errors over clean, non-outlier rows only.
    pub clean_differences: Vec<PairErrors>,
    pub accuracy: Vec<AccuracyRow>,
}
