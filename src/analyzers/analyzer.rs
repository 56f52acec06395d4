//! Runs the analysis stages in order over a collected table.

use tracing::info;

use super::accuracy::{calculate_accuracies, log_accuracies};
use super::differences::{calculate_all_pair_differences, calculate_differences, log_results};
use super::outliers::{Metric, OutlierConfig, detect_outliers, filter_outliers, log_outliers};
use super::snapping::{
    BAD_SNAP_THRESHOLD_M, detect_bad_snapping, detect_restricted_roads,
    log_restricted_roads_summary, log_snapping_summary,
};
use super::types::{AnalysisReport, Scoring};
use crate::fields::Fields;
use crate::providers::Provider;
use crate::stats::CaseSummary;
use crate::table::{CaseCategory, ResultTable};

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Provider whose results are being evaluated.
    pub target: Provider,
    pub quantile: f64,
    pub scoring: Scoring,
    /// Reference provider for baseline scoring.
    pub baseline: Provider,
    /// Compare every provider with every other, not only the target.
    pub all_pairs: bool,
    pub outliers: OutlierConfig,
    pub snap_threshold: f64,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            target: Provider::TravelTime,
            quantile: 0.90,
            scoring: Scoring::Baseline,
            baseline: Provider::Google,
            all_pairs: false,
            outliers: OutlierConfig::default(),
            snap_threshold: BAD_SNAP_THRESHOLD_M,
        }
    }
}

/// Table providers in registry order, which is the order outliers are
/// checked and summaries are listed in.
fn ordered_providers(table: &ResultTable) -> Vec<Provider> {
    Provider::ALL
        .into_iter()
        .filter(|p| table.has_provider(*p))
        .collect()
}

/// Complete rows only, classified by snapping and warnings.
pub fn classify(table: &ResultTable, fields: &Fields, snap_threshold: f64) -> ResultTable {
    let mut complete = table.complete_rows();
    let providers = complete.providers.clone();
    detect_bad_snapping(&mut complete, &providers, snap_threshold);
    detect_restricted_roads(&mut complete, fields);
    complete
}

/// Runs classification, outlier filtering, pairwise errors and accuracy
/// scoring. Returns `None` when no row has a travel time from every provider.
#[tracing::instrument(skip_all, fields(rows = table.len()))]
pub fn run_analysis(
    table: &ResultTable,
    fields: &Fields,
    options: &AnalysisOptions,
) -> Option<AnalysisReport> {
    let complete = classify(table, fields, options.snap_threshold);
    let summary = CaseSummary::from_table(&complete, table.len());

    if complete.is_empty() {
        info!("All rows from the input file were skipped");
        return None;
    }
    if summary.incomplete_rows > 0 {
        info!(
            "Skipped {} rows ({:.2}%)",
            summary.incomplete_rows,
            summary.incomplete_pct()
        );
    }
    log_snapping_summary(&complete);
    log_restricted_roads_summary(&complete);

    let providers = ordered_providers(&complete);
    let clean = complete.with_category(CaseCategory::Clean);
    info!(
        "Using {} clean rows ({:.2}%) for statistics",
        clean.len(),
        summary.clean_pct()
    );

    let outliers = detect_outliers(&clean, &providers, Metric::TravelTime, &options.outliers);
    log_outliers(&outliers, "clean rows");
    let clean = filter_outliers(&clean, &outliers);

    let pairwise = |t: &ResultTable| {
        if options.all_pairs {
            calculate_all_pair_differences(t, &providers)
        } else {
            calculate_differences(t, options.target, &providers)
        }
    };
    let differences = pairwise(&complete);
    let clean_differences = pairwise(&clean);
    log_results(&clean_differences, options.quantile);

    let accuracy = calculate_accuracies(&clean, &providers, options.scoring, options.baseline);
    let title = match options.scoring {
        Scoring::Baseline => format!(
            "Baseline summary, comparing to {}",
            options.baseline.display_name()
        ),
        Scoring::PeerAverage => "Summary, comparing to the average of other providers".to_string(),
    };
    log_accuracies(&accuracy, &title);

    Some(AnalysisReport {
        summary,
        outliers,
        table: complete,
        differences,
        clean_differences,
        accuracy,
    })
}
