//! Cross-provider outlier detection.
//!
//! A row is an outlier when one provider's value is at least
//! `ratio_threshold` times larger or smaller than the median of all
//! providers for that row, which usually means a routing error rather than
//! a real disagreement.

use serde::Serialize;
use tracing::info;

use super::utility::median;
use crate::providers::Provider;
use crate::parser::format_departure_time;
use crate::table::{ResultRow, ResultTable, RowKey};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierConfig {
    pub enabled: bool,
    /// Values at or beyond this ratio from the median are flagged.
    pub ratio_threshold: f64,
    /// Rows with fewer positive values than this are not checked.
    pub min_providers: usize,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ratio_threshold: 3.0,
            min_providers: 2,
        }
    }
}

/// Which per-provider number to compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    TravelTime,
    Distance,
}

impl Metric {
    fn value(&self, row: &ResultRow, provider: Provider) -> Option<u64> {
        let result = row.result(provider)?;
        match self {
            Metric::TravelTime => result.travel_time,
            Metric::Distance => result.distance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierRecord {
    /// Position in the table the outliers were detected on.
    pub row_index: usize,
    /// Identifies the route across tables, unlike `row_index`.
    pub key: RowKey,
    pub provider: Provider,
    pub value: f64,
    pub median: f64,
    pub ratio: f64,
}

/// Flags at most one provider per row: the first, in `providers` order,
/// whose ratio to the row median reaches the threshold.
pub fn detect_outliers(
    table: &ResultTable,
    providers: &[Provider],
    metric: Metric,
    config: &OutlierConfig,
) -> Vec<OutlierRecord> {
    if !config.enabled {
        return Vec::new();
    }

    let mut outliers = Vec::new();
    for (row_index, row) in table.rows.iter().enumerate() {
        let present: Vec<(Provider, f64)> = providers
            .iter()
            .filter_map(|p| metric.value(row, *p).map(|v| (*p, v as f64)))
            .filter(|(_, v)| *v > 0.0)
            .collect();

        if present.len() < config.min_providers {
            continue;
        }
        let values: Vec<f64> = present.iter().map(|(_, v)| *v).collect();
        let Some(median) = median(&values).filter(|m| *m != 0.0) else {
            continue;
        };

        let offender = present.iter().find_map(|(provider, value)| {
            let ratio = value.max(median) / value.min(median);
            (ratio >= config.ratio_threshold).then(|| OutlierRecord {
                row_index,
                key: row.key(),
                provider: *provider,
                value: *value,
                median,
                ratio,
            })
        });
        outliers.extend(offender);
    }

    outliers
}

/// A new table without the flagged rows. Row positions of the result are
/// renumbered from zero.
pub fn filter_outliers(table: &ResultTable, outliers: &[OutlierRecord]) -> ResultTable {
    if outliers.is_empty() {
        return table.clone();
    }

    let rows = table
        .rows
        .iter()
        .enumerate()
        .filter(|(i, _)| !outliers.iter().any(|o| o.row_index == *i))
        .map(|(_, row)| row.clone())
        .collect();
    ResultTable::new(table.providers.clone(), rows)
}

impl OutlierRecord {
    /// One log line naming the route and the offending provider.
    pub fn describe(&self) -> String {
        format!(
            "{} -> {} at {}: {} = {:.0}s (median: {:.0}s, ratio: {:.1}x)",
            self.key.origin,
            self.key.destination,
            format_departure_time(&self.key.departure_time),
            self.provider.display_name(),
            self.value,
            self.median,
            self.ratio
        )
    }
}

pub fn log_outliers(outliers: &[OutlierRecord], description: &str) {
    if outliers.is_empty() {
        info!("No outliers detected in {description}");
        return;
    }

    info!("Detected {} outlier rows in {description}:", outliers.len());
    for outlier in outliers {
        info!("  {}", outlier.describe());
    }
}
