use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::providers::Provider;
use crate::table::{CaseCategory, ResultTable};

/// Request counts for one provider during a collection run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderCounts {
    pub requests: usize,
    pub failures: usize,
}

impl ProviderCounts {
    pub fn failure_pct(&self) -> f64 {
        CollectionStats::pct(self.failures, self.requests)
    }
}

#[derive(Debug, Default, Serialize)]
pub struct CollectionStats {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub total_requests: usize,
    pub failed_requests: usize,
    pub providers: BTreeMap<Provider, ProviderCounts>,
}

impl CollectionStats {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            ..Default::default()
        }
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn record_success(&mut self, provider: Provider) {
        self.total_requests += 1;
        self.providers.entry(provider).or_default().requests += 1;
    }

    pub fn record_failure(&mut self, provider: Provider) {
        self.total_requests += 1;
        self.failed_requests += 1;
        let counts = self.providers.entry(provider).or_default();
        counts.requests += 1;
        counts.failures += 1;
    }

    pub fn failure_pct(&self) -> f64 {
        Self::pct(self.failed_requests, self.total_requests)
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }
}

/// How many rows fell into each case category, and how many were dropped
/// for missing a provider's travel time.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CaseSummary {
    pub total_rows: usize,
    pub incomplete_rows: usize,
    pub clean: usize,
    pub bad_snap_origin: usize,
    pub bad_snap_destination: usize,
    pub bad_snap_both: usize,
    pub restricted_road: usize,
}

impl CaseSummary {
    /// Counts the categories of `complete`, the rows that survived the
    /// completeness filter out of `total_rows`.
    pub fn from_table(complete: &ResultTable, total_rows: usize) -> Self {
        let mut s = CaseSummary {
            total_rows,
            incomplete_rows: total_rows.saturating_sub(complete.len()),
            ..Default::default()
        };

        for row in &complete.rows {
            match row.case_category.unwrap_or(CaseCategory::Clean) {
                CaseCategory::Clean => s.clean += 1,
                CaseCategory::BadSnapOrigin => s.bad_snap_origin += 1,
                CaseCategory::BadSnapDestination => s.bad_snap_destination += 1,
                CaseCategory::BadSnapBoth => s.bad_snap_both += 1,
                CaseCategory::RestrictedRoad => s.restricted_road += 1,
            }
        }

        s
    }

    pub fn bad_snap(&self) -> usize {
        self.bad_snap_origin + self.bad_snap_destination + self.bad_snap_both
    }

    pub fn incomplete_pct(&self) -> f64 {
        CollectionStats::pct(self.incomplete_rows, self.total_rows)
    }

    pub fn clean_pct(&self) -> f64 {
        CollectionStats::pct(self.clean, self.total_rows - self.incomplete_rows)
    }
}
