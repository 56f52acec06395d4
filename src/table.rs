//! In-memory result table: one row per (origin, destination, departure time).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::ComparisonError;
use crate::providers::Provider;

/// Usability class of a row, assigned by the snapping and warning checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseCategory {
    Clean,
    BadSnapOrigin,
    BadSnapDestination,
    BadSnapBoth,
    RestrictedRoad,
}

impl CaseCategory {
    pub const ALL: [CaseCategory; 5] = [
        CaseCategory::Clean,
        CaseCategory::BadSnapOrigin,
        CaseCategory::BadSnapDestination,
        CaseCategory::BadSnapBoth,
        CaseCategory::RestrictedRoad,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CaseCategory::Clean => "clean",
            CaseCategory::BadSnapOrigin => "bad_snap_origin",
            CaseCategory::BadSnapDestination => "bad_snap_destination",
            CaseCategory::BadSnapBoth => "bad_snap_both",
            CaseCategory::RestrictedRoad => "restricted_road",
        }
    }

    pub fn is_bad_snap(&self) -> bool {
        matches!(
            self,
            CaseCategory::BadSnapOrigin
                | CaseCategory::BadSnapDestination
                | CaseCategory::BadSnapBoth
        )
    }
}

impl fmt::Display for CaseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseCategory {
    type Err = ComparisonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CaseCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| ComparisonError::Config(format!("unknown case category `{s}`")))
    }
}

/// Everything one provider reported for one route query. `None` means the
/// provider did not answer or does not supply that field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderResult {
    pub travel_time: Option<u64>,
    pub distance: Option<u64>,
    pub snapped_origin: Option<String>,
    pub snapped_destination: Option<String>,
    pub warnings: Option<String>,
}

impl ProviderResult {
    /// Field-wise first-non-null merge. Associative, and commutative whenever
    /// the two sides never both carry a value for the same field.
    pub fn merge(self, other: ProviderResult) -> ProviderResult {
        ProviderResult {
            travel_time: self.travel_time.or(other.travel_time),
            distance: self.distance.or(other.distance),
            snapped_origin: self.snapped_origin.or(other.snapped_origin),
            snapped_destination: self.snapped_destination.or(other.snapped_destination),
            warnings: self.warnings.or(other.warnings),
        }
    }
}

/// Identity of a physical route query.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RowKey {
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<FixedOffset>,
    pub results: BTreeMap<Provider, ProviderResult>,
    pub case_category: Option<CaseCategory>,
}

impl ResultRow {
    pub fn new(
        origin: impl Into<String>,
        destination: impl Into<String>,
        departure_time: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            departure_time,
            results: BTreeMap::new(),
            case_category: None,
        }
    }

    pub fn with_result(mut self, provider: Provider, result: ProviderResult) -> Self {
        self.results.insert(provider, result);
        self
    }

    pub fn key(&self) -> RowKey {
        RowKey {
            origin: self.origin.clone(),
            destination: self.destination.clone(),
            departure_time: self.departure_time,
        }
    }

    pub fn result(&self, provider: Provider) -> Option<&ProviderResult> {
        self.results.get(&provider)
    }

    pub fn travel_time(&self, provider: Provider) -> Option<u64> {
        self.result(provider).and_then(|r| r.travel_time)
    }

    /// Folds another fragment of the same route into this row.
    pub fn merge(mut self, other: ResultRow) -> ResultRow {
        for (provider, result) in other.results {
            let merged = match self.results.remove(&provider) {
                Some(existing) => existing.merge(result),
                None => result,
            };
            self.results.insert(provider, merged);
        }
        self.case_category = self.case_category.or(other.case_category);
        self
    }
}

/// Rows plus the ordered set of providers whose columns the table carries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    pub providers: Vec<Provider>,
    pub rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn new(providers: Vec<Provider>, rows: Vec<ResultRow>) -> Self {
        Self { providers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_provider(&self, provider: Provider) -> bool {
        self.providers.contains(&provider)
    }

    /// Rows where every provider of the table reported a travel time.
    pub fn complete_rows(&self) -> ResultTable {
        let rows = self
            .rows
            .iter()
            .filter(|row| self.providers.iter().all(|p| row.travel_time(*p).is_some()))
            .cloned()
            .collect();
        ResultTable::new(self.providers.clone(), rows)
    }

    pub fn with_category(&self, category: CaseCategory) -> ResultTable {
        let rows = self
            .rows
            .iter()
            .filter(|row| row.case_category == Some(category))
            .cloned()
            .collect();
        ResultTable::new(self.providers.clone(), rows)
    }

    /// Travel times of `provider`, aligned with `rows`.
    pub fn travel_times(&self, provider: Provider) -> Vec<Option<u64>> {
        self.rows.iter().map(|row| row.travel_time(provider)).collect()
    }
}
