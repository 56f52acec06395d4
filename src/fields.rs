//! Column naming for the flat result table.
//!
//! [`Fields`] is passed to every component that reads or writes provider
//! columns, so the naming scheme lives in one value instead of global tables.

use std::collections::HashMap;

use crate::providers::Provider;

pub const ORIGIN: &str = "origin";
pub const DESTINATION: &str = "destination";
pub const DEPARTURE_TIME: &str = "departure_time";
pub const CASE_CATEGORY: &str = "case_category";

/// Column names one provider can contribute to a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderColumns {
    pub travel_time: String,
    pub distance: String,
    pub snapped_origin: Option<String>,
    pub snapped_destination: Option<String>,
    pub warnings: Option<String>,
}

impl ProviderColumns {
    /// All columns in export order.
    pub fn names(&self) -> Vec<&str> {
        let mut names = vec![self.travel_time.as_str(), self.distance.as_str()];
        names.extend(self.snapped_origin.as_deref());
        names.extend(self.snapped_destination.as_deref());
        names.extend(self.warnings.as_deref());
        names
    }
}

/// Per-provider column names plus the provider whose warnings decide
/// restricted-road classification.
#[derive(Debug, Clone)]
pub struct Fields {
    columns: HashMap<Provider, ProviderColumns>,
    warnings_provider: Provider,
}

impl Default for Fields {
    fn default() -> Self {
        let columns = Provider::ALL
            .into_iter()
            .map(|p| (p, default_columns(p)))
            .collect();

        Self {
            columns,
            warnings_provider: Provider::Google,
        }
    }
}

fn default_columns(provider: Provider) -> ProviderColumns {
    // TravelTime keeps the historic short prefix.
    let prefix = match provider {
        Provider::TravelTime => "tt",
        other => other.id(),
    };
    let snaps = matches!(
        provider,
        Provider::Google | Provider::Mapbox | Provider::TravelTime
    );

    ProviderColumns {
        travel_time: format!("{prefix}_travel_time"),
        distance: format!("{prefix}_distance"),
        snapped_origin: snaps.then(|| format!("{prefix}_snapped_origin")),
        snapped_destination: snaps.then(|| format!("{prefix}_snapped_destination")),
        warnings: (provider == Provider::Google).then(|| format!("{prefix}_warnings")),
    }
}

impl Fields {
    pub fn columns(&self, provider: Provider) -> &ProviderColumns {
        // Every variant is inserted by the constructors.
        &self.columns[&provider]
    }

    pub fn travel_time(&self, provider: Provider) -> &str {
        &self.columns(provider).travel_time
    }

    pub fn warnings_provider(&self) -> Provider {
        self.warnings_provider
    }

    pub fn with_warnings_provider(mut self, provider: Provider) -> Self {
        self.warnings_provider = provider;
        self
    }

    /// Header row for a table holding `providers`, excluding derived columns.
    pub fn header(&self, providers: &[Provider]) -> Vec<String> {
        let mut header = vec![
            ORIGIN.to_string(),
            DESTINATION.to_string(),
            DEPARTURE_TIME.to_string(),
        ];
        for provider in providers {
            header.extend(self.columns(*provider).names().into_iter().map(String::from));
        }
        header
    }
}

/// Column holding `|target - competitor|` for a pair.
pub fn absolute_error(target: Provider, competitor: Provider) -> String {
    format!("absolute_error_{target}_{competitor}")
}

/// Column holding the error as a percentage of the competitor's value.
pub fn relative_error(target: Provider, competitor: Provider) -> String {
    format!("error_percentage_{target}_{competitor}")
}
