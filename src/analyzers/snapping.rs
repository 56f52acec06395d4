//! Case classification from snapping distance and routing warnings.

use tracing::info;

use super::utility::haversine;
use crate::fields::Fields;
use crate::parser::Coordinates;
use crate::providers::Provider;
use crate::table::{CaseCategory, ResultTable};

/// Default distance, in metres, beyond which a snapped point is bad.
pub const BAD_SNAP_THRESHOLD_M: f64 = 200.0;

const RESTRICTED_ROAD_KEYWORDS: [&str; 2] = ["restricted", "private"];

/// `true` when `snapped` parses and lies more than `threshold` metres from
/// `requested`. Unparseable or non-finite values never count as bad.
fn snapped_too_far(requested: Coordinates, snapped: Option<&str>, threshold: f64) -> bool {
    let Some(snapped) = snapped.and_then(|s| s.parse::<Coordinates>().ok()) else {
        return false;
    };
    haversine(requested, snapped) > threshold
}

/// Sets the category of every row from the snapped points of `providers`.
///
/// Rows whose own origin or destination do not parse are left clean.
pub fn detect_bad_snapping(table: &mut ResultTable, providers: &[Provider], threshold: f64) {
    for row in &mut table.rows {
        row.case_category = Some(CaseCategory::Clean);

        let (Ok(origin), Ok(destination)) = (
            row.origin.parse::<Coordinates>(),
            row.destination.parse::<Coordinates>(),
        ) else {
            continue;
        };

        let mut bad_origin = false;
        let mut bad_destination = false;
        for result in providers.iter().filter_map(|p| row.results.get(p)) {
            bad_origin |= snapped_too_far(origin, result.snapped_origin.as_deref(), threshold);
            bad_destination |=
                snapped_too_far(destination, result.snapped_destination.as_deref(), threshold);
        }

        row.case_category = Some(match (bad_origin, bad_destination) {
            (true, true) => CaseCategory::BadSnapBoth,
            (true, false) => CaseCategory::BadSnapOrigin,
            (false, true) => CaseCategory::BadSnapDestination,
            (false, false) => CaseCategory::Clean,
        });
    }
}

pub fn has_restricted_road_warning(warnings: Option<&str>) -> bool {
    let Some(warnings) = warnings else {
        return false;
    };
    let lower = warnings.to_lowercase();
    RESTRICTED_ROAD_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Re-tags clean rows as restricted-road when the warnings provider
/// reported a restricted or private road. Bad-snap rows keep their category.
pub fn detect_restricted_roads(table: &mut ResultTable, fields: &Fields) {
    let provider = fields.warnings_provider();
    if fields.columns(provider).warnings.is_none() || !table.has_provider(provider) {
        return;
    }

    for row in &mut table.rows {
        if row.case_category.unwrap_or(CaseCategory::Clean) != CaseCategory::Clean {
            continue;
        }
        let warnings = row.result(provider).and_then(|r| r.warnings.as_deref());
        if has_restricted_road_warning(warnings) {
            row.case_category = Some(CaseCategory::RestrictedRoad);
        }
    }
}

pub fn log_snapping_summary(table: &ResultTable) {
    let count = |category: CaseCategory| {
        table
            .rows
            .iter()
            .filter(|r| r.case_category == Some(category))
            .count()
    };
    let bad: usize = [
        CaseCategory::BadSnapOrigin,
        CaseCategory::BadSnapDestination,
        CaseCategory::BadSnapBoth,
    ]
    .into_iter()
    .map(count)
    .sum();

    if bad == 0 {
        return;
    }
    info!("Detected {bad} routes with bad snapping issues");
    for category in [
        CaseCategory::BadSnapOrigin,
        CaseCategory::BadSnapDestination,
        CaseCategory::BadSnapBoth,
    ] {
        let n = count(category);
        if n > 0 {
            info!("  - {category}: {n}");
        }
    }
}

pub fn log_restricted_roads_summary(table: &ResultTable) {
    let restricted = table
        .rows
        .iter()
        .filter(|r| r.case_category == Some(CaseCategory::RestrictedRoad))
        .count();
    if restricted > 0 {
        info!("Detected {restricted} routes with restricted/private road warnings");
    }
}
