//! Pairwise travel-time errors and their quantiles.

use tracing::info;

use super::types::{PairErrors, QuantileErrorResult};
use super::utility::{mean, quantile_higher};
use crate::providers::Provider;
use crate::table::ResultTable;

/// `|c - t|` and that difference as a percentage of `c`. A zero competitor
/// value gives an infinite relative error; 0/0 gives none.
fn row_errors(target: Option<u64>, competitor: Option<u64>) -> (Option<f64>, Option<f64>) {
    let (Some(t), Some(c)) = (target, competitor) else {
        return (None, None);
    };
    let absolute = t.abs_diff(c) as f64;
    let relative = absolute / c as f64 * 100.0;
    (Some(absolute), (!relative.is_nan()).then_some(relative))
}

fn pair_errors(table: &ResultTable, target: Provider, competitor: Provider) -> PairErrors {
    let (absolute, relative) = table
        .rows
        .iter()
        .map(|row| row_errors(row.travel_time(target), row.travel_time(competitor)))
        .unzip();
    PairErrors {
        target,
        competitor,
        absolute,
        relative,
    }
}

/// Errors of `target` against each of `competitors`.
pub fn calculate_differences(
    table: &ResultTable,
    target: Provider,
    competitors: &[Provider],
) -> Vec<PairErrors> {
    competitors
        .iter()
        .filter(|c| **c != target)
        .map(|c| pair_errors(table, target, *c))
        .collect()
}

/// Every provider as target against every other provider, each ordered
/// pair once.
pub fn calculate_all_pair_differences(
    table: &ResultTable,
    providers: &[Provider],
) -> Vec<PairErrors> {
    providers
        .iter()
        .flat_map(|target| calculate_differences(table, *target, providers))
        .collect()
}

pub fn mean_relative_error(errors: &PairErrors) -> f64 {
    mean(&errors.relative_values())
}

/// Error at quantile `q` using the "higher" rule. `None` when the pair has
/// no rows with both values.
pub fn calculate_quantiles(errors: &PairErrors, q: f64) -> Option<QuantileErrorResult> {
    let absolute = quantile_higher(&errors.absolute_values(), q)?;
    let relative = quantile_higher(&errors.relative_values(), q)?;
    Some(QuantileErrorResult {
        absolute_error: absolute.trunc(),
        relative_error: relative.trunc(),
    })
}

/// Relative error as exported: truncated to an integer, `inf` when infinite,
/// empty when missing.
pub fn format_relative_error(value: Option<f64>) -> String {
    match value {
        None => String::new(),
        Some(v) if v.is_infinite() => "inf".to_string(),
        Some(v) => format!("{}", v.trunc() as i64),
    }
}

pub fn log_results(differences: &[PairErrors], quantile: f64) {
    let mut current_target = None;
    for errors in differences {
        let target = errors.target.display_name();
        let competitor = errors.competitor.display_name();
        if current_target != Some(errors.target) {
            info!("Comparing {target} to other providers:");
            current_target = Some(errors.target);
        }

        info!(
            "Mean relative error compared to {competitor} API: {:.2}%",
            mean_relative_error(errors)
        );
        match calculate_quantiles(errors, quantile) {
            Some(q) => info!(
                "{}% of {target} results differ from {competitor} API by less than {}%",
                (quantile * 100.0).round() as i64,
                q.relative_error
            ),
            None => info!("No rows to compare {target} with {competitor}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_departure_time;
    use crate::table::{ProviderResult, ResultRow};

    fn table(target: &[u64], competitor: &[u64]) -> ResultTable {
        let departure = parse_departure_time("2024-01-01 09:00:00+0000").unwrap();
        let rows = target
            .iter()
            .zip(competitor)
            .enumerate()
            .map(|(i, (t, c))| {
                let tt = |v: u64| ProviderResult {
                    travel_time: Some(v),
                    ..Default::default()
                };
                ResultRow::new(format!("{i},0"), "0,0", departure)
                    .with_result(Provider::TravelTime, tt(*t))
                    .with_result(Provider::Google, tt(*c))
            })
            .collect();
        ResultTable::new(vec![Provider::TravelTime, Provider::Google], rows)
    }

    #[test]
    fn test_calculate_differences() {
        let table = table(&[90, 210, 290], &[100, 200, 300]);
        let diffs = calculate_differences(&table, Provider::TravelTime, &[Provider::Google]);

        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].absolute, vec![Some(10.0), Some(10.0), Some(10.0)]);
        assert_eq!(diffs[0].relative[0], Some(10.0));
        assert_eq!(diffs[0].relative[1], Some(5.0));
        assert!((diffs[0].relative[2].unwrap() - 10.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_competitor_gives_infinite_relative_error() {
        let table = table(&[90, 0], &[0, 0]);
        let diffs = calculate_differences(&table, Provider::TravelTime, &[Provider::Google]);

        assert_eq!(diffs[0].absolute[0], Some(90.0));
        assert_eq!(diffs[0].relative[0], Some(f64::INFINITY));
        assert_eq!(diffs[0].relative[1], None);
        assert_eq!(mean_relative_error(&diffs[0]), f64::INFINITY);
    }

    #[test]
    fn test_target_is_not_compared_with_itself() {
        let table = table(&[90], &[100]);
        let competitors = [Provider::TravelTime, Provider::Google];
        let diffs = calculate_differences(&table, Provider::TravelTime, &competitors);
        assert_eq!(diffs.len(), 1);
    }

    #[test]
    fn test_all_pairs() {
        let table = table(&[90, 210], &[100, 200]);
        let diffs = calculate_all_pair_differences(&table, &table.providers);

        let pairs: Vec<_> = diffs.iter().map(|d| (d.target, d.competitor)).collect();
        assert_eq!(
            pairs,
            vec![
                (Provider::TravelTime, Provider::Google),
                (Provider::Google, Provider::TravelTime)
            ]
        );
        // Relative to traveltime: 10/90 and 10/210.
        assert!((diffs[1].relative[0].unwrap() - 1000.0 / 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_calculate_quantiles_truncates() {
        let table = table(&[90, 210, 290], &[100, 200, 300]);
        let diffs = calculate_differences(&table, Provider::TravelTime, &[Provider::Google]);

        let q = calculate_quantiles(&diffs[0], 0.9).unwrap();
        assert_eq!(q.absolute_error, 10.0);
        assert_eq!(q.relative_error, 10.0);

        let median = calculate_quantiles(&diffs[0], 0.5).unwrap();
        assert_eq!(median.relative_error, 5.0);
    }

    #[test]
    fn test_calculate_quantiles_empty() {
        let table = table(&[], &[]);
        let diffs = calculate_differences(&table, Provider::TravelTime, &[Provider::Google]);
        assert_eq!(calculate_quantiles(&diffs[0], 0.9), None);
    }

    #[test]
    fn test_format_relative_error() {
        assert_eq!(format_relative_error(Some(3.3333)), "3");
        assert_eq!(format_relative_error(Some(10.0)), "10");
        assert_eq!(format_relative_error(Some(f64::INFINITY)), "inf");
        assert_eq!(format_relative_error(None), "");
    }
}
