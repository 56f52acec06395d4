//! Per-provider accuracy score and relative travel time.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::info;

use super::types::{AccuracyRow, Scoring};
use super::utility::mean;
use crate::providers::Provider;
use crate::table::ResultTable;

/// Descending by accuracy, NaN last; ties keep input order.
fn rank(mut rows: Vec<AccuracyRow>) -> Vec<AccuracyRow> {
    rows.sort_by(|a, b| match (a.accuracy.is_nan(), b.accuracy.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.accuracy.total_cmp(&a.accuracy),
    });
    rows
}

/// Percentage error of `value` against `reference`. 0/0 has none; a zero
/// reference otherwise gives an infinite error.
fn percentage_error(value: u64, reference: u64) -> Option<f64> {
    if value == 0 && reference == 0 {
        return None;
    }
    Some((value as f64 - reference as f64) / reference as f64 * 100.0)
}

/// Scores every provider against `baseline`.
///
/// For each other provider the per-row percentage error is
/// `(value - baseline) / baseline * 100`; accuracy is `100 - mean(|error|)`
/// and relative time is `100 + mean(error)`. The baseline scores exactly 100
/// on both. Empty when the baseline is not part of the table.
pub fn calculate_baseline_accuracies(
    table: &ResultTable,
    providers: &[Provider],
    baseline: Provider,
) -> Vec<AccuracyRow> {
    if !table.has_provider(baseline) || !providers.contains(&baseline) {
        return Vec::new();
    }

    let rows = providers
        .iter()
        .map(|provider| {
            if *provider == baseline {
                return AccuracyRow {
                    provider: baseline,
                    accuracy: 100.0,
                    relative_time: 100.0,
                };
            }

            let errors: Vec<f64> = table
                .rows
                .iter()
                .filter_map(|row| {
                    percentage_error(row.travel_time(*provider)?, row.travel_time(baseline)?)
                })
                .collect();
            let absolute: Vec<f64> = errors.iter().map(|e| e.abs()).collect();

            AccuracyRow {
                provider: *provider,
                accuracy: 100.0 - mean(&absolute),
                relative_time: 100.0 + mean(&errors),
            }
        })
        .collect();

    rank(rows)
}

/// Scores every provider against the average of the others on each row:
/// accuracy `100 * (1 - |value - others| / value)` and relative time
/// `100 * value / others`, each averaged over rows. Rows where any provider
/// is missing are skipped, as is a provider's score on a row where it and
/// its peers are all zero. Needs at least two providers.
pub fn calculate_peer_accuracies(table: &ResultTable, providers: &[Provider]) -> Vec<AccuracyRow> {
    if providers.len() < 2 {
        return Vec::new();
    }

    let mut accuracy: BTreeMap<Provider, Vec<f64>> = BTreeMap::new();
    let mut relative: BTreeMap<Provider, Vec<f64>> = BTreeMap::new();

    for row in &table.rows {
        let Some(values) = providers
            .iter()
            .map(|p| row.travel_time(*p).map(|v| v as f64))
            .collect::<Option<Vec<f64>>>()
        else {
            continue;
        };
        let total: f64 = values.iter().sum();

        for (provider, value) in providers.iter().zip(&values) {
            let others = (total - value) / (values.len() - 1) as f64;
            let score = (1.0 - (value - others).abs() / value) * 100.0;
            if !score.is_nan() {
                accuracy.entry(*provider).or_default().push(score);
            }
            let ratio = value / others * 100.0;
            if !ratio.is_nan() {
                relative.entry(*provider).or_default().push(ratio);
            }
        }
    }

    let rows = providers
        .iter()
        .filter_map(|p| {
            Some(AccuracyRow {
                provider: *p,
                accuracy: mean(accuracy.get(p)?),
                relative_time: mean(relative.get(p)?),
            })
        })
        .collect();

    rank(rows)
}

pub fn calculate_accuracies(
    table: &ResultTable,
    providers: &[Provider],
    scoring: Scoring,
    baseline: Provider,
) -> Vec<AccuracyRow> {
    match scoring {
        Scoring::Baseline => calculate_baseline_accuracies(table, providers, baseline),
        Scoring::PeerAverage => calculate_peer_accuracies(table, providers),
    }
}

pub fn log_accuracies(rows: &[AccuracyRow], title: &str) {
    if rows.is_empty() {
        info!("{title}: no data");
        return;
    }
    info!("{title}:");
    for row in rows {
        info!(
            "  {:<12} accuracy {:>7.2}  relative time {:>7.2}",
            row.provider.display_name(),
            row.accuracy,
            row.relative_time
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_departure_time;
    use crate::table::{ProviderResult, ResultRow};

    const PROVIDERS: [Provider; 4] = [
        Provider::Google,
        Provider::TomTom,
        Provider::Here,
        Provider::Osrm,
    ];
    const PAIR: [Provider; 2] = [Provider::Google, Provider::TravelTime];
    const PEERS: [Provider; 3] = [Provider::Google, Provider::TomTom, Provider::Here];

    fn table(columns: &[(Provider, [u64; 3])]) -> ResultTable {
        let departure = parse_departure_time("2024-01-01 09:00:00+0000").unwrap();
        let rows = (0..3)
            .map(|i| {
                let row = ResultRow::new(format!("{i},0"), "0,0", departure);
                columns.iter().fold(row, |row, (p, values)| {
                    row.with_result(*p, ProviderResult {
                        travel_time: Some(values[i]),
                        ..Default::default()
                    })
                })
            })
            .collect();
        ResultTable::new(columns.iter().map(|(p, _)| *p).collect(), rows)
    }

    fn fixture() -> ResultTable {
        table(&[
            (Provider::Google, [100, 200, 300]),
            (Provider::TomTom, [110, 190, 310]),
            (Provider::Here, [90, 210, 290]),
            (Provider::Osrm, [105, 195, 305]),
        ])
    }

    #[test]
    fn test_baseline_accuracies() {
        let rows = calculate_baseline_accuracies(&fixture(), &PROVIDERS, Provider::Google);

        let order: Vec<_> = rows.iter().map(|r| r.provider).collect();
        assert_eq!(order, vec![Provider::Google, Provider::Osrm, Provider::TomTom, Provider::Here]);

        let accuracy: Vec<_> = rows.iter().map(|r| r.accuracy.round()).collect();
        assert_eq!(accuracy, vec![100.0, 97.0, 94.0, 94.0]);

        let relative: Vec<_> = rows.iter().map(|r| r.relative_time.round()).collect();
        assert_eq!(relative, vec![100.0, 101.0, 103.0, 97.0]);
    }

    #[test]
    fn test_baseline_is_exactly_100() {
        let rows = calculate_baseline_accuracies(&fixture(), &PROVIDERS, Provider::Google);
        assert_eq!(rows[0].accuracy, 100.0);
        assert_eq!(rows[0].relative_time, 100.0);
    }

    #[test]
    fn test_zero_travel_times_on_both_sides_are_skipped() {
        let table = table(&[
            (Provider::Google, [0, 200, 300]),
            (Provider::TravelTime, [0, 210, 300]),
        ]);
        let rows = calculate_baseline_accuracies(&table, &PAIR, Provider::Google);

        assert_eq!(rows[0].provider, Provider::Google);
        let traveltime = &rows[1];
        assert_eq!(traveltime.provider, Provider::TravelTime);
        assert_eq!(traveltime.accuracy, 97.5);
        assert_eq!(traveltime.relative_time, 102.5);
    }

    #[test]
    fn test_zero_baseline_gives_infinite_error() {
        let table = table(&[
            (Provider::Google, [0, 200, 300]),
            (Provider::TravelTime, [10, 200, 300]),
        ]);
        let rows = calculate_baseline_accuracies(&table, &PAIR, Provider::Google);
        assert_eq!(rows[1].accuracy, f64::NEG_INFINITY);
    }

    #[test]
    fn test_rank_puts_nan_last() {
        let row = |provider, accuracy| AccuracyRow {
            provider,
            accuracy,
            relative_time: 100.0,
        };
        let ranked = rank(vec![
            row(Provider::TravelTime, f64::NAN),
            row(Provider::Google, 100.0),
            row(Provider::Here, 90.0),
        ]);
        let order: Vec<_> = ranked.iter().map(|r| r.provider).collect();
        assert_eq!(order, vec![Provider::Google, Provider::Here, Provider::TravelTime]);
    }

    #[test]
    fn test_missing_baseline_gives_empty_result() {
        let table = table(&[(Provider::TomTom, [1, 2, 3]), (Provider::Here, [1, 2, 3])]);
        let providers = [Provider::TomTom, Provider::Here];
        let rows = calculate_baseline_accuracies(&table, &providers, Provider::Google);
        assert!(rows.is_empty());
    }

    #[test]
    fn test_peer_accuracies() {
        let table = table(&[
            (Provider::Google, [100, 100, 100]),
            (Provider::TomTom, [100, 100, 100]),
            (Provider::Here, [200, 200, 200]),
        ]);
        let rows = calculate_peer_accuracies(&table, &PEERS);

        // Google and TomTom: others average 150, 1 - 50/100 = 50%.
        // HERE: others average 100, 1 - 100/200 = 50%.
        assert!(rows.iter().all(|r| (r.accuracy - 50.0).abs() < 1e-9));
        assert_eq!(rows[0].provider, Provider::Google);
        let here = rows.iter().find(|r| r.provider == Provider::Here).unwrap();
        assert!((here.relative_time - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_peer_accuracies_skip_all_zero_rows() {
        let table = table(&[
            (Provider::Google, [0, 100, 100]),
            (Provider::TomTom, [0, 100, 100]),
            (Provider::Here, [0, 200, 200]),
        ]);
        let rows = calculate_peer_accuracies(&table, &PEERS);

        assert!(rows.iter().all(|r| (r.accuracy - 50.0).abs() < 1e-9));
        assert!(rows.iter().all(|r| !r.relative_time.is_nan()));
    }

    #[test]
    fn test_peer_accuracies_need_two_providers() {
        let table = table(&[(Provider::Google, [1, 2, 3])]);
        assert!(calculate_peer_accuracies(&table, &[Provider::Google]).is_empty());
    }

    #[test]
    fn test_accuracy_row_serializes_display_names() {
        let row = AccuracyRow {
            provider: Provider::Here,
            accuracy: 93.5,
            relative_time: 97.0,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["Provider"], "HERE");
        assert_eq!(json["Accuracy Score"], 93.5);
    }
}
