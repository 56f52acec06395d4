//! Concurrent fetching and reconciliation.
//!
//! One request is issued per (route pair, departure instant, provider). All
//! requests of a run are polled together on the current task, so they only
//! interleave at network I/O; each waits on its own provider's token bucket.
//! Every answer becomes a single-provider row fragment, and fragments with
//! the same (origin, destination, departure time) key are folded into one
//! row.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, FixedOffset};
use futures::future::join_all;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::handlers::{Mode, RateLimitedHandler};
use crate::parser::Coordinates;
use crate::providers::Provider;
use crate::stats::CollectionStats;
use crate::table::{ProviderResult, ResultRow, ResultTable, RowKey};

/// One origin/destination pair from the input, with the original strings
/// kept as row keys.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePair {
    pub origin: String,
    pub destination: String,
    pub origin_coords: Coordinates,
    pub destination_coords: Coordinates,
}

impl RoutePair {
    pub fn parse(origin: &str, destination: &str) -> Result<Self> {
        Ok(Self {
            origin_coords: origin.parse()?,
            destination_coords: destination.parse()?,
            origin: origin.to_string(),
            destination: destination.to_string(),
        })
    }
}

/// Drops repeated (origin, destination) pairs, keeping first occurrences in order.
pub fn dedup_pairs(pairs: Vec<RoutePair>) -> Vec<RoutePair> {
    let mut seen = HashSet::new();
    pairs
        .into_iter()
        .filter(|p| seen.insert((p.origin.clone(), p.destination.clone())))
        .collect()
}

/// A single pending request.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTask<'a> {
    pub pair: &'a RoutePair,
    pub departure_time: DateTime<FixedOffset>,
    pub provider: Provider,
}

/// Cross product of pairs, instants and providers, in that nesting order.
pub fn generate_tasks<'a>(
    pairs: &'a [RoutePair],
    instants: &[DateTime<FixedOffset>],
    providers: &[Provider],
) -> Vec<FetchTask<'a>> {
    pairs
        .iter()
        .flat_map(|pair| {
            instants.iter().flat_map(move |departure_time| {
                providers.iter().map(move |provider| FetchTask {
                    pair,
                    departure_time: *departure_time,
                    provider: *provider,
                })
            })
        })
        .collect()
}

/// Runs one request. Failures are logged and turn into an empty result so
/// the row still carries a (null) entry for the provider.
async fn fetch_travel_time(
    task: FetchTask<'_>,
    handler: &RateLimitedHandler,
    mode: Mode,
) -> (ResultRow, bool) {
    let FetchTask {
        pair,
        departure_time,
        provider,
    } = task;

    debug!(
        %provider,
        origin = %pair.origin,
        destination = %pair.destination,
        %departure_time,
        "Sending request"
    );
    let outcome = handler
        .send_request(pair.origin_coords, pair.destination_coords, departure_time, mode)
        .await;
    debug!(
        %provider,
        origin = %pair.origin,
        destination = %pair.destination,
        %departure_time,
        "Finished request"
    );

    let (result, ok) = match outcome {
        Ok(result) => (result.into_provider_result(), true),
        Err(e) => {
            error!(
                provider = provider.display_name(),
                origin = %pair.origin,
                destination = %pair.destination,
                error = %e,
                "Request failed"
            );
            (ProviderResult::default(), false)
        }
    };

    let row = ResultRow::new(&pair.origin, &pair.destination, departure_time)
        .with_result(provider, result);
    (row, ok)
}

/// Folds fragments into one row per key, ordered by key.
pub fn merge_rows(fragments: impl IntoIterator<Item = ResultRow>) -> Vec<ResultRow> {
    let mut merged: BTreeMap<RowKey, ResultRow> = BTreeMap::new();
    for row in fragments {
        let key = row.key();
        let row = match merged.remove(&key) {
            Some(existing) => existing.merge(row),
            None => row,
        };
        merged.insert(key, row);
    }
    merged.into_values().collect()
}

/// Fetches every (pair, instant, provider) combination and reconciles the
/// answers into a table with one row per (pair, instant).
#[tracing::instrument(skip_all, fields(pairs = pairs.len(), instants = instants.len(), %mode))]
pub async fn collect_travel_times(
    pairs: &[RoutePair],
    instants: &[DateTime<FixedOffset>],
    handlers: &BTreeMap<Provider, RateLimitedHandler>,
    providers: &[Provider],
    mode: Mode,
) -> (ResultTable, CollectionStats) {
    let tasks: Vec<_> = generate_tasks(pairs, instants, providers)
        .into_iter()
        .filter(|task| handlers.contains_key(&task.provider))
        .collect();

    let names: Vec<&str> = providers.iter().map(|p| p.display_name()).collect();
    info!("Sending {} requests to {} APIs", tasks.len(), names.join(", "));

    let futures = tasks
        .into_iter()
        .filter_map(|task| handlers.get(&task.provider).map(|h| fetch_travel_time(task, h, mode)));
    let outcomes = join_all(futures).await;

    let mut stats = CollectionStats::new();
    let mut fragments = Vec::with_capacity(outcomes.len());
    for (row, ok) in outcomes {
        for provider in row.results.keys() {
            if ok {
                stats.record_success(*provider);
            } else {
                stats.record_failure(*provider);
            }
        }
        fragments.push(row);
    }

    let table = ResultTable::new(providers.to_vec(), merge_rows(fragments));
    let stats = stats.finish();
    info!(
        rows = table.len(),
        failed = stats.failed_requests,
        failed_pct = %format!("{:.2}", stats.failure_pct()),
        "Collection finished"
    );
    (table, stats)
}
