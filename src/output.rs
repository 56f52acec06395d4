//! CSV input and output for result tables, plus log formatting of run
//! statistics.

use std::collections::HashMap;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tracing::{debug, info, warn};

use crate::analyzers::differences::format_relative_error;
use crate::analyzers::types::{AccuracyRow, PairErrors};
use crate::collect::{RoutePair, dedup_pairs};
use crate::error::{ComparisonError, Result};
use crate::fields::{
    self, CASE_CATEGORY, DEPARTURE_TIME, DESTINATION, Fields, ORIGIN, ProviderColumns,
};
use crate::parser::{format_departure_time, parse_departure_time};
use crate::providers::Provider;
use crate::stats::CollectionStats;
use crate::table::{CaseCategory, ProviderResult, ResultRow, ResultTable};

/// Logs collection statistics using Rust's debug pretty-print format.
pub fn print_pretty(stats: &CollectionStats) {
    debug!("{:#?}", stats);
}

/// Logs collection statistics as pretty-printed JSON.
pub fn print_json(stats: &CollectionStats) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(stats)?);
    Ok(())
}

/// Column positions of a CSV header, by name.
struct HeaderIndex(HashMap<String, usize>);

impl HeaderIndex {
    fn new(headers: &StringRecord) -> Self {
        Self(headers.iter().enumerate().map(|(i, h)| (h.trim().to_string(), i)).collect())
    }

    fn get(&self, name: &str) -> Option<usize> {
        self.0.get(name).copied()
    }

    fn require(&self, name: &str) -> Result<usize> {
        self.get(name).ok_or_else(|| ComparisonError::MissingColumn(name.to_string()))
    }
}

fn cell<'r>(record: &'r StringRecord, index: Option<usize>) -> Option<&'r str> {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Numeric cell as whole seconds or meters. Prior outputs may hold floats.
fn whole_cell(record: &StringRecord, index: Option<usize>, column: &str) -> Option<u64> {
    let value = cell(record, index)?;
    let parsed = value
        .parse::<u64>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as u64));
    if parsed.is_none() {
        warn!(column, value, "Ignoring non-numeric cell");
    }
    parsed
}

/// Reads the origin/destination pairs of an input file, dropping repeats.
pub fn read_route_pairs(path: &str) -> Result<Vec<RoutePair>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let header = HeaderIndex::new(reader.headers()?);
    let origin = header.require(ORIGIN)?;
    let destination = header.require(DESTINATION)?;

    let mut pairs = Vec::new();
    for record in reader.records() {
        let record = record?;
        let o = record.get(origin).unwrap_or_default().trim();
        let d = record.get(destination).unwrap_or_default().trim();
        pairs.push(RoutePair::parse(o, d)?);
    }

    let total = pairs.len();
    let pairs = dedup_pairs(pairs);
    debug!(path, total, unique = pairs.len(), "Route pairs read");
    Ok(pairs)
}

struct ProviderIndex {
    provider: Provider,
    travel_time: usize,
    distance: Option<usize>,
    snapped_origin: Option<usize>,
    snapped_destination: Option<usize>,
    warnings: Option<usize>,
}

impl ProviderIndex {
    fn new(header: &HeaderIndex, provider: Provider, columns: &ProviderColumns) -> Result<Self> {
        let optional = |name: &Option<String>| name.as_deref().and_then(|n| header.get(n));
        Ok(Self {
            provider,
            travel_time: header.require(&columns.travel_time)?,
            distance: header.get(&columns.distance),
            snapped_origin: optional(&columns.snapped_origin),
            snapped_destination: optional(&columns.snapped_destination),
            warnings: optional(&columns.warnings),
        })
    }

    fn read(&self, record: &StringRecord, columns: &ProviderColumns) -> ProviderResult {
        ProviderResult {
            travel_time: whole_cell(record, Some(self.travel_time), &columns.travel_time),
            distance: whole_cell(record, self.distance, &columns.distance),
            snapped_origin: cell(record, self.snapped_origin).map(String::from),
            snapped_destination: cell(record, self.snapped_destination).map(String::from),
            warnings: cell(record, self.warnings).map(String::from),
        }
    }
}

/// Reads a previously written result table. The key columns and every
/// provider's travel-time column are required; the rest are optional.
pub fn read_table(path: &str, providers: &[Provider], fields: &Fields) -> Result<ResultTable> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let header = HeaderIndex::new(reader.headers()?);
    let origin = header.require(ORIGIN)?;
    let destination = header.require(DESTINATION)?;
    let departure_time = header.require(DEPARTURE_TIME)?;
    let category = header.get(CASE_CATEGORY);

    let indexes = providers
        .iter()
        .map(|p| ProviderIndex::new(&header, *p, fields.columns(*p)))
        .collect::<Result<Vec<_>>>()?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let departure = parse_departure_time(record.get(departure_time).unwrap_or_default())?;
        let mut row = ResultRow::new(
            record.get(origin).unwrap_or_default().trim(),
            record.get(destination).unwrap_or_default().trim(),
            departure,
        );
        for index in &indexes {
            let result = index.read(&record, fields.columns(index.provider));
            row.results.insert(index.provider, result);
        }
        row.case_category = cell(&record, category)
            .map(str::parse::<CaseCategory>)
            .transpose()?;
        rows.push(row);
    }

    debug!(path, rows = rows.len(), "Result table read");
    Ok(ResultTable::new(providers.to_vec(), rows))
}

fn provider_cells(columns: &ProviderColumns, result: Option<&ProviderResult>) -> Vec<String> {
    let number = |v: Option<u64>| v.map(|v| v.to_string()).unwrap_or_default();
    let text = |v: Option<&String>| v.cloned().unwrap_or_default();
    let result = result.cloned().unwrap_or_default();

    let mut cells = vec![number(result.travel_time), number(result.distance)];
    if columns.snapped_origin.is_some() {
        cells.push(text(result.snapped_origin.as_ref()));
    }
    if columns.snapped_destination.is_some() {
        cells.push(text(result.snapped_destination.as_ref()));
    }
    if columns.warnings.is_some() {
        cells.push(text(result.warnings.as_ref()));
    }
    cells
}

/// Writes `table` to `path`, replacing any existing file.
///
/// Each entry of `differences` adds one integer relative-error column,
/// aligned with the table rows. A `case_category` column is added once rows
/// have been classified.
pub fn write_table(
    path: &str,
    table: &ResultTable,
    fields: &Fields,
    differences: &[PairErrors],
) -> Result<()> {
    let classified = table.rows.iter().any(|r| r.case_category.is_some());

    let mut header = fields.header(&table.providers);
    if classified {
        header.push(CASE_CATEGORY.to_string());
    }
    header.extend(
        differences
            .iter()
            .map(|d| fields::relative_error(d.target, d.competitor)),
    );

    let mut writer = WriterBuilder::new().from_path(path)?;
    writer.write_record(&header)?;

    for (i, row) in table.rows.iter().enumerate() {
        let mut record = vec![
            row.origin.clone(),
            row.destination.clone(),
            format_departure_time(&row.departure_time),
        ];
        for provider in &table.providers {
            record.extend(provider_cells(fields.columns(*provider), row.result(*provider)));
        }
        if classified {
            record.push(row.case_category.map(|c| c.to_string()).unwrap_or_default());
        }
        for errors in differences {
            record.push(format_relative_error(errors.relative.get(i).copied().flatten()));
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    info!(path, rows = table.len(), "Results written");
    Ok(())
}

const SUMMARY_HEADER: [&str; 3] = ["Provider", "Accuracy Score", "Relative Time"];

/// Writes the accuracy summary with `Provider`, `Accuracy Score` and
/// `Relative Time` columns. The header is written even when there is
/// nothing to summarise.
pub fn write_summary(path: &str, rows: &[AccuracyRow]) -> Result<()> {
    if rows.is_empty() {
        warn!(path, "Accuracy summary is empty");
    }
    let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(SUMMARY_HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!(path, providers = rows.len(), "Summary written");
    Ok(())
}
