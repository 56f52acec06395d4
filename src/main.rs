//! CLI entry point: fetches travel times from every configured routing
//! provider, or reads them from a prior run, then classifies, compares and
//! charts them.

use std::ffi::OsStr;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use clap::Parser;
use drive_time_comparisons::analyzers::analyzer::{AnalysisOptions, run_analysis};
use drive_time_comparisons::analyzers::outliers::OutlierConfig;
use drive_time_comparisons::analyzers::snapping::BAD_SNAP_THRESHOLD_M;
use drive_time_comparisons::analyzers::types::Scoring;
use drive_time_comparisons::collect::collect_travel_times;
use drive_time_comparisons::config::{Providers, parse_config};
use drive_time_comparisons::fields::Fields;
use drive_time_comparisons::handlers::{Mode, ensure_mode_supported, initialize_request_handlers};
use drive_time_comparisons::output::{
    print_json, print_pretty, read_route_pairs, read_table, write_summary, write_table,
};
use drive_time_comparisons::parser::{generate_time_instants, parse_time_zone};
use drive_time_comparisons::plot::plot_summary;
use drive_time_comparisons::providers::Provider;
use drive_time_comparisons::table::ResultTable;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser, Debug)]
#[command(name = "drive_time_comparisons")]
#[command(about = "Compare travel times across routing APIs", long_about = None)]
struct Cli {
    /// CSV with `origin` and `destination` columns ("lat,lng")
    #[arg(long)]
    input: String,

    /// CSV file the merged results are written to
    #[arg(long)]
    output: String,

    /// Departure date, YYYY-MM-DD
    #[arg(long, required_unless_present = "skip_data_gathering")]
    date: Option<String>,

    /// Comma-separated departure times, HH:MM
    #[arg(long, required_unless_present = "skip_data_gathering")]
    departure_times: Option<String>,

    /// IANA time zone the departure times are given in
    #[arg(long, required_unless_present = "skip_data_gathering")]
    time_zone_id: Option<String>,

    #[arg(long, default_value = "./config.json")]
    config: String,

    /// Treat the input as a prior output and only run the analysis
    #[arg(long, default_value_t = false)]
    skip_data_gathering: bool,

    #[arg(long, default_value_t = false)]
    skip_plotting: bool,

    #[arg(long, value_enum, default_value_t = Mode::Driving)]
    mode: Mode,

    /// Quantile reported for pairwise errors
    #[arg(long, default_value_t = 0.90)]
    quantile: f64,

    #[arg(long, value_enum, default_value_t = Scoring::Baseline)]
    scoring: Scoring,

    /// Reference provider for baseline scoring
    #[arg(long, default_value = "google")]
    baseline: Provider,

    /// Compare every provider with every other, not only the base provider
    #[arg(long, default_value_t = false)]
    all_pairs: bool,

    /// Optional CSV for the accuracy summary
    #[arg(long)]
    summary_output: Option<String>,

    #[arg(long, default_value_t = 3.0)]
    outlier_ratio: f64,

    #[arg(long, default_value_t = 2)]
    outlier_min_providers: usize,

    #[arg(long, default_value_t = false)]
    no_outlier_detection: bool,

    /// Distance in meters beyond which a snapped point counts as bad
    #[arg(long, default_value_t = BAD_SNAP_THRESHOLD_M)]
    snap_threshold: f64,

    /// Directory the SVG charts are written to
    #[arg(long, default_value = ".")]
    plot_dir: String,
}

impl Cli {
    fn analysis_options(&self, target: Provider) -> Result<AnalysisOptions> {
        ensure!(
            self.quantile > 0.0 && self.quantile <= 1.0,
            "--quantile must be in (0, 1], got {}",
            self.quantile
        );
        ensure!(self.outlier_ratio >= 1.0, "--outlier-ratio must be at least 1");
        ensure!(self.outlier_min_providers >= 2, "--outlier-min-providers must be at least 2");
        ensure!(self.snap_threshold >= 0.0, "--snap-threshold must not be negative");

        Ok(AnalysisOptions {
            target,
            quantile: self.quantile,
            scoring: self.scoring,
            baseline: self.baseline,
            all_pairs: self.all_pairs,
            outliers: OutlierConfig {
                enabled: !self.no_outlier_detection,
                ratio_threshold: self.outlier_ratio,
                min_providers: self.outlier_min_providers,
            },
            snap_threshold: self.snap_threshold,
        })
    }
}

/// Colored stderr output plus a JSON log file that rolls daily.
fn init_tracing() -> WorkerGuard {
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/drive_time_comparisons.log".to_string());
    let log_dir = Path::new(&log_file_path).parent().unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("drive_time_comparisons.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive(LevelFilter::INFO.into()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive(LevelFilter::DEBUG.into()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    guard
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let _file_guard = init_tracing();

    let cli = Cli::parse();
    let providers = parse_config(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config))?;
    let options = cli.analysis_options(providers.base.provider)?;
    let fields = Fields::default();

    let table = if cli.skip_data_gathering {
        info!(input = %cli.input, "Skipping data gathering");
        read_table(&cli.input, &providers.all_names(), &fields)
            .with_context(|| format!("failed to read results from {}", cli.input))?
    } else {
        match gather(&cli, &providers, &fields).await? {
            Some(table) => table,
            None => return Ok(()),
        }
    };

    let Some(report) = run_analysis(&table, &fields, &options) else {
        return Ok(());
    };

    write_table(&cli.output, &report.table, &fields, &report.differences)
        .with_context(|| format!("failed to write results to {}", cli.output))?;

    if let Some(path) = &cli.summary_output {
        write_summary(path, &report.accuracy)
            .with_context(|| format!("failed to write summary to {path}"))?;
    }

    if cli.skip_plotting {
        info!("Skipping plots");
    } else {
        plot_summary(&report.accuracy, options.target, Path::new(&cli.plot_dir))
            .context("failed to plot summary")?;
    }

    Ok(())
}

/// Fetches every route at every departure time from every provider and
/// writes the merged table. `None` when the input has no routes.
#[tracing::instrument(skip_all, fields(input = %cli.input, mode = %cli.mode))]
async fn gather(cli: &Cli, providers: &Providers, fields: &Fields) -> Result<Option<ResultTable>> {
    let pairs = read_route_pairs(&cli.input)
        .with_context(|| format!("failed to read routes from {}", cli.input))?;
    if pairs.is_empty() {
        info!("Provided input file is empty. Exiting.");
        return Ok(None);
    }

    let tz = parse_time_zone(cli.time_zone_id.as_deref().unwrap_or_default())?;
    let instants = generate_time_instants(
        cli.departure_times.as_deref().unwrap_or_default(),
        cli.date.as_deref().unwrap_or_default(),
        &tz,
    )?;

    let handlers = initialize_request_handlers(providers)?;
    ensure_mode_supported(handlers.values(), cli.mode)?;

    let names = providers.all_names();
    let (table, stats) = collect_travel_times(&pairs, &instants, &handlers, &names, cli.mode).await;
    print_pretty(&stats);
    print_json(&stats)?;

    write_table(&cli.output, &table, fields, &[])
        .with_context(|| format!("failed to write results to {}", cli.output))?;
    Ok(Some(table))
}
