//! SVG bar charts of the accuracy summary.

use std::path::Path;

use anyhow::Result;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use tracing::{debug, info, warn};

use crate::analyzers::types::AccuracyRow;
use crate::providers::Provider;

pub const ACCURACY_FILE: &str = "accuracy.svg";
pub const RELATIVE_TIME_FILE: &str = "relative_time.svg";

const CHART_SIZE: (u32, u32) = (1000, 600);
const HIGHLIGHT: RGBColor = RGBColor(0x74, 0xf1, 0x71);
const DEFAULT_BAR: RGBColor = RGBColor(0xff, 0xfe, 0xeb);

fn bar_color(provider: Provider, highlighted: Provider) -> RGBColor {
    if provider == highlighted { HIGHLIGHT } else { DEFAULT_BAR }
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let min = values.iter().copied().reduce(f64::min)?;
    let max = values.iter().copied().reduce(f64::max)?;
    Some((min, max))
}

/// Y-axis bounds for accuracy scores: 10 % of the data range on both
/// sides, at least 5 points, never below zero.
pub fn accuracy_y_range(values: &[f64]) -> Option<(f64, f64)> {
    let (min, max) = min_max(values)?;
    let padding = ((max - min) * 0.1).max(5.0);
    Some(((min - padding).max(0.0), max + padding))
}

/// Y-axis bounds for relative times: at least 8 points of padding, and the
/// axis starts at 95 when every value sits above it.
pub fn relative_time_y_range(values: &[f64]) -> Option<(f64, f64)> {
    let (min, max) = min_max(values)?;
    let padding = ((max - min) * 0.1).max(8.0);
    let mut lower = (min - padding).max(0.0);
    if min > 95.0 && lower > 95.0 {
        lower = 95.0;
    }
    Some((lower, max + padding))
}

struct BarChart<'a> {
    title: &'a str,
    y_desc: &'a str,
    y_range: (f64, f64),
    label_offset: f64,
}

fn draw_bar_chart(
    path: &Path,
    chart: BarChart<'_>,
    bars: &[(Provider, f64)],
    highlighted: Provider,
) -> Result<()> {
    let names: Vec<&str> = bars.iter().map(|(p, _)| p.display_name()).collect();
    let (y_min, y_max) = chart.y_range;

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut cartesian = ChartBuilder::on(&root)
        .caption(chart.title, ("sans-serif", 24).into_font())
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d((0..bars.len()).into_segmented(), y_min..y_max)?;

    let label = |value: &SegmentValue<usize>| match value {
        SegmentValue::CenterOf(i) => names.get(*i).map(|n| n.to_string()).unwrap_or_default(),
        _ => String::new(),
    };
    cartesian
        .configure_mesh()
        .disable_x_mesh()
        .bold_line_style(BLACK.mix(0.3))
        .light_line_style(TRANSPARENT)
        .x_desc("Provider")
        .y_desc(chart.y_desc)
        .x_labels(bars.len())
        .x_label_formatter(&label)
        .draw()?;

    cartesian.draw_series(bars.iter().enumerate().map(|(i, (provider, value))| {
        let mut bar = Rectangle::new(
            [(SegmentValue::Exact(i), y_min), (SegmentValue::Exact(i + 1), *value)],
            bar_color(*provider, highlighted).filled(),
        );
        bar.set_margin(0, 0, 12, 12);
        bar
    }))?;
    cartesian.draw_series(bars.iter().enumerate().map(|(i, (_, value))| {
        let mut outline = Rectangle::new(
            [(SegmentValue::Exact(i), y_min), (SegmentValue::Exact(i + 1), *value)],
            BLACK.stroke_width(1),
        );
        outline.set_margin(0, 0, 12, 12);
        outline
    }))?;

    let value_style =
        TextStyle::from(("sans-serif", 14).into_font()).pos(Pos::new(HPos::Center, VPos::Bottom));
    cartesian.draw_series(bars.iter().enumerate().map(|(i, (_, value))| {
        Text::new(
            format!("{value:.1}%"),
            (SegmentValue::CenterOf(i), *value + chart.label_offset),
            value_style.clone(),
        )
    }))?;

    root.present()?;
    debug!(path = %path.display(), bars = bars.len(), "Chart written");
    Ok(())
}

/// Bars with a finite value. Providers whose score could not be computed
/// are left out of the chart.
fn finite_bars(
    rows: &[AccuracyRow],
    value: impl Fn(&AccuracyRow) -> f64,
) -> Vec<(Provider, f64)> {
    rows.iter()
        .map(|r| (r.provider, value(r)))
        .filter(|(provider, v)| {
            let finite = v.is_finite();
            if !finite {
                warn!(
                    provider = provider.display_name(),
                    value = v,
                    "Leaving out non-finite bar"
                );
            }
            finite
        })
        .collect()
}

/// One bar per provider showing its accuracy score.
pub fn plot_accuracy_comparison(
    rows: &[AccuracyRow],
    highlighted: Provider,
    title: &str,
    path: &Path,
) -> Result<()> {
    let bars = finite_bars(rows, |r| r.accuracy);
    let values: Vec<f64> = bars.iter().map(|(_, v)| *v).collect();
    let Some(y_range) = accuracy_y_range(&values) else {
        info!("No accuracy data to plot");
        return Ok(());
    };
    draw_bar_chart(
        path,
        BarChart {
            title,
            y_desc: "Accuracy Score",
            y_range,
            label_offset: 1.0,
        },
        &bars,
        highlighted,
    )
}

/// One bar per provider showing its relative travel time.
pub fn plot_relative_time_comparison(
    rows: &[AccuracyRow],
    highlighted: Provider,
    title: &str,
    path: &Path,
) -> Result<()> {
    let bars = finite_bars(rows, |r| r.relative_time);
    let values: Vec<f64> = bars.iter().map(|(_, v)| *v).collect();
    let Some(y_range) = relative_time_y_range(&values) else {
        info!("No relative time data to plot");
        return Ok(());
    };
    draw_bar_chart(
        path,
        BarChart {
            title,
            y_desc: "Relative Time",
            y_range,
            label_offset: 2.0,
        },
        &bars,
        highlighted,
    )
}

/// Writes both charts into `dir`, creating it if needed.
pub fn plot_summary(rows: &[AccuracyRow], highlighted: Provider, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    plot_accuracy_comparison(
        rows,
        highlighted,
        "Provider Accuracy Comparison",
        &dir.join(ACCURACY_FILE),
    )?;
    plot_relative_time_comparison(
        rows,
        highlighted,
        "Provider Relative Time Comparison",
        &dir.join(RELATIVE_TIME_FILE),
    )?;
    info!(dir = %dir.display(), "Charts written");
    Ok(())
}
