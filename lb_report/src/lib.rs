//! Report generation for load-balancer simulation results.
//!
//! A results file holds a queue-size time series followed by a per-server throughput summary.
//! This crate loads it into typed rows, splits the rows at the first server entry and renders
//! one chart per section.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

pub mod chart;
pub mod config;
pub mod display;
mod font;
pub mod inspect;
pub mod loader;
pub mod sections;

pub use chart::{
    render_queue_chart, render_throughput_chart, ChartFormat, ChartOptions, QUEUE_CHART_STEM,
    THROUGHPUT_CHART_STEM,
};
pub use config::{ReportConfig, DEFAULT_CONFIG_FILE, DEFAULT_INPUT};
pub use display::Viewer;
pub use inspect::{inspect_file, inspect_rows, Inspection};
pub use loader::{load_rows, load_rows_from_reader, Row};
pub use sections::{
    boundary_index, first_order_violation, split_sections, split_sections_checked,
    ServerSummary, Sections, TimeSeriesPoint,
};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("input file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("missing required column(s): {}", .missing.join(", "))]
    Schema { missing: Vec<String> },
    #[error("row {row}: column '{column}' has non-numeric value '{value}'")]
    Parse {
        row: usize,
        column: String,
        value: String,
    },
    #[error("row {row} has no server but follows the summary block")]
    SectionOrder { row: usize },
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("chart rendering failed: {0}")]
    Render(String),
    #[error("chart viewer failed: {0}")]
    Display(String),
    #[error("invalid config {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },
}

/// Outcome of a full report run.
#[derive(Clone, Debug)]
pub struct Report {
    pub total_rows: usize,
    pub sections: Sections,
    pub charts: Vec<PathBuf>,
}

/// Load and split the configured input without rendering anything.
pub fn build_sections(config: &ReportConfig) -> Result<(usize, Sections), ReportError> {
    let rows = load_rows(&config.input)?;
    let sections = split_sections_checked(&rows, config.strict_order)?;
    info!(
        "Loaded {} rows from {}: {} time-series points, {} server entries",
        rows.len(),
        config.input.display(),
        sections.time_series.len(),
        sections.summary.len()
    );
    Ok((rows.len(), sections))
}

/// Run load, split, render(queue), render(throughput), showing each chart unless headless.
pub fn run_report(config: &ReportConfig) -> Result<Report, ReportError> {
    let (total_rows, sections) = build_sections(config)?;

    fs::create_dir_all(&config.output_dir).map_err(|source| ReportError::Io {
        path: config.output_dir.clone(),
        source,
    })?;

    let options = config.chart_options();
    let viewer = config.viewer();
    let mut charts = Vec::with_capacity(2);

    let queue_path = chart_path(&config.output_dir, QUEUE_CHART_STEM, options.format);
    let written = render_queue_chart(&sections.time_series, &queue_path, &options)?;
    info!("Wrote queue chart: {}", written.display());
    present(config, &viewer, &written)?;
    charts.push(written);

    let throughput_path = chart_path(&config.output_dir, THROUGHPUT_CHART_STEM, options.format);
    let written = render_throughput_chart(&sections.summary, &throughput_path, &options)?;
    info!("Wrote throughput chart: {}", written.display());
    present(config, &viewer, &written)?;
    charts.push(written);

    Ok(Report {
        total_rows,
        sections,
        charts,
    })
}

pub fn chart_path(dir: &Path, stem: &str, format: ChartFormat) -> PathBuf {
    dir.join(format!("{}.{}", stem, format.extension()))
}

fn present(config: &ReportConfig, viewer: &Viewer, path: &Path) -> Result<(), ReportError> {
    if config.headless {
        debug!("Headless mode: not opening {}", path.display());
        return Ok(());
    }
    viewer.show(path)
}
