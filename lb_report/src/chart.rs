use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use plotters::style::{FontDesc, FontFamily, FontStyle, FontTransform};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::font::FontSafeBackend;
use crate::sections::{ServerSummary, TimeSeriesPoint};
use crate::ReportError;

pub const QUEUE_CHART_STEM: &str = "queue_size_over_time";
pub const THROUGHPUT_CHART_STEM: &str = "requests_handled";

const QUEUE_TITLE: &str = "Queue Size Over Time";
const QUEUE_LEGEND: &str = "Queue Size Over Time";
const THROUGHPUT_TITLE: &str = "Requests Handled by Each Server";

const LEGEND_PAD: i32 = 10;
const LEGEND_SAMPLE: i32 = 30;

const LINE_COLOR: RGBColor = RGBColor(31, 119, 180);
const BAR_COLOR: RGBColor = RGBColor(135, 206, 235);

type DrawResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChartFormat {
    Png,
    Svg,
}

impl Default for ChartFormat {
    fn default() -> Self {
        ChartFormat::Png
    }
}

impl ChartFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ChartFormat::Png => "png",
            ChartFormat::Svg => "svg",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChartOptions {
    pub format: ChartFormat,
    pub width: u32,
    pub height: u32,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            format: ChartFormat::Png,
            width: 1000,
            height: 500,
        }
    }
}

/// Line chart of queue size per clock cycle, written to `path`.
///
/// Cycles with no queue size break the line instead of being drawn as zero.
pub fn render_queue_chart(
    points: &[TimeSeriesPoint],
    path: &Path,
    options: &ChartOptions,
) -> Result<PathBuf, ReportError> {
    let size = (options.width, options.height);
    write_staged(path, options.format, |staged| match options.format {
        ChartFormat::Png => {
            let root = FontSafeBackend::new(BitMapBackend::new(staged, size)).into_drawing_area();
            draw_queue_chart(root, points)
        }
        ChartFormat::Svg => {
            let root = FontSafeBackend::new(SVGBackend::new(staged, size)).into_drawing_area();
            draw_queue_chart(root, points)
        }
    })
}

/// Bar chart with one bar per summary entry in file order, written to `path`.
pub fn render_throughput_chart(
    summary: &[ServerSummary],
    path: &Path,
    options: &ChartOptions,
) -> Result<PathBuf, ReportError> {
    let size = (options.width, options.height);
    write_staged(path, options.format, |staged| match options.format {
        ChartFormat::Png => {
            let root = FontSafeBackend::new(BitMapBackend::new(staged, size)).into_drawing_area();
            draw_throughput_chart(root, summary)
        }
        ChartFormat::Svg => {
            let root = FontSafeBackend::new(SVGBackend::new(staged, size)).into_drawing_area();
            draw_throughput_chart(root, summary)
        }
    })
}

// The chart is drawn into a temp file beside `path` and renamed into place only once the
// backend has presented, so a failed render never leaves a partial image behind.
fn write_staged<F>(path: &Path, format: ChartFormat, draw: F) -> Result<PathBuf, ReportError>
where
    F: FnOnce(&Path) -> DrawResult,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staged = tempfile::Builder::new()
        .prefix(".lb-report-")
        .suffix(&format!(".{}", format.extension()))
        .tempfile_in(dir)
        .map_err(|source| ReportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

    panic::catch_unwind(AssertUnwindSafe(|| draw(staged.path())))
        .map_err(|_| ReportError::Render("plotting backend panicked".to_string()))?
        .map_err(|err| ReportError::Render(format!("{}: {}", path.display(), err)))?;

    staged.persist(path).map_err(|err| ReportError::Io {
        path: path.to_path_buf(),
        source: err.error,
    })?;
    debug!("Persisted chart {}", path.display());
    Ok(path.to_path_buf())
}

fn draw_queue_chart<DB>(root: DrawingArea<DB, Shift>, points: &[TimeSeriesPoint]) -> DrawResult
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let area = root;
    area.fill(&WHITE)?;

    let values: Vec<f64> = points.iter().filter_map(|p| p.queue_size).collect();
    let (y_min, y_max) = value_bounds(&values);
    let x_max = points
        .last()
        .map_or(1.0, |p| (p.clock_cycle as f64).max(1.0));

    let mut chart = ChartBuilder::on(&area)
        .caption(QUEUE_TITLE, title_font())
        .margin(20)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 50)
        .build_cartesian_2d(0.0..x_max, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Clock Cycle")
        .y_desc("Queue Size")
        .x_label_formatter(&tick_label)
        .y_label_formatter(&tick_label)
        .label_style(axis_font())
        .draw()?;

    let style = ShapeStyle {
        color: LINE_COLOR.to_rgba(),
        filled: true,
        stroke_width: 2,
    };
    for run in contiguous_runs(points) {
        chart.draw_series(LineSeries::new(run, style).point_size(4))?;
    }

    draw_legend(&area, &chart.plotting_area().get_pixel_range())?;

    area.present()?;
    Ok(())
}

// Drawn element by element so every piece of text is measured and drawn by the backend.
fn draw_legend<DB>(area: &DrawingArea<DB, Shift>, plot: &(Range<i32>, Range<i32>)) -> DrawResult
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let text_style = axis_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Left, VPos::Center));
    let text_size = area.estimate_text_size(QUEUE_LEGEND, &text_style)?;
    let ((x0, y0), (x1, y1)) = legend_box(plot, text_size);
    let mid = (y0 + y1) / 2;

    area.draw(&Rectangle::new([(x0, y0), (x1, y1)], WHITE.mix(0.8).filled()))?;
    area.draw(&Rectangle::new([(x0, y0), (x1, y1)], BLACK.mix(0.3).stroke_width(1)))?;
    area.draw(&PathElement::new(
        vec![(x0 + LEGEND_PAD, mid), (x0 + LEGEND_PAD + LEGEND_SAMPLE, mid)],
        LINE_COLOR.stroke_width(2),
    ))?;
    area.draw(&Circle::new(
        (x0 + LEGEND_PAD + LEGEND_SAMPLE / 2, mid),
        4,
        LINE_COLOR.filled(),
    ))?;
    area.draw(&Text::new(
        QUEUE_LEGEND,
        (x0 + 2 * LEGEND_PAD + LEGEND_SAMPLE, mid),
        text_style,
    ))?;
    Ok(())
}

/// Legend box anchored to the upper-right corner of the plotting area, in pixels.
fn legend_box(plot: &(Range<i32>, Range<i32>), text: (u32, u32)) -> ((i32, i32), (i32, i32)) {
    let width = LEGEND_SAMPLE + 3 * LEGEND_PAD + text.0 as i32;
    let height = (text.1 as i32).max(8) + 2 * LEGEND_PAD;
    let right = plot.0.end - LEGEND_PAD;
    let top = plot.1.start + LEGEND_PAD;
    ((right - width, top), (right, top + height))
}

fn draw_throughput_chart<DB>(root: DrawingArea<DB, Shift>, summary: &[ServerSummary]) -> DrawResult
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let area = root;
    area.fill(&WHITE)?;

    let values: Vec<f64> = summary.iter().filter_map(|s| s.requests_handled).collect();
    let (y_min, y_max) = value_bounds(&values);
    let x_max = summary.len().max(1) as f64;

    let mut chart = ChartBuilder::on(&area)
        .caption(THROUGHPUT_TITLE, title_font())
        .margin(20)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 110)
        .build_cartesian_2d(0.0..x_max, y_min..y_max)?;

    // Server names are drawn per bar below, so the numeric x ticks stay blank.
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Server")
        .y_desc("Requests Handled")
        .x_label_formatter(&|_| String::new())
        .y_label_formatter(&tick_label)
        .label_style(axis_font())
        .draw()?;

    chart.draw_series(summary.iter().enumerate().filter_map(|(idx, entry)| {
        let value = entry.requests_handled?;
        Some(Rectangle::new(
            [(idx as f64 + 0.1, 0.0), (idx as f64 + 0.9, value)],
            BAR_COLOR.filled(),
        ))
    }))?;

    let label_style = FontDesc::new(FontFamily::SansSerif, 14.0, FontStyle::Normal)
        .transform(FontTransform::Rotate90)
        .color(&BLACK)
        .pos(Pos::new(HPos::Left, VPos::Center));
    for (idx, entry) in summary.iter().enumerate() {
        let (x, y) = chart
            .plotting_area()
            .map_coordinate(&(idx as f64 + 0.5, y_min));
        area.draw(&Text::new(
            entry.server.clone(),
            (x, y + 8),
            label_style.clone(),
        ))?;
    }

    area.present()?;
    Ok(())
}

fn title_font() -> FontDesc<'static> {
    FontDesc::new(FontFamily::SansSerif, 24.0, FontStyle::Normal)
}

fn axis_font() -> FontDesc<'static> {
    FontDesc::new(FontFamily::SansSerif, 16.0, FontStyle::Normal)
}

fn tick_label(value: &f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}

/// Consecutive points with a queue size, as chart coordinates.
fn contiguous_runs(points: &[TimeSeriesPoint]) -> Vec<Vec<(f64, f64)>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for point in points {
        match point.queue_size {
            Some(value) => current.push((point.clock_cycle as f64, value)),
            None if !current.is_empty() => runs.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

// Axis range always includes zero and leaves 10% headroom.
fn value_bounds(values: &[f64]) -> (f64, f64) {
    let max = values.iter().copied().fold(0.0_f64, f64::max);
    let min = values.iter().copied().fold(0.0_f64, f64::min);
    let upper = if max > 0.0 { max * 1.1 } else { 1.0 };
    (min * 1.1, upper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn point(cycle: usize, queue: Option<f64>) -> TimeSeriesPoint {
        TimeSeriesPoint {
            clock_cycle: cycle,
            queue_size: queue,
        }
    }

    fn server(name: &str, handled: Option<f64>) -> ServerSummary {
        ServerSummary {
            server: name.to_string(),
            requests_handled: handled,
        }
    }

    fn is_png(path: &Path) -> bool {
        fs::read(path)
            .map(|bytes| bytes.starts_with(b"\x89PNG"))
            .unwrap_or(false)
    }

    #[test]
    fn test_queue_chart_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue_size_over_time.png");
        let points = vec![point(0, Some(5.0)), point(1, Some(7.0)), point(2, Some(3.0))];
        let written = render_queue_chart(&points, &path, &ChartOptions::default()).unwrap();
        assert_eq!(written, path);
        assert!(is_png(&path));
    }

    #[test]
    fn test_throughput_chart_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests_handled.png");
        let summary = vec![server("S1", Some(120.0)), server("S2", Some(95.0))];
        render_throughput_chart(&summary, &path, &ChartOptions::default()).unwrap();
        assert!(is_png(&path));
    }

    #[test]
    fn test_empty_sections_still_render() {
        let dir = tempfile::tempdir().unwrap();
        let queue = dir.path().join("q.png");
        let bars = dir.path().join("b.png");
        render_queue_chart(&[], &queue, &ChartOptions::default()).unwrap();
        render_throughput_chart(&[], &bars, &ChartOptions::default()).unwrap();
        assert!(is_png(&queue));
        assert!(is_png(&bars));
    }

    #[test]
    fn test_svg_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests_handled.svg");
        let options = ChartOptions {
            format: ChartFormat::Svg,
            ..ChartOptions::default()
        };
        render_throughput_chart(&[server("A", Some(1.0)), server("A", None)], &path, &options)
            .unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("<svg"));
    }

    #[test]
    fn test_queue_chart_with_gaps_and_legend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue_size_over_time.svg");
        let options = ChartOptions {
            format: ChartFormat::Svg,
            ..ChartOptions::default()
        };
        let points = vec![point(0, Some(5.0)), point(1, None), point(2, Some(3.0))];
        render_queue_chart(&points, &path, &options).unwrap();

        // Once as the title and once as the legend entry.
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.matches(QUEUE_LEGEND).count() >= 2);
    }

    #[test]
    fn test_legend_box_sits_inside_plot_area() {
        let plot = (60..980, 60..430);
        let ((x0, y0), (x1, y1)) = legend_box(&plot, (120, 14));
        assert_eq!((x1, y0), (970, 70));
        assert_eq!(x1 - x0, 120 + LEGEND_SAMPLE + 3 * LEGEND_PAD);
        assert_eq!(y1 - y0, 14 + 2 * LEGEND_PAD);
        assert!(plot.0.contains(&x0) && plot.1.contains(&y1));
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue_size_over_time.png");
        render_queue_chart(&[point(0, Some(1.0))], &path, &ChartOptions::default()).unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("queue_size_over_time.png")]);
    }

    #[test]
    fn test_missing_output_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("q.png");
        let err = render_queue_chart(&[], &path, &ChartOptions::default()).unwrap_err();
        assert!(matches!(err, ReportError::Io { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_contiguous_runs_split_on_gaps() {
        let points = vec![
            point(0, Some(1.0)),
            point(1, None),
            point(2, Some(2.0)),
            point(3, Some(4.0)),
            point(4, None),
        ];
        assert_eq!(
            contiguous_runs(&points),
            vec![vec![(0.0, 1.0)], vec![(2.0, 2.0), (3.0, 4.0)]]
        );
        assert!(contiguous_runs(&[point(0, None)]).is_empty());
    }

    #[test]
    fn test_value_bounds() {
        assert_eq!(value_bounds(&[]), (0.0, 1.0));
        let (lo, hi) = value_bounds(&[10.0, 20.0]);
        assert_eq!(lo, 0.0);
        assert!((hi - 22.0).abs() < 1e-9);
        let (lo, _) = value_bounds(&[-5.0, 3.0]);
        assert!(lo < -5.0);
    }

    #[test]
    fn test_tick_label() {
        assert_eq!(tick_label(&4.0), "4");
        assert_eq!(tick_label(&2.5), "2.5");
    }
}
