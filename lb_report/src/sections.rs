//! Segmentation of loaded rows into the queue time series and the per-server summary.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::loader::Row;
use crate::ReportError;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub clock_cycle: usize,
    pub queue_size: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServerSummary {
    pub server: String,
    pub requests_handled: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Sections {
    pub boundary: usize,
    pub time_series: Vec<TimeSeriesPoint>,
    pub summary: Vec<ServerSummary>,
}

impl Sections {
    pub fn total_rows(&self) -> usize {
        self.time_series.len() + self.summary.len()
    }
}

/// Index of the first row carrying a server name, or `rows.len()` when there is none.
pub fn boundary_index(rows: &[Row]) -> usize {
    rows.iter().position(Row::is_summary).unwrap_or(rows.len())
}

/// First row at or after `boundary` without a server, i.e. a time-series row that
/// follows the summary block.
pub fn first_order_violation(rows: &[Row], boundary: usize) -> Option<usize> {
    rows.iter()
        .enumerate()
        .skip(boundary)
        .find(|(_, row)| !row.is_summary())
        .map(|(idx, _)| idx)
}

/// Split at [`boundary_index`]. Rows after the boundary always land in the summary,
/// whatever they contain.
pub fn split_sections(rows: &[Row]) -> Sections {
    split_at(rows, boundary_index(rows))
}

/// Like [`split_sections`], but checks that no time-series row follows the summary block.
/// With `strict_order` a violation is an error, otherwise it is logged and tolerated.
pub fn split_sections_checked(rows: &[Row], strict_order: bool) -> Result<Sections, ReportError> {
    let boundary = boundary_index(rows);
    if let Some(row) = first_order_violation(rows, boundary) {
        if strict_order {
            return Err(ReportError::SectionOrder { row });
        }
        warn!(
            "Row {} has no server but follows the summary block starting at row {}; charting it as a summary entry",
            row, boundary
        );
    }
    Ok(split_at(rows, boundary))
}

fn split_at(rows: &[Row], boundary: usize) -> Sections {
    let (head, tail) = rows.split_at(boundary);
    let time_series = head
        .iter()
        .enumerate()
        .map(|(idx, row)| TimeSeriesPoint {
            clock_cycle: idx,
            queue_size: row.queue_size,
        })
        .collect();
    let summary = tail
        .iter()
        .map(|row| ServerSummary {
            server: row.server.clone().unwrap_or_default(),
            requests_handled: row.requests_handled,
        })
        .collect();
    Sections {
        boundary,
        time_series,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(cycle: usize, queue: f64) -> Row {
        Row {
            clock_cycle: cycle,
            queue_size: Some(queue),
            server: None,
            requests_handled: None,
        }
    }

    fn srv(cycle: usize, name: &str, handled: f64) -> Row {
        Row {
            clock_cycle: cycle,
            queue_size: None,
            server: Some(name.to_string()),
            requests_handled: Some(handled),
        }
    }

    #[test]
    fn test_mixed_file_splits_at_first_server() {
        let rows = vec![ts(0, 5.0), ts(1, 7.0), srv(2, "S1", 120.0), srv(3, "S2", 95.0)];
        let sections = split_sections(&rows);

        assert_eq!(sections.boundary, 2);
        assert_eq!(
            sections.time_series,
            vec![
                TimeSeriesPoint {
                    clock_cycle: 0,
                    queue_size: Some(5.0)
                },
                TimeSeriesPoint {
                    clock_cycle: 1,
                    queue_size: Some(7.0)
                },
            ]
        );
        assert_eq!(
            sections.summary,
            vec![
                ServerSummary {
                    server: "S1".into(),
                    requests_handled: Some(120.0)
                },
                ServerSummary {
                    server: "S2".into(),
                    requests_handled: Some(95.0)
                },
            ]
        );
    }

    #[test]
    fn test_no_servers_means_empty_summary() {
        let rows = vec![ts(0, 1.0), ts(1, 2.0), ts(2, 3.0)];
        let sections = split_sections(&rows);
        assert_eq!(boundary_index(&rows), 3);
        assert_eq!(sections.time_series.len(), 3);
        assert!(sections.summary.is_empty());
    }

    #[test]
    fn test_server_on_first_row_means_empty_time_series() {
        let rows = vec![srv(0, "A", 1.0), srv(1, "B", 2.0)];
        let sections = split_sections(&rows);
        assert_eq!(sections.boundary, 0);
        assert!(sections.time_series.is_empty());
        assert_eq!(sections.summary.len(), 2);
    }

    #[test]
    fn test_empty_input() {
        let sections = split_sections(&[]);
        assert_eq!(sections, Sections::default());
    }

    #[test]
    fn test_stray_requests_handled_does_not_move_boundary() {
        let mut stray = ts(1, 4.0);
        stray.requests_handled = Some(99.0);
        let rows = vec![ts(0, 3.0), stray, srv(2, "A", 5.0)];
        let sections = split_sections(&rows);
        assert_eq!(sections.boundary, 2);
        assert_eq!(sections.time_series[1].queue_size, Some(4.0));
    }

    #[test]
    fn test_repeated_server_names_are_kept() {
        let rows = vec![srv(0, "A", 1.0), srv(1, "A", 2.0)];
        let names: Vec<_> = split_sections(&rows)
            .summary
            .into_iter()
            .map(|s| s.server)
            .collect();
        assert_eq!(names, vec!["A", "A"]);
    }

    #[test]
    fn test_sections_partition_rows() {
        let layouts: [&[bool]; 5] = [
            &[],
            &[false, false],
            &[true],
            &[false, true, true],
            &[false, true, false, true],
        ];
        for layout in layouts {
            let rows: Vec<Row> = layout
                .iter()
                .enumerate()
                .map(|(i, &is_server)| if is_server { srv(i, "X", 1.0) } else { ts(i, 1.0) })
                .collect();
            let sections = split_sections(&rows);
            assert_eq!(sections.total_rows(), rows.len());
            assert_eq!(sections.time_series.len(), sections.boundary);
            assert!(rows[..sections.boundary].iter().all(|r| !r.is_summary()));
            if sections.boundary < rows.len() {
                assert!(rows[sections.boundary].is_summary());
            }
        }
    }

    #[test]
    fn test_interleaved_rows_are_tolerated_by_default() {
        let rows = vec![ts(0, 1.0), srv(1, "A", 2.0), ts(2, 3.0)];
        assert_eq!(first_order_violation(&rows, 1), Some(2));

        let sections = split_sections_checked(&rows, false).unwrap();
        assert_eq!(sections.summary.len(), 2);
        assert_eq!(sections.summary[1].server, "");
    }

    #[test]
    fn test_interleaved_rows_fail_in_strict_mode() {
        let rows = vec![ts(0, 1.0), srv(1, "A", 2.0), ts(2, 3.0)];
        let err = split_sections_checked(&rows, true).unwrap_err();
        assert!(matches!(err, ReportError::SectionOrder { row: 2 }));
    }
}
