//! Plain-text diagnostics of how a results file segments, without rendering.

use std::path::Path;

use crate::loader::{load_rows, Row};
use crate::sections::{boundary_index, first_order_violation};
use crate::ReportError;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Inspection {
    pub rows: usize,
    pub boundary: usize,
    pub time_series_rows: usize,
    pub summary_rows: usize,
    pub order_violation: Option<usize>,
    pub missing_queue_sizes: usize,
    pub missing_requests: usize,
    pub servers: Vec<String>,
}

pub fn inspect_rows(rows: &[Row]) -> Inspection {
    let boundary = boundary_index(rows);
    let (head, tail) = rows.split_at(boundary);
    Inspection {
        rows: rows.len(),
        boundary,
        time_series_rows: head.len(),
        summary_rows: tail.len(),
        order_violation: first_order_violation(rows, boundary),
        missing_queue_sizes: head.iter().filter(|r| r.queue_size.is_none()).count(),
        missing_requests: tail.iter().filter(|r| r.requests_handled.is_none()).count(),
        servers: tail.iter().filter_map(|r| r.server.clone()).collect(),
    }
}

pub fn inspect_file(path: &Path) -> Result<Inspection, ReportError> {
    let rows = load_rows(path)?;
    Ok(inspect_rows(&rows))
}

impl Inspection {
    pub fn to_report(&self, source: &Path) -> String {
        let mut report = String::new();
        report.push_str(&format!("FILE: {}\n", source.display()));
        report.push_str(&format!("  rows: {}\n", self.rows));
        report.push_str(&format!("  boundary_index: {}\n", self.boundary));
        report.push_str(&format!(
            "  time_series_rows: {} (missing queue size: {})\n",
            self.time_series_rows, self.missing_queue_sizes
        ));
        report.push_str(&format!(
            "  summary_rows: {} (missing requests handled: {})\n",
            self.summary_rows, self.missing_requests
        ));
        match self.order_violation {
            Some(row) => report.push_str(&format!(
                "  order: time-series row {} follows the summary block\n",
                row
            )),
            None => report.push_str("  order: ok\n"),
        }
        if !self.servers.is_empty() {
            report.push_str("  servers:\n");
            for name in &self.servers {
                report.push_str(&format!("    - {}\n", name));
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_rows_from_reader;

    #[test]
    fn test_inspection_counts() {
        let rows = load_rows_from_reader(
            "Queue Size,Server,Requests Handled\n5,,\n,,\n6,,2\n,S1,120\n,S2,\n".as_bytes(),
        )
        .unwrap();
        let inspection = inspect_rows(&rows);

        assert_eq!(inspection.rows, 5);
        assert_eq!(inspection.boundary, 3);
        assert_eq!(inspection.time_series_rows, 3);
        assert_eq!(inspection.summary_rows, 2);
        assert_eq!(inspection.missing_queue_sizes, 1);
        assert_eq!(inspection.missing_requests, 1);
        assert_eq!(inspection.order_violation, None);
        assert_eq!(inspection.servers, vec!["S1", "S2"]);
    }

    #[test]
    fn test_report_text() {
        let rows = load_rows_from_reader(
            "Queue Size,Server,Requests Handled\n1,,\n,A,3\n2,,\n".as_bytes(),
        )
        .unwrap();
        let report = inspect_rows(&rows).to_report(Path::new("results.csv"));

        assert!(report.starts_with("FILE: results.csv\n"));
        assert!(report.contains("  boundary_index: 1\n"));
        assert!(report.contains("time-series row 2 follows the summary block"));
        assert!(report.contains("    - A\n"));
    }
}
