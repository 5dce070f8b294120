use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ReportError;

pub const QUEUE_SIZE_COLUMN: &str = "Queue Size";
pub const SERVER_COLUMN: &str = "Server";
pub const REQUESTS_HANDLED_COLUMN: &str = "Requests Handled";

/// One data line of the results file. `clock_cycle` is the 0-based row position.
///
/// Summary rows (with a server) keep only `requests_handled`; time-series rows keep only
/// `queue_size`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub clock_cycle: usize,
    pub queue_size: Option<f64>,
    pub server: Option<String>,
    pub requests_handled: Option<f64>,
}

impl Row {
    pub fn is_summary(&self) -> bool {
        self.server.is_some()
    }
}

struct ColumnMap {
    queue_size: usize,
    server: usize,
    requests_handled: usize,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Result<Self, ReportError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
        };
        let queue_size = find(QUEUE_SIZE_COLUMN);
        let server = find(SERVER_COLUMN);
        let requests_handled = find(REQUESTS_HANDLED_COLUMN);

        match (queue_size, server, requests_handled) {
            (Some(queue_size), Some(server), Some(requests_handled)) => Ok(Self {
                queue_size,
                server,
                requests_handled,
            }),
            _ => {
                let missing = [
                    (QUEUE_SIZE_COLUMN, queue_size),
                    (SERVER_COLUMN, server),
                    (REQUESTS_HANDLED_COLUMN, requests_handled),
                ]
                .into_iter()
                .filter(|(_, idx)| idx.is_none())
                .map(|(name, _)| name.to_string())
                .collect();
                Err(ReportError::Schema { missing })
            }
        }
    }
}

/// Read every row of the results file at `path`, preserving file order.
pub fn load_rows(path: &Path) -> Result<Vec<Row>, ReportError> {
    let file = File::open(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => ReportError::NotFound(path.to_path_buf()),
        _ => ReportError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    let rows = load_rows_from_reader(file)?;
    debug!("Parsed {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

pub fn load_rows_from_reader<R: Read>(input: R) -> Result<Vec<Row>, ReportError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);
    let headers = reader.headers()?.clone();
    let columns = ColumnMap::from_headers(&headers)?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let server = text_cell(&record, columns.server).map(str::to_string);
        // A row carries only its own section's number; the other numeric cell is ignored.
        let (queue_size, requests_handled) = match server {
            Some(_) => {
                let handled = numeric_cell(
                    &record,
                    columns.requests_handled,
                    REQUESTS_HANDLED_COLUMN,
                    index,
                )?;
                (None, handled)
            }
            None => {
                let queue = numeric_cell(&record, columns.queue_size, QUEUE_SIZE_COLUMN, index)?;
                (queue, None)
            }
        };
        rows.push(Row {
            clock_cycle: index,
            queue_size,
            server,
            requests_handled,
        });
    }
    Ok(rows)
}

// Short records are padded with nulls; an all-whitespace cell is null.
fn text_cell(record: &StringRecord, column: usize) -> Option<&str> {
    record
        .get(column)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn numeric_cell(
    record: &StringRecord,
    column: usize,
    name: &str,
    row: usize,
) -> Result<Option<f64>, ReportError> {
    let Some(text) = text_cell(record, column) else {
        return Ok(None);
    };
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(ReportError::Parse {
            row,
            column: name.to_string(),
            value: text.to_string(),
        }),
    }
}
