
use serde::Serialize;
use std::path::Path;

use crate::data_types::orientation::WindowScore;
use crate::writers::open_table_writer;

/// One scan window; windows shorter than k or without valid k-mers have empty scores
#[derive(Serialize)]
struct WindowRow<'a> {
    sequence_id: &'a str,
    start: usize,
    end: usize,
    concordance: Option<f64>,
    passed: Option<bool>
}

/// Writes a full window scan, returning the number of windows written
/// # Arguments
/// * `filename` - the output file (tsv/csv)
/// * `sequence_id` - label for every row
/// * `windows` - the scan, usually straight from a `WindowScanner`
pub fn write_window_scan(filename: &Path, sequence_id: &str, windows: impl IntoIterator<Item = WindowScore>) -> csv::Result<usize> {
    let mut csv_writer = open_table_writer(filename)?;
    let mut num_windows = 0;
    for window in windows.into_iter() {
        csv_writer.serialize(WindowRow {
            sequence_id,
            start: window.start,
            end: window.end,
            concordance: window.concordance,
            passed: window.passed
        })?;
        num_windows += 1;
    }
    csv_writer.flush()?;
    Ok(num_windows)
}
