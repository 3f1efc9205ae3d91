/*!
# Writers module
Contains the logic for writing the output files for the polish and scan commands.
*/
/// Writes every per-sample output of a polish run
pub mod batch_outputs;
/// Writes the per-sample consensus substitutions
pub mod corrections;
/// Writes final sequences and the archive of rejected orientations
pub mod fasta;
/// Writes the orientation trials and unresolved spans
pub mod orientation;
/// Writes the list of discarded candidates for manual review
pub mod review_list;
/// Generates the summary file
pub mod summary;
/// Writes the per-window concordance from a scan
pub mod window_scan;

use std::fs::File;
use std::path::Path;

/// Opens a delimited writer, using "," if the file ends with .csv and tabs otherwise
pub(crate) fn open_table_writer(filename: &Path) -> csv::Result<csv::Writer<File>> {
    let is_csv: bool = filename.extension().unwrap_or_default() == "csv";
    let delimiter: u8 = if is_csv { b',' } else { b'\t' };
    csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(filename)
}
