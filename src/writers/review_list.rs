
use std::fs::File;
use std::path::Path;

use crate::data_types::sample_result::SampleResult;
use crate::writers::open_table_writer;

/// Writes every discarded candidate so a person can follow up on it
pub struct ReviewListWriter {
    /// Handle on the writer
    csv_writer: csv::Writer<File>,
    /// Number of rows written so far
    num_rows: usize
}

impl ReviewListWriter {
    /// Creates a new writer
    /// # Arguments
    /// * `filename` - path to the filename that will get opened, must be .csv/.tsv
    pub fn new(filename: &Path) -> csv::Result<Self> {
        Ok(Self {
            csv_writer: open_table_writer(filename)?,
            num_rows: 0
        })
    }

    /// Writes all discard records for a sample
    pub fn write_result(&mut self, result: &SampleResult) -> csv::Result<()> {
        for discard in result.discards().iter() {
            self.csv_writer.serialize(discard)?;
            self.num_rows += 1;
        }
        Ok(())
    }

    /// Flushes the output, returning the number of rows written
    pub fn finish(mut self) -> csv::Result<usize> {
        self.csv_writer.flush()?;
        Ok(self.num_rows)
    }
}
