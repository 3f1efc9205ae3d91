
use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::data_types::correction::CorrectionEvent;
use crate::data_types::sample_result::SampleResult;
use crate::writers::open_table_writer;

/// Writes every consensus substitution
pub struct CorrectionWriter {
    /// Handle on the writer
    csv_writer: csv::Writer<File>
}

/// One substitution; positions are written 1-based to match the frequency tables
#[derive(Serialize)]
struct CorrectionRow<'a> {
    sample_id: &'a str,
    position: usize,
    original: char,
    resolved: char,
    margin: f64,
    true_majority: bool
}

impl<'a> CorrectionRow<'a> {
    fn new(sample_id: &'a str, event: &CorrectionEvent) -> Self {
        Self {
            sample_id,
            position: event.position + 1,
            original: event.original as char,
            resolved: event.resolved as char,
            margin: event.margin,
            true_majority: event.true_majority
        }
    }
}

impl CorrectionWriter {
    /// Creates a new writer
    /// # Arguments
    /// * `filename` - path to the filename that will get opened, must be .csv/.tsv
    pub fn new(filename: &Path) -> csv::Result<Self> {
        Ok(Self {
            csv_writer: open_table_writer(filename)?
        })
    }

    /// Writes all corrections for a sample
    pub fn write_result(&mut self, result: &SampleResult) -> csv::Result<()> {
        for event in result.corrections().iter() {
            self.csv_writer.serialize(CorrectionRow::new(result.sample_id(), event))?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> csv::Result<()> {
        self.csv_writer.flush()?;
        Ok(())
    }
}
