
use itertools::Itertools;
use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::data_types::sample_result::{SampleResult, SampleStatus};
use crate::writers::open_table_writer;

/// Accumulates one summary row per sample
#[derive(Default)]
pub struct SummaryWriter {
    rows: Vec<SummaryRow>
}

/// Contains all the data written to each row of the summary file
#[derive(Clone, Debug, PartialEq, Serialize)]
struct SummaryRow {
    /// Sample identifier
    sample_id: String,
    /// Terminal status
    status: SampleStatus,
    /// Winning candidate, if any
    winner: Option<String>,
    /// Score of the winning candidate
    winner_score: Option<f64>,
    /// Score the external tool gave the winner
    winner_external_score: Option<f64>,
    /// Length of the final sequence
    sequence_length: Option<usize>,
    /// Number of substitutions
    corrections: usize,
    /// Substitutions that were only a plurality
    ambiguous_corrections: usize,
    /// Spans that were replaced by their reverse complement
    flipped_spans: usize,
    /// Failing spans that were left alone
    unresolved_spans: usize,
    /// Candidates that were not used
    discarded_candidates: usize,
    /// Issue categories, semi-colon separated
    issue_types: String,
    /// Full issue descriptions, semi-colon separated
    issues: String
}

impl SummaryRow {
    fn new(result: &SampleResult) -> Self {
        Self {
            sample_id: result.sample_id().to_string(),
            status: result.status(),
            winner: result.winner().map(|(w, _s)| w.clone()),
            winner_score: result.winner().map(|(_w, s)| *s),
            winner_external_score: result.winner_external_score(),
            sequence_length: result.sequence().map(|s| s.len()),
            corrections: result.corrections().len(),
            ambiguous_corrections: result.ambiguous_corrections(),
            flipped_spans: result.flipped_spans(),
            unresolved_spans: result.unresolved_spans().len(),
            discarded_candidates: result.discards().len(),
            issue_types: result.issues().iter().map(AsRef::<str>::as_ref).join(";"),
            issues: result.issues().iter().map(|i| i.to_string()).join(";")
        }
    }
}

impl SummaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sample to the summary
    pub fn add_result(&mut self, result: &SampleResult) {
        self.rows.push(SummaryRow::new(result));
    }

    /// Number of samples with the given status
    pub fn count_status(&self, status: SampleStatus) -> usize {
        self.rows.iter()
            .filter(|r| r.status == status)
            .count()
    }

    /// Will write the summary out to the given file path
    /// # Arguments
    /// * `filename` - the filename for the output (tsv/csv)
    pub fn write_summary(&self, filename: &Path) -> csv::Result<()> {
        let mut csv_writer: csv::Writer<File> = open_table_writer(filename)?;

        for row in self.rows.iter() {
            csv_writer.serialize(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::sample_result::{DiscardReason, DiscardRecord, SampleIssue};
    use crate::data_types::sequence::Sequence;

    #[test]
    fn test_summary_rows() {
        let failed = SampleResult::failed(
            "s1".to_string(),
            vec![DiscardRecord::new("s1", "c1", DiscardReason::ToolFlaggedFail, "flagged".to_string())],
            vec![]
        );
        let sequence = Sequence::new("c2".to_string(), b"ACGT", true).unwrap();
        let warned = SampleResult::succeeded(
            "s2".to_string(), ("c2".to_string(), 0.9), sequence,
            vec![], vec![], vec![], vec![], vec![],
            vec![SampleIssue::MissingFrequencyTable { candidate_id: "c2".to_string() }]
        ).with_winner_external_score(Some(0.98));

        let mut writer = SummaryWriter::new();
        writer.add_result(&failed);
        writer.add_result(&warned);
        assert_eq!(writer.count_status(SampleStatus::Failed), 1);
        assert_eq!(writer.count_status(SampleStatus::SucceededWithWarnings), 1);
        assert_eq!(writer.count_status(SampleStatus::Succeeded), 0);

        let row = &writer.rows[0];
        assert_eq!(row.winner, None);
        assert_eq!(row.winner_external_score, None);
        assert_eq!(row.discarded_candidates, 1);
        assert_eq!(row.issue_types, "no_viable_candidate");

        let row = &writer.rows[1];
        assert_eq!(row.winner.as_deref(), Some("c2"));
        assert_eq!(row.sequence_length, Some(4));
        assert_eq!(row.winner_external_score, Some(0.98));
        assert_eq!(row.issue_types, "missing_frequency_table");
        assert_eq!(row.issues, "winning candidate c2 has no frequency table, consensus correction skipped");
    }
}
