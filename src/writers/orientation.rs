
use itertools::Itertools;
use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::data_types::orientation::{Orientation, OrientationDecision, UnresolvedReason, UnresolvedSpan};
use crate::data_types::sample_result::SampleResult;
use crate::writers::open_table_writer;

/// Writes the orientation trials and the unresolved spans, one file each
pub struct OrientationWriter {
    /// Every re-orientation trial
    decision_writer: csv::Writer<File>,
    /// Every failing span left in the final sequence
    unresolved_writer: csv::Writer<File>
}

/// All coordinates are 0-based half-open, matching the region TSV
#[derive(Serialize)]
struct DecisionRow<'a> {
    sample_id: &'a str,
    pass: usize,
    detected_start: usize,
    detected_end: usize,
    trial_start: usize,
    trial_end: usize,
    chosen: Orientation,
    original_score: f64,
    flipped_score: f64
}

impl<'a> DecisionRow<'a> {
    fn new(sample_id: &'a str, decision: &OrientationDecision) -> Self {
        Self {
            sample_id,
            pass: decision.pass,
            detected_start: decision.detected_span.start,
            detected_end: decision.detected_span.end,
            trial_start: decision.trial_span.start,
            trial_end: decision.trial_span.end,
            chosen: decision.chosen,
            original_score: decision.original_score,
            flipped_score: decision.flipped_score
        }
    }
}

#[derive(Serialize)]
struct UnresolvedRow<'a> {
    sample_id: &'a str,
    start: usize,
    end: usize,
    length: usize,
    mean_concordance: f64,
    /// Overlapping reference regions, comma separated
    reference_regions: String,
    reason: UnresolvedReason
}

impl<'a> UnresolvedRow<'a> {
    fn new(sample_id: &'a str, unresolved: &UnresolvedSpan) -> Self {
        Self {
            sample_id,
            start: unresolved.span.start,
            end: unresolved.span.end,
            length: unresolved.span.len(),
            mean_concordance: unresolved.mean_concordance,
            reference_regions: unresolved.reference_regions.iter().join(","),
            reason: unresolved.reason
        }
    }
}

impl OrientationWriter {
    /// Creates both writers
    /// # Arguments
    /// * `decisions_fn` - output path for the trials
    /// * `unresolved_fn` - output path for the unresolved spans
    pub fn new(decisions_fn: &Path, unresolved_fn: &Path) -> csv::Result<Self> {
        Ok(Self {
            decision_writer: open_table_writer(decisions_fn)?,
            unresolved_writer: open_table_writer(unresolved_fn)?
        })
    }

    /// Writes all decisions and unresolved spans for a sample
    pub fn write_result(&mut self, result: &SampleResult) -> csv::Result<()> {
        for decision in result.orientation_decisions().iter() {
            self.decision_writer.serialize(DecisionRow::new(result.sample_id(), decision))?;
        }
        for unresolved in result.unresolved_spans().iter() {
            self.unresolved_writer.serialize(UnresolvedRow::new(result.sample_id(), unresolved))?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> csv::Result<()> {
        self.decision_writer.flush()?;
        self.unresolved_writer.flush()?;
        Ok(())
    }
}
