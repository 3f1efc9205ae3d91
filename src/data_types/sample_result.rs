
use serde::Serialize;

use crate::data_types::correction::CorrectionEvent;
use crate::data_types::orientation::{ArchivedVariant, OrientationDecision, Span, UnresolvedReason, UnresolvedSpan};
use crate::data_types::sequence::Sequence;

/// Terminal status for a single sample
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, strum_macros::AsRefStr, strum_macros::Display)]
pub enum SampleStatus {
    #[strum(serialize = "succeeded")]
    #[serde(rename = "succeeded")]
    Succeeded,
    #[strum(serialize = "succeeded_with_warnings")]
    #[serde(rename = "succeeded_with_warnings")]
    SucceededWithWarnings,
    #[strum(serialize = "failed")]
    #[serde(rename = "failed")]
    Failed
}

/// Why a candidate was not used
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, strum_macros::AsRefStr, strum_macros::Display)]
pub enum DiscardReason {
    /// The external assembly tool marked it as failed
    #[strum(serialize = "tool-flagged-fail")]
    #[serde(rename = "tool-flagged-fail")]
    ToolFlaggedFail,
    /// It was viable, but another candidate scored better
    #[strum(serialize = "score-below-all")]
    #[serde(rename = "score-below-all")]
    ScoreBelowAll,
    /// The sequence was missing, empty, or unparseable
    #[strum(serialize = "input-malformed")]
    #[serde(rename = "input-malformed")]
    InputMalformed,
    /// Total or region lengths too far from the reference
    #[strum(serialize = "length-out-of-tolerance")]
    #[serde(rename = "length-out-of-tolerance")]
    LengthOutOfTolerance
}

/// One entry on the manual review list
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DiscardRecord {
    pub sample_id: String,
    pub candidate_id: String,
    pub reason: DiscardReason,
    /// Free-text detail for the reviewer
    pub detail: String
}

impl DiscardRecord {
    pub fn new(sample_id: &str, candidate_id: &str, reason: DiscardReason, detail: String) -> Self {
        Self {
            sample_id: sample_id.to_string(),
            candidate_id: candidate_id.to_string(),
            reason,
            detail
        }
    }
}

/// Recoverable problems found while processing a sample.
/// None of these stop the batch; they end up in the sample report.
#[derive(thiserror::Error, Clone, Debug, PartialEq, strum_macros::AsRefStr)]
pub enum SampleIssue {
    #[error("malformed input: {detail}")]
    #[strum(serialize = "input_malformed")]
    InputMalformed { detail: String },
    #[error("no candidate assembly passed selection")]
    #[strum(serialize = "no_viable_candidate")]
    NoViableCandidate,
    #[error("{count} correction(s) resolved by plurality only")]
    #[strum(serialize = "ambiguous_vote")]
    AmbiguousVote { count: usize },
    #[error("low concordance span {span} left in place ({reason})")]
    #[strum(serialize = "unresolved_low_concordance")]
    UnresolvedLowConcordance { span: Span, reason: UnresolvedReason },
    #[error("winning candidate {candidate_id} has no frequency table, consensus correction skipped")]
    #[strum(serialize = "missing_frequency_table")]
    MissingFrequencyTable { candidate_id: String }
}

/// Everything produced for a single sample
#[derive(Clone, Debug)]
pub struct SampleResult {
    /// Opaque sample identifier
    sample_id: String,
    /// Terminal status
    status: SampleStatus,
    /// Winning candidate ID and score, if any
    winner: Option<(String, f64)>,
    /// Score the external tool gave the winner, if it reported one
    winner_external_score: Option<f64>,
    /// Final corrected and oriented sequence
    sequence: Option<Sequence>,
    /// All substitutions, in position order
    corrections: Vec<CorrectionEvent>,
    /// All orientation trials
    orientation_decisions: Vec<OrientationDecision>,
    /// The rejected variant of each decision
    archived_variants: Vec<ArchivedVariant>,
    /// Failing spans that were not re-oriented
    unresolved_spans: Vec<UnresolvedSpan>,
    /// Candidates that were not used
    discards: Vec<DiscardRecord>,
    /// Warnings, or the failure reason
    issues: Vec<SampleIssue>
}

impl SampleResult {
    /// Creates a failed result; no later stage ran
    pub fn failed(sample_id: String, discards: Vec<DiscardRecord>, mut issues: Vec<SampleIssue>) -> Self {
        if !issues.contains(&SampleIssue::NoViableCandidate) {
            issues.push(SampleIssue::NoViableCandidate);
        }
        Self {
            sample_id,
            status: SampleStatus::Failed,
            winner: None,
            winner_external_score: None,
            sequence: None,
            corrections: vec![],
            orientation_decisions: vec![],
            archived_variants: vec![],
            unresolved_spans: vec![],
            discards,
            issues
        }
    }

    /// Creates a successful result; the status is derived from the warnings
    #[allow(clippy::too_many_arguments)]
    pub fn succeeded(
        sample_id: String, winner: (String, f64), sequence: Sequence,
        corrections: Vec<CorrectionEvent>,
        orientation_decisions: Vec<OrientationDecision>,
        archived_variants: Vec<ArchivedVariant>,
        unresolved_spans: Vec<UnresolvedSpan>,
        discards: Vec<DiscardRecord>,
        issues: Vec<SampleIssue>
    ) -> Self {
        let status = if issues.is_empty() {
            SampleStatus::Succeeded
        } else {
            SampleStatus::SucceededWithWarnings
        };
        Self {
            sample_id,
            status,
            winner: Some(winner),
            winner_external_score: None,
            sequence: Some(sequence),
            corrections,
            orientation_decisions,
            archived_variants,
            unresolved_spans,
            discards,
            issues
        }
    }

    pub fn with_winner_external_score(mut self, external_score: Option<f64>) -> Self {
        self.winner_external_score = external_score;
        self
    }

    /// Number of corrections that were plurality-only
    pub fn ambiguous_corrections(&self) -> usize {
        self.corrections.iter()
            .filter(|c| c.is_ambiguous())
            .count()
    }

    /// Number of spans that were actually flipped
    pub fn flipped_spans(&self) -> usize {
        self.orientation_decisions.iter()
            .filter(|d| d.is_flipped())
            .count()
    }

    // getters
    pub fn sample_id(&self) -> &str {
        &self.sample_id
    }

    pub fn status(&self) -> SampleStatus {
        self.status
    }

    pub fn winner(&self) -> Option<&(String, f64)> {
        self.winner.as_ref()
    }

    pub fn winner_external_score(&self) -> Option<f64> {
        self.winner_external_score
    }

    pub fn sequence(&self) -> Option<&Sequence> {
        self.sequence.as_ref()
    }

    pub fn corrections(&self) -> &[CorrectionEvent] {
        &self.corrections
    }

    pub fn orientation_decisions(&self) -> &[OrientationDecision] {
        &self.orientation_decisions
    }

    pub fn archived_variants(&self) -> &[ArchivedVariant] {
        &self.archived_variants
    }

    pub fn unresolved_spans(&self) -> &[UnresolvedSpan] {
        &self.unresolved_spans
    }

    pub fn discards(&self) -> &[DiscardRecord] {
        &self.discards
    }

    pub fn issues(&self) -> &[SampleIssue] {
        &self.issues
    }
}
