/*!
# Pipeline
Runs every stage for a sample: selection, consensus correction, and orientation repair.
A sample with no viable candidate short-circuits as failed, the later stages never run.
Batches run samples in parallel, each sample is processed sequentially on a single worker.
*/
use derive_builder::Builder;
use indicatif::ParallelProgressIterator;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::assembly_selector::{SelectorConfig, select_assembly};
use crate::consensus_corrector::{CorrectorConfig, correct_sequence};
use crate::data_types::candidate::CandidateAssembly;
use crate::data_types::reference::ReferenceGenome;
use crate::data_types::sample_result::{SampleIssue, SampleResult, SampleStatus};
use crate::orientation::kmer_index::KmerIndex;
use crate::orientation::repairer::{OrientationConfig, repair_orientation};
use crate::util::progress_bar::get_progress_style;

/// All the stage configurations in one place
#[derive(Builder, Clone, Copy, Debug, PartialEq, Serialize)]
#[builder(default)]
pub struct PipelineConfig {
    /// Candidate screening
    selector: SelectorConfig,
    /// Majority vote parameters
    corrector: CorrectorConfig,
    /// Window scan and flip parameters
    orientation: OrientationConfig,
    /// k-mer length for the reference index
    kmer_size: usize
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            selector: Default::default(),
            corrector: Default::default(),
            orientation: Default::default(),
            kmer_size: 16
        }
    }
}

impl PipelineConfig {
    pub fn selector(&self) -> &SelectorConfig {
        &self.selector
    }

    pub fn corrector(&self) -> &CorrectorConfig {
        &self.corrector
    }

    pub fn orientation(&self) -> &OrientationConfig {
        &self.orientation
    }

    pub fn kmer_size(&self) -> usize {
        self.kmer_size
    }
}

/// One sample and all of its candidate assemblies
#[derive(Clone, Debug)]
pub struct SampleInput {
    pub sample_id: String,
    /// Candidates in manifest order, which is the final selection tie-break
    pub candidates: Vec<CandidateAssembly>
}

/// Shared flag for stopping a batch early.
/// Samples check it before starting and between stages; a cancelled sample is dropped entirely.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation, visible to every clone of this token
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cancels this token when the user interrupts the process (Ctrl-C).
    /// Samples that already finished keep their results, so the caller can still write outputs.
    /// Can only be installed once per process.
    /// # Errors
    /// * if a handler is already installed or the signal cannot be hooked
    pub fn cancel_on_interrupt(&self) -> Result<(), ctrlc::Error> {
        let token = self.clone();
        ctrlc::set_handler(move || token.interrupt())
    }

    /// Handler body for a user interrupt
    fn interrupt(&self) {
        if !self.is_cancelled() {
            warn!("Interrupt received, finishing with the samples completed so far");
        }
        self.cancel();
    }
}

/// Errors that halt the whole batch
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum FatalError {
    #[error("unable to allocate {bytes} bytes while processing sample {sample_id}")]
    ResourceExhausted { sample_id: String, bytes: usize }
}

/// Pre-checks that the working copies for the correction and orientation stages fit in memory.
/// Each stage holds one copy of the sequence beyond the input. The trial buffer is released right away,
/// so this only turns an obvious allocation failure into a `FatalError` before any stage runs;
/// the stages themselves allocate normally.
fn check_working_memory(sample_id: &str, length: usize) -> Result<(), FatalError> {
    let bytes = length.saturating_mul(2);
    let mut buffer: Vec<u8> = Vec::new();
    buffer.try_reserve_exact(bytes)
        .map_err(|_e| FatalError::ResourceExhausted { sample_id: sample_id.to_string(), bytes })
}

/// Runs all stages for a single sample.
/// # Arguments
/// * `sample` - the sample and its candidates
/// * `reference` - the shared reference genome
/// * `reference_index` - k-mer index of the reference
/// * `config` - stage parameters
/// * `token` - cancellation flag
/// # Returns
/// * `Ok(None)` if the sample was cancelled, any partial work is discarded
/// # Errors
/// * if the working memory for the sample cannot be allocated
pub fn run_sample(
    sample: &SampleInput, reference: &ReferenceGenome, reference_index: &KmerIndex,
    config: &PipelineConfig, token: &CancellationToken
) -> Result<Option<SampleResult>, FatalError> {
    let sample_id = sample.sample_id.as_str();
    if token.is_cancelled() {
        return Ok(None);
    }

    // selection
    let selection = select_assembly(sample_id, &sample.candidates, reference, reference_index, &config.selector);
    let (winner, score) = match selection.winner {
        Some(w) => (&sample.candidates[w.index], w.score),
        None => {
            debug!("{sample_id}: no viable candidate out of {}", sample.candidates.len());
            return Ok(Some(SampleResult::failed(sample_id.to_string(), selection.discards, vec![])));
        }
    };
    let winning_sequence = match winner.sequence() {
        Ok(s) => s,
        Err(reason) => {
            // the selector never picks these, but we do not want to crash the batch if it does
            let issue = SampleIssue::InputMalformed { detail: reason.to_string() };
            return Ok(Some(SampleResult::failed(sample_id.to_string(), selection.discards, vec![issue])));
        }
    };
    debug!("{sample_id}: selected {} with score {score:.4}", winner.candidate_id());
    check_working_memory(sample_id, winning_sequence.len())?;

    if token.is_cancelled() {
        return Ok(None);
    }

    // correction
    let mut issues = vec![];
    let (corrected, corrections) = match winner.frequency_table() {
        Some(table) => {
            let anchored = table.anchored(winning_sequence);
            let outcome = correct_sequence(winning_sequence, &anchored, &config.corrector);
            let ambiguous = outcome.events.iter().filter(|e| e.is_ambiguous()).count();
            if ambiguous > 0 {
                issues.push(SampleIssue::AmbiguousVote { count: ambiguous });
            }
            if !outcome.skipped_positions.is_empty() {
                issues.push(SampleIssue::InputMalformed {
                    detail: format!(
                        "{} frequency position(s) beyond sequence length {}, first at {}",
                        outcome.skipped_positions.len(), winning_sequence.len(), outcome.skipped_positions[0] + 1
                    )
                });
            }
            debug!("{sample_id}: {} correction(s), {ambiguous} plurality-only", outcome.events.len());
            (outcome.sequence, outcome.events)
        },
        None => {
            issues.push(SampleIssue::MissingFrequencyTable { candidate_id: winner.candidate_id().to_string() });
            (winning_sequence.clone(), vec![])
        }
    };

    if token.is_cancelled() {
        return Ok(None);
    }

    // orientation
    let repair = repair_orientation(&corrected, reference_index, reference, &config.orientation);
    for unresolved in repair.unresolved.iter() {
        issues.push(SampleIssue::UnresolvedLowConcordance { span: unresolved.span, reason: unresolved.reason });
    }
    debug!(
        "{sample_id}: {} orientation trial(s), {} unresolved span(s)",
        repair.decisions.len(), repair.unresolved.len()
    );

    if token.is_cancelled() {
        return Ok(None);
    }

    Ok(Some(SampleResult::succeeded(
        sample_id.to_string(),
        (winner.candidate_id().to_string(), score),
        repair.sequence,
        corrections,
        repair.decisions,
        repair.archived,
        repair.unresolved,
        selection.discards,
        issues
    ).with_winner_external_score(winner.external_score())))
}

/// Results from a full batch
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Completed samples, sorted by sample ID
    results: Vec<SampleResult>,
    /// Number of samples dropped due to cancellation
    cancelled: usize
}

impl BatchReport {
    /// Number of completed samples with the given status
    pub fn count_status(&self, status: SampleStatus) -> usize {
        self.results.iter()
            .filter(|r| r.status() == status)
            .count()
    }

    pub fn results(&self) -> &[SampleResult] {
        &self.results
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled
    }
}

/// Runs every sample on the rayon pool.
/// # Arguments
/// * `samples` - all samples in the batch
/// * `reference` - the shared reference genome
/// * `reference_index` - k-mer index of the reference
/// * `config` - stage parameters
/// * `token` - cancellation flag, checked by each sample
/// # Errors
/// * if any sample hits a fatal error; the remaining samples are stopped
pub fn run_batch(
    samples: Vec<SampleInput>, reference: &ReferenceGenome, reference_index: &KmerIndex,
    config: &PipelineConfig, token: &CancellationToken
) -> Result<BatchReport, FatalError> {
    let num_samples = samples.len();
    info!("Processing {num_samples} sample(s)...");

    let style = get_progress_style();
    let outcomes: Vec<Option<SampleResult>> = samples.into_par_iter()
        .map(|sample| {
            let result = run_sample(&sample, reference, reference_index, config, token);
            if result.is_err() {
                // stop everything else that has not started yet
                token.cancel();
            }
            result
        })
        .progress_with_style(style)
        .collect::<Result<Vec<_>, FatalError>>()?;

    let mut results: Vec<SampleResult> = outcomes.into_iter().flatten().collect();
    results.sort_by(|a, b| a.sample_id().cmp(b.sample_id()));
    let cancelled = num_samples - results.len();
    if cancelled > 0 {
        warn!("{cancelled} sample(s) were cancelled before completion");
    }

    Ok(BatchReport {
        results,
        cancelled
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::data_types::candidate::AlignmentSummary;
    use crate::data_types::frequency_table::{FrequencyRecord, FrequencyTable};
    use crate::data_types::orientation::{Orientation, UnresolvedReason};
    use crate::data_types::reference::RegionBoundary;
    use crate::data_types::sample_result::DiscardReason;
    use crate::data_types::sequence::{Sequence, complement, reverse_complement};

    fn random_sequence(length: usize, seed: u64) -> Vec<u8> {
        let mut state = seed.max(1);
        (0..length)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                b"ACGT"[((state >> 32) % 4) as usize]
            })
            .collect()
    }

    fn build_reference(bases: &[u8]) -> (ReferenceGenome, KmerIndex) {
        let length = bases.len();
        let q = length / 4;
        let sequence = Sequence::new("reference".to_string(), bases, true).unwrap();
        let regions = vec![
            RegionBoundary::new("LSC".to_string(), 0, q),
            RegionBoundary::new("IRa".to_string(), q, 2 * q),
            RegionBoundary::new("SSC".to_string(), 2 * q, 3 * q),
            RegionBoundary::new("IRb".to_string(), 3 * q, length),
        ];
        let index = KmerIndex::new(bases, 16).unwrap();
        (ReferenceGenome::new(sequence, regions).unwrap(), index)
    }

    /// Frequency table where every listed position fully supports the given bases
    fn agreeing_table(bases: &[u8], positions: &[usize]) -> FrequencyTable {
        FrequencyTable::from_records(positions.iter().map(|&p| {
            let counts: BTreeMap<u8, u64> = [(bases[p], 10)].into_iter().collect();
            (p, FrequencyRecord::new(p, counts, 0).unwrap())
        }))
    }

    fn candidate(id: &str, bases: &[u8], tool_passed: bool, table: Option<FrequencyTable>) -> CandidateAssembly {
        let sequence = Sequence::new(id.to_string(), bases, true).unwrap();
        CandidateAssembly::new(id.to_string(), sequence, tool_passed)
            .with_frequency_table(table)
    }

    #[test]
    fn test_selection_and_success() {
        let ref_bases = random_sequence(10_000, 11);
        let (reference, index) = build_reference(&ref_bases);
        let sample = SampleInput {
            sample_id: "s1".to_string(),
            candidates: vec![
                candidate("good", &ref_bases, true, Some(agreeing_table(&ref_bases, &[0, 100, 5000])))
                    .with_alignment(Some(AlignmentSummary { matched_bases: 9500, aligned_reference_bases: None }))
                    .with_external_score(Some(0.98)),
                candidate("flagged", &ref_bases, false, None)
                    .with_alignment(Some(AlignmentSummary { matched_bases: 4000, aligned_reference_bases: None })),
            ]
        };

        let result = run_sample(&sample, &reference, &index, &PipelineConfig::default(), &CancellationToken::new())
            .unwrap().unwrap();
        assert_eq!(result.status(), SampleStatus::Succeeded);
        let (winner_id, score) = result.winner().unwrap();
        assert_eq!(winner_id, "good");
        assert!((score - 0.95).abs() < 1e-9);
        assert_eq!(result.winner_external_score(), Some(0.98));
        assert_eq!(result.discards().len(), 1);
        assert_eq!(result.discards()[0].candidate_id, "flagged");
        assert_eq!(result.discards()[0].reason, DiscardReason::ToolFlaggedFail);
        assert!(result.corrections().is_empty());
        assert!(result.orientation_decisions().is_empty());
        assert_eq!(result.sequence().unwrap().bases(), &ref_bases[..]);
        assert!(result.issues().is_empty());
    }

    #[test]
    fn test_point_correction() {
        let ref_bases = random_sequence(10_000, 12);
        let (reference, index) = build_reference(&ref_bases);
        let mut assembled = ref_bases.clone();
        assembled[42] = complement(ref_bases[42]);

        let counts: BTreeMap<u8, u64> = [(ref_bases[42], 7), (assembled[42], 3)].into_iter().collect();
        let table = FrequencyTable::from_records([(42, FrequencyRecord::new(42, counts, 0).unwrap())]);
        let sample = SampleInput {
            sample_id: "s1".to_string(),
            candidates: vec![candidate("c1", &assembled, true, Some(table))]
        };

        let result = run_sample(&sample, &reference, &index, &PipelineConfig::default(), &CancellationToken::new())
            .unwrap().unwrap();
        assert_eq!(result.status(), SampleStatus::Succeeded);
        assert_eq!(result.corrections().len(), 1);
        let event = result.corrections()[0];
        assert_eq!(event.position, 42);
        assert_eq!(event.resolved, ref_bases[42]);
        assert!((event.margin - 0.7).abs() < 1e-9);
        assert!(event.true_majority);
        assert_eq!(result.sequence().unwrap().bases(), &ref_bases[..]);
    }

    #[test]
    fn test_long_inversion_repaired() {
        let ref_bases = random_sequence(10_000, 13);
        let (reference, index) = build_reference(&ref_bases);
        let mut assembled = ref_bases.clone();
        assembled[1000..4000].copy_from_slice(&reverse_complement(&ref_bases[1000..4000]));

        let sample = SampleInput {
            sample_id: "s1".to_string(),
            candidates: vec![candidate("c1", &assembled, true, Some(agreeing_table(&assembled, &[10])))]
        };
        let result = run_sample(&sample, &reference, &index, &PipelineConfig::default(), &CancellationToken::new())
            .unwrap().unwrap();
        assert_eq!(result.status(), SampleStatus::Succeeded);
        assert_eq!(result.flipped_spans(), 1);
        assert_eq!(result.sequence().unwrap().bases(), &ref_bases[..]);
        assert_eq!(result.archived_variants().len(), 1);
        assert_eq!(result.archived_variants()[0].orientation, Orientation::Original);
        assert!(result.unresolved_spans().is_empty());
        assert_eq!(result.sequence().unwrap().len(), assembled.len());
    }

    #[test]
    fn test_short_inversion_warns() {
        let ref_bases = random_sequence(10_000, 14);
        let (reference, index) = build_reference(&ref_bases);
        let mut assembled = ref_bases.clone();
        assembled[2000..3500].copy_from_slice(&reverse_complement(&ref_bases[2000..3500]));

        let sample = SampleInput {
            sample_id: "s1".to_string(),
            candidates: vec![candidate("c1", &assembled, true, Some(agreeing_table(&assembled, &[10])))]
        };
        let result = run_sample(&sample, &reference, &index, &PipelineConfig::default(), &CancellationToken::new())
            .unwrap().unwrap();
        assert_eq!(result.status(), SampleStatus::SucceededWithWarnings);
        assert_eq!(result.flipped_spans(), 0);
        assert_eq!(result.unresolved_spans().len(), 1);
        assert!(matches!(
            result.issues()[0],
            SampleIssue::UnresolvedLowConcordance { reason: UnresolvedReason::TooShort, .. }
        ));
        assert_eq!(result.sequence().unwrap().bases(), &assembled[..]);
    }

    #[test]
    fn test_long_divergent_span_warns() {
        // foreign in both orientations, so the trial keeps the original and the sample must not look clean
        let ref_bases = random_sequence(10_000, 18);
        let (reference, index) = build_reference(&ref_bases);
        let mut assembled = ref_bases.clone();
        assembled[4000..7000].copy_from_slice(&random_sequence(3000, 777));

        let sample = SampleInput {
            sample_id: "s1".to_string(),
            candidates: vec![candidate("c1", &assembled, true, Some(agreeing_table(&assembled, &[10])))]
        };
        let result = run_sample(&sample, &reference, &index, &PipelineConfig::default(), &CancellationToken::new())
            .unwrap().unwrap();
        assert_eq!(result.status(), SampleStatus::SucceededWithWarnings);
        assert_eq!(result.flipped_spans(), 0);
        assert_eq!(result.orientation_decisions().len(), 1);
        assert_eq!(result.unresolved_spans().len(), 1);
        assert_eq!(result.unresolved_spans()[0].reason, UnresolvedReason::ReorientationNotBetter);
        assert!(result.unresolved_spans()[0].span.len() > 2000);
        assert!(result.issues()[0].to_string().contains("reorientation_not_better"));
        assert_eq!(result.sequence().unwrap().bases(), &assembled[..]);
    }

    #[test]
    fn test_missing_table_and_skipped_positions() {
        let ref_bases = random_sequence(10_000, 15);
        let (reference, index) = build_reference(&ref_bases);

        let sample = SampleInput {
            sample_id: "s1".to_string(),
            candidates: vec![candidate("c1", &ref_bases, true, None)]
        };
        let result = run_sample(&sample, &reference, &index, &PipelineConfig::default(), &CancellationToken::new())
            .unwrap().unwrap();
        assert_eq!(result.status(), SampleStatus::SucceededWithWarnings);
        assert_eq!(result.issues(), &[SampleIssue::MissingFrequencyTable { candidate_id: "c1".to_string() }]);

        let counts: BTreeMap<u8, u64> = [(b'A', 5)].into_iter().collect();
        let table = FrequencyTable::from_records([(20_000, FrequencyRecord::new(20_000, counts, 0).unwrap())]);
        let sample = SampleInput {
            sample_id: "s1".to_string(),
            candidates: vec![candidate("c1", &ref_bases, true, Some(table))]
        };
        let result = run_sample(&sample, &reference, &index, &PipelineConfig::default(), &CancellationToken::new())
            .unwrap().unwrap();
        assert_eq!(result.status(), SampleStatus::SucceededWithWarnings);
        assert!(matches!(result.issues()[0], SampleIssue::InputMalformed { .. }));
        assert_eq!(result.sequence().unwrap().bases(), &ref_bases[..]);
    }

    #[test]
    fn test_no_viable_candidate() {
        let ref_bases = random_sequence(10_000, 16);
        let (reference, index) = build_reference(&ref_bases);
        let sample = SampleInput {
            sample_id: "s1".to_string(),
            candidates: vec![
                candidate("c1", &ref_bases, false, None),
                CandidateAssembly::new_malformed("c2".to_string(), "missing file".to_string(), true),
            ]
        };
        let result = run_sample(&sample, &reference, &index, &PipelineConfig::default(), &CancellationToken::new())
            .unwrap().unwrap();
        assert_eq!(result.status(), SampleStatus::Failed);
        assert!(result.sequence().is_none());
        assert!(result.winner().is_none());
        assert_eq!(result.issues(), &[SampleIssue::NoViableCandidate]);
        assert_eq!(result.discards().len(), 2);
        assert!(result.corrections().is_empty());
        assert!(result.orientation_decisions().is_empty());
    }

    #[test]
    fn test_batch_sorted() {
        let ref_bases = random_sequence(5_000, 17);
        let (reference, index) = build_reference(&ref_bases);
        let samples: Vec<SampleInput> = ["s3", "s1", "s2"].iter()
            .map(|&sample_id| SampleInput {
                sample_id: sample_id.to_string(),
                candidates: vec![candidate("c1", &ref_bases, sample_id != "s2", Some(agreeing_table(&ref_bases, &[0])))]
            })
            .collect();

        let report = run_batch(samples, &reference, &index, &PipelineConfig::default(), &CancellationToken::new()).unwrap();
        let ids: Vec<&str> = report.results().iter().map(|r| r.sample_id()).collect();
        assert_eq!(ids, vec!["s1", "s2", "s3"]);
        assert_eq!(report.count_status(SampleStatus::Succeeded), 2);
        assert_eq!(report.count_status(SampleStatus::Failed), 1);
        assert_eq!(report.cancelled(), 0);
    }

    #[test]
    fn test_cancellation() {
        let ref_bases = random_sequence(5_000, 18);
        let (reference, index) = build_reference(&ref_bases);
        let samples: Vec<SampleInput> = (0..4)
            .map(|i| SampleInput {
                sample_id: format!("s{i}"),
                candidates: vec![candidate("c1", &ref_bases, true, None)]
            })
            .collect();

        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());

        assert!(matches!(run_sample(&samples[0], &reference, &index, &PipelineConfig::default(), &token), Ok(None)));
        let report = run_batch(samples, &reference, &index, &PipelineConfig::default(), &token).unwrap();
        assert!(report.results().is_empty());
        assert_eq!(report.cancelled(), 4);
    }

    #[test]
    fn test_interrupt_keeps_completed() {
        let ref_bases = random_sequence(5_000, 19);
        let (reference, index) = build_reference(&ref_bases);
        let sample = |i: usize| SampleInput {
            sample_id: format!("s{i}"),
            candidates: vec![candidate("c1", &ref_bases, true, None)]
        };
        let config = PipelineConfig::default();

        // the first sample completes before the interrupt arrives
        let token = CancellationToken::new();
        let completed = run_sample(&sample(0), &reference, &index, &config, &token).unwrap();
        assert!(completed.is_some());

        // the handler holds a clone, the batch sees it through the original
        let handler_token = token.clone();
        handler_token.interrupt();
        handler_token.interrupt();
        assert!(token.is_cancelled());

        let report = run_batch(vec![sample(1), sample(2)], &reference, &index, &config, &token).unwrap();
        assert!(report.results().is_empty());
        assert_eq!(report.cancelled(), 2);
        assert_eq!(completed.unwrap().sample_id(), "s0");
    }

    #[test]
    fn test_resource_exhausted() {
        assert!(check_working_memory("s1", 1000).is_ok());
        // the check is on the doubled length, which saturates
        assert_eq!(
            check_working_memory("s1", usize::MAX / 2 + 1).unwrap_err(),
            FatalError::ResourceExhausted { sample_id: "s1".to_string(), bytes: usize::MAX }
        );
        let error = check_working_memory("s1", usize::MAX).unwrap_err();
        assert_eq!(error, FatalError::ResourceExhausted { sample_id: "s1".to_string(), bytes: usize::MAX });
    }

    #[test]
    fn test_config_builder() {
        let config = PipelineConfigBuilder::default()
            .kmer_size(21)
            .build().unwrap();
        assert_eq!(config.kmer_size(), 21);
        assert_eq!(config.corrector(), &CorrectorConfig::default());
        assert_eq!(PipelineConfig::default().kmer_size(), 16);
    }
}
