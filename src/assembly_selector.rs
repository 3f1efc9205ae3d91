/*!
# Assembly selection
Picks one winning candidate assembly per sample.
Candidates flagged as failed by the external tool, malformed candidates, and (optionally) candidates with lengths far from the reference are excluded first.
The highest scoring remaining candidate wins; ties go to the longest sequence and then to input order.
Every candidate that does not win ends up on the review list with a reason, nothing is silently dropped.
*/
use derive_builder::Builder;
use log::debug;
use serde::Serialize;

use crate::assembly_scorer::score_candidate;
use crate::data_types::candidate::CandidateAssembly;
use crate::data_types::reference::ReferenceGenome;
use crate::data_types::sample_result::{DiscardReason, DiscardRecord};
use crate::orientation::kmer_index::KmerIndex;

/// Controls the optional length screening
#[derive(Builder, Clone, Copy, Debug, PartialEq, Serialize)]
#[builder(default)]
pub struct SelectorConfig {
    /// If Some(t), candidate length must be within t * reference length
    length_tolerance: Option<f64>,
    /// Number of the LSC/IRa/SSC/IRb lengths that must also be within tolerance, when both sides report them
    min_region_matches: usize
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            length_tolerance: None,
            min_region_matches: 3
        }
    }
}

impl SelectorConfig {
    pub fn length_tolerance(&self) -> Option<f64> {
        self.length_tolerance
    }

    pub fn min_region_matches(&self) -> usize {
        self.min_region_matches
    }
}

/// The winning candidate
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SelectedCandidate {
    /// Index into the input candidate list
    pub index: usize,
    /// Score from the assembly scorer
    pub score: f64
}

/// Result of selection for one sample
#[derive(Clone, Debug, Default)]
pub struct SelectionOutcome {
    /// None if nothing was viable
    pub winner: Option<SelectedCandidate>,
    /// Every candidate that was not selected, in input order
    pub discards: Vec<DiscardRecord>
}

/// Returns true if `value` is within `tolerance * reference` of `reference`
fn is_within(value: usize, reference: usize, tolerance: f64) -> bool {
    (value as f64 - reference as f64).abs() <= tolerance * reference as f64
}

/// Checks the total length and region lengths against the reference.
/// Returns a reason string if the candidate is out of tolerance.
fn check_lengths(candidate: &CandidateAssembly, reference: &ReferenceGenome, tolerance: f64, min_region_matches: usize) -> Option<String> {
    if !is_within(candidate.len(), reference.len(), tolerance) {
        return Some(format!(
            "length {} is not within {:.1}% of reference length {}", candidate.len(), tolerance * 100.0, reference.len()
        ));
    }

    if let (Some(observed), Some(expected)) = (candidate.region_lengths(), reference.region_lengths()) {
        let matching = observed.as_array().iter()
            .zip(expected.as_array().iter())
            .filter(|(&o, &e)| is_within(o, e, tolerance))
            .count();
        if matching < min_region_matches {
            return Some(format!(
                "only {matching} of 4 region lengths are within {:.1}% of the reference, {min_region_matches} required", tolerance * 100.0
            ));
        }
    }
    None
}

/// Main entry point for selecting an assembly.
/// # Arguments
/// * `sample_id` - sample label for the review list
/// * `candidates` - all candidates for the sample, in input order
/// * `reference` - shared reference genome
/// * `reference_index` - shared reference k-mer index, used for scoring
/// * `config` - screening parameters
pub fn select_assembly(
    sample_id: &str, candidates: &[CandidateAssembly],
    reference: &ReferenceGenome, reference_index: &KmerIndex,
    config: &SelectorConfig
) -> SelectionOutcome {
    let mut discards: Vec<(usize, DiscardRecord)> = vec![];
    let mut viable: Vec<(usize, f64)> = vec![];

    for (c_index, candidate) in candidates.iter().enumerate() {
        let candidate_id = candidate.candidate_id();
        if !candidate.tool_passed() {
            discards.push((c_index, DiscardRecord::new(
                sample_id, candidate_id, DiscardReason::ToolFlaggedFail,
                "flagged as failed by the assembly tool".to_string()
            )));
            continue;
        }

        if let Err(reason) = candidate.sequence() {
            discards.push((c_index, DiscardRecord::new(
                sample_id, candidate_id, DiscardReason::InputMalformed, reason.to_string()
            )));
            continue;
        }

        if let Some(tolerance) = config.length_tolerance {
            if let Some(detail) = check_lengths(candidate, reference, tolerance, config.min_region_matches) {
                discards.push((c_index, DiscardRecord::new(
                    sample_id, candidate_id, DiscardReason::LengthOutOfTolerance, detail
                )));
                continue;
            }
        }

        match score_candidate(candidate, reference, reference_index) {
            Some(score) => {
                debug!("{sample_id}: candidate {candidate_id} scored {score:.4}");
                viable.push((c_index, score));
            },
            None => {
                discards.push((c_index, DiscardRecord::new(
                    sample_id, candidate_id, DiscardReason::InputMalformed, "candidate could not be scored".to_string()
                )));
            }
        }
    }

    // highest score, then longest, then first in input order
    let mut best: Option<(usize, f64)> = None;
    for &(c_index, score) in viable.iter() {
        let is_better = match best {
            None => true,
            Some((b_index, b_score)) => {
                score > b_score || (score == b_score && candidates[c_index].len() > candidates[b_index].len())
            }
        };
        if is_better {
            best = Some((c_index, score));
        }
    }

    if let Some((w_index, w_score)) = best {
        for &(c_index, score) in viable.iter().filter(|(c_index, _s)| *c_index != w_index) {
            discards.push((c_index, DiscardRecord::new(
                sample_id, candidates[c_index].candidate_id(), DiscardReason::ScoreBelowAll,
                format!("score {score:.4} did not beat {} ({w_score:.4})", candidates[w_index].candidate_id())
            )));
        }
    }

    discards.sort_by_key(|(c_index, _d)| *c_index);
    SelectionOutcome {
        winner: best.map(|(index, score)| SelectedCandidate { index, score }),
        discards: discards.into_iter().map(|(_i, d)| d).collect()
    }
}
