
use log::trace;

use crate::data_types::candidate::CandidateAssembly;
use crate::data_types::reference::ReferenceGenome;
use crate::data_types::sequence::reverse_complement;
use crate::orientation::kmer_index::KmerIndex;

/// Scores a candidate assembly against the reference, in [0, 1] where higher is better.
/// If the external aligner reported matched bases, the score is identity times coverage, which reduces to matched reference bases over reference length.
/// Otherwise, the score is the fraction of distinct reference k-mers found in the candidate, taking the better of the two candidate strands.
/// This is deterministic and has no side effects.
/// # Arguments
/// * `candidate` - the candidate to score
/// * `reference` - the shared reference genome
/// * `reference_index` - k-mer index of the reference, only used when there is no alignment summary
/// # Returns
/// * None if the candidate has no usable sequence or the reference is empty
pub fn score_candidate(candidate: &CandidateAssembly, reference: &ReferenceGenome, reference_index: &KmerIndex) -> Option<f64> {
    let sequence = candidate.sequence().ok()?;
    let reference_len = reference.len();
    if reference_len == 0 {
        return None;
    }

    if let Some(alignment) = candidate.alignment() {
        // matched bases can never exceed the aligned bases or the reference itself
        let aligned = alignment.aligned_reference_bases.unwrap_or(reference_len as u64);
        let matched = alignment.matched_bases
            .min(aligned)
            .min(reference_len as u64);
        let score = matched as f64 / reference_len as f64;
        trace!("{}: alignment score {score:.4}", candidate.candidate_id());
        return Some(score);
    }

    // no alignment, fall back to k-mer containment on both strands
    let k = reference_index.k();
    let forward = KmerIndex::new(sequence.bases(), k).ok()?;
    let reverse = KmerIndex::new(&reverse_complement(sequence.bases()), k).ok()?;
    let score = [forward, reverse].iter()
        .filter_map(|strand| strand.containment_of(reference_index))
        .fold(0.0_f64, f64::max);
    trace!("{}: k-mer containment score {score:.4}", candidate.candidate_id());
    Some(score)
}
