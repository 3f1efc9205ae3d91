/*!
# Orientation repair
Finds long runs of low k-mer concordance and tries replacing them with their reverse complement.
This targets the classic plastome assembly artifact where an inverted repeat and a single-copy region end up flipped.

The process for each pass is:
1. Scan the sequence in fixed windows against the reference k-mers.
2. Merge adjacent failing windows into maximal spans.
3. Spans longer than `min_flip_span` get their edges refined to k-mer resolution and are trialed in reverse complement.
4. Both variants are rescored over the span plus a flanking margin; the flipped variant has to be strictly better to win.

Every trial is recorded as an `OrientationDecision`, and the losing variant is archived.
Short failing spans are never flipped, they are reported as unresolved along with any other span that still fails at the end.
*/
use derive_builder::Builder;
use log::{debug, trace};
use serde::Serialize;

use crate::data_types::orientation::{ArchivedVariant, Orientation, OrientationDecision, Span, UnresolvedReason, UnresolvedSpan, WindowScore};
use crate::data_types::reference::ReferenceGenome;
use crate::data_types::sequence::{Sequence, reverse_complement};
use crate::orientation::kmer_index::KmerIndex;
use crate::orientation::window_scanner::{WindowScanner, mean_concordance};

/// Upper bound on repair passes, regardless of configuration
pub const MAX_REPAIR_PASSES: usize = 3;

/// Controls the window scan and the flip policy
#[derive(Builder, Clone, Copy, Debug, PartialEq, Serialize)]
#[builder(default)]
pub struct OrientationConfig {
    /// Scan window width in bp
    window_size: usize,
    /// Minimum window concordance to pass, inclusive
    concordance_threshold: f64,
    /// Failing spans must be strictly longer than this to be trialed
    min_flip_span: usize,
    /// Extra bases on each side of a trial span used during rescoring
    flank_margin: usize,
    /// Number of full scan passes; clamped to 1..=MAX_REPAIR_PASSES
    max_passes: usize
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            window_size: 400,
            concordance_threshold: 0.6,
            min_flip_span: 2000,
            flank_margin: 200,
            max_passes: 2
        }
    }
}

impl OrientationConfig {
    // getters
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn concordance_threshold(&self) -> f64 {
        self.concordance_threshold
    }

    pub fn min_flip_span(&self) -> usize {
        self.min_flip_span
    }

    pub fn flank_margin(&self) -> usize {
        self.flank_margin
    }

    pub fn max_passes(&self) -> usize {
        self.max_passes.clamp(1, MAX_REPAIR_PASSES)
    }
}

/// Everything the repairer produces for one sequence
#[derive(Clone, Debug)]
pub struct RepairOutcome {
    /// The final sequence, same length as the input
    pub sequence: Sequence,
    /// One entry per trial, in the order they were made
    pub decisions: Vec<OrientationDecision>,
    /// The losing variant for each decision
    pub archived: Vec<ArchivedVariant>,
    /// Failing spans left as-is in the final sequence
    pub unresolved: Vec<UnresolvedSpan>
}

/// Merges runs of adjacent failing windows into spans, paired with their mean concordance.
/// Windows that could not be scored break a run.
/// # Arguments
/// * `windows` - contiguous window scores in position order
pub fn merge_failing_windows(windows: &[WindowScore]) -> Vec<(Span, f64)> {
    let mut spans = vec![];
    let mut current: Option<(Span, f64, usize)> = None;
    for window in windows.iter() {
        if window.is_failing() {
            let concordance = window.concordance.unwrap_or(0.0);
            current = match current {
                Some((span, total, count)) if span.end == window.start => {
                    Some((Span::new(span.start, window.end), total + concordance, count + 1))
                },
                Some((span, total, count)) => {
                    spans.push((span, total / count as f64));
                    Some((Span::new(window.start, window.end), concordance, 1))
                },
                None => Some((Span::new(window.start, window.end), concordance, 1))
            };
        } else if let Some((span, total, count)) = current.take() {
            spans.push((span, total / count as f64));
        }
    }

    if let Some((span, total, count)) = current {
        spans.push((span, total / count as f64));
    }
    spans
}

/// Narrows a window-aligned span to the inversion breakpoints at k-mer resolution.
/// The left edge becomes the end of the last matching k-mer near the span start, and the right edge becomes the first matching k-mer near the span end.
/// Each search looks at most one window beyond the span edge.
/// Falls back to the original span if refinement would collapse it.
/// # Arguments
/// * `bases` - the full sequence
/// * `index` - reference k-mers
/// * `span` - the window-aligned failing span
/// * `window_size` - the scan window size
pub fn refine_span(bases: &[u8], index: &KmerIndex, span: Span, window_size: usize) -> Span {
    let k = index.k();
    let lo = span.start.saturating_sub(window_size);
    let hi = (span.end + window_size).min(bases.len());
    if hi < lo + k {
        return span;
    }
    let hits = index.hits(&bases[lo..hi]);

    // left edge: k-mers must end before the end of the first failing window
    let left_limit = (span.start + window_size).min(span.end);
    let start = (lo..=left_limit.saturating_sub(k))
        .rev()
        .find(|&s| hits.get(s - lo) == Some(&Some(true)))
        .map(|s| s + k)
        .unwrap_or(span.start);

    // right edge: k-mers must start inside the last failing window or after it
    let right_from = span.end.saturating_sub(window_size).max(span.start);
    let end = (right_from..=hi - k)
        .find(|&s| hits.get(s - lo) == Some(&Some(true)))
        .unwrap_or(span.end);

    if start < end {
        Span::new(start, end)
    } else {
        span
    }
}

/// Rescores a region of the sequence in both orientations of the trial span.
/// Returns (original mean concordance, flipped mean concordance); unscored regions count as 0.
fn rescore_trial(bases: &[u8], index: &KmerIndex, trial: Span, config: &OrientationConfig) -> (f64, f64) {
    let region_start = trial.start.saturating_sub(config.flank_margin);
    let region_end = (trial.end + config.flank_margin).min(bases.len());

    let original = &bases[region_start..region_end];
    let mut flipped = original.to_vec();
    let local_start = trial.start - region_start;
    let local_end = trial.end - region_start;
    flipped[local_start..local_end].copy_from_slice(&reverse_complement(&original[local_start..local_end]));

    let score = |region: &[u8]| -> f64 {
        let windows: Vec<WindowScore> = WindowScanner::new(region, index, config.window_size, config.concordance_threshold).collect();
        mean_concordance(&windows).unwrap_or(0.0)
    };
    (score(original), score(&flipped))
}

/// Main entry point for repairing the orientation of a sequence.
/// Both the detected span and the refined span must be longer than `min_flip_span` for a trial to happen.
/// # Arguments
/// * `sequence` - the (corrected) sequence to repair
/// * `index` - k-mer index of the reference orientation
/// * `reference` - reference genome, only used to label unresolved spans
/// * `config` - scan and flip parameters
pub fn repair_orientation(sequence: &Sequence, index: &KmerIndex, reference: &ReferenceGenome, config: &OrientationConfig) -> RepairOutcome {
    let mut bases: Vec<u8> = sequence.bases().to_vec();
    let mut decisions: Vec<OrientationDecision> = vec![];
    let mut archived: Vec<ArchivedVariant> = vec![];
    // detected span -> refined span, for spans that shrank to the minimum or below
    let mut short_refined: Vec<(Span, Span)> = vec![];

    for pass in 1..=config.max_passes() {
        let windows: Vec<WindowScore> = WindowScanner::new(&bases, index, config.window_size, config.concordance_threshold).collect();
        let failing = merge_failing_windows(&windows);
        debug!("{}: pass {pass} found {} failing span(s)", sequence.id(), failing.len());

        let mut any_flipped = false;
        for (detected_span, _concordance) in failing.into_iter() {
            if detected_span.len() <= config.min_flip_span || decisions.iter().any(|d| d.detected_span == detected_span) {
                continue;
            }

            let trial_span = refine_span(&bases, index, detected_span, config.window_size);
            if trial_span.len() <= config.min_flip_span {
                trace!("{}: span {detected_span} refined to {trial_span}, too short to trial", sequence.id());
                if !short_refined.iter().any(|(d, _r)| *d == detected_span) {
                    short_refined.push((detected_span, trial_span));
                }
                continue;
            }

            let (original_score, flipped_score) = rescore_trial(&bases, index, trial_span, config);
            trace!("{}: span {detected_span} refined to {trial_span}, scores {original_score:.4} vs {flipped_score:.4}", sequence.id());

            let original_bases = bases[trial_span.start..trial_span.end].to_vec();
            let flipped_bases = reverse_complement(&original_bases);
            let chosen = if flipped_score > original_score {
                Orientation::ReverseComplemented
            } else {
                Orientation::Original
            };

            let rejected_bases = match chosen {
                Orientation::ReverseComplemented => {
                    bases[trial_span.start..trial_span.end].copy_from_slice(&flipped_bases);
                    any_flipped = true;
                    original_bases
                },
                Orientation::Original => flipped_bases
            };
            debug!("{}: span {trial_span} kept as {chosen}", sequence.id());

            archived.push(ArchivedVariant {
                span: trial_span,
                orientation: chosen.opposite(),
                bases: rejected_bases
            });
            decisions.push(OrientationDecision {
                detected_span,
                trial_span,
                chosen,
                original_score,
                flipped_score,
                pass
            });
        }

        if !any_flipped {
            // nothing changed, another pass would find the same spans
            break;
        }
    }

    // everything that still fails in the final sequence is unresolved, labelled by why it was left alone
    let windows: Vec<WindowScore> = WindowScanner::new(&bases, index, config.window_size, config.concordance_threshold).collect();
    let unresolved: Vec<UnresolvedSpan> = merge_failing_windows(&windows).into_iter()
        .filter_map(|(detected_span, mean_concordance)| {
            let decision = decisions.iter().find(|d| d.detected_span == detected_span);
            let (span, reason) = match decision {
                // flipped spans that still fail were already given their chance
                Some(d) if d.is_flipped() => return None,
                Some(d) => (d.trial_span, UnresolvedReason::ReorientationNotBetter),
                None => match short_refined.iter().find(|(d, _r)| *d == detected_span) {
                    Some((_d, refined)) => (*refined, UnresolvedReason::TooShort),
                    None if detected_span.len() <= config.min_flip_span => (detected_span, UnresolvedReason::TooShort),
                    None => (detected_span, UnresolvedReason::PassLimitReached)
                }
            };
            Some(UnresolvedSpan {
                span,
                mean_concordance,
                reference_regions: reference.overlapping_regions(span.start, span.end),
                reason
            })
        })
        .collect();

    RepairOutcome {
        sequence: sequence.with_bases(bases),
        decisions,
        archived,
        unresolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::reference::RegionBoundary;

    /// Deterministic pseudo-random sequence for synthetic genomes
    fn random_sequence(length: usize, seed: u64) -> Vec<u8> {
        let mut state = seed.max(1);
        (0..length)
            .map(|_| {
                // xorshift64
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                b"ACGT"[((state >> 32) % 4) as usize]
            })
            .collect()
    }

    /// Reference with the given bases and a simple 4 region layout
    fn build_reference(bases: &[u8]) -> ReferenceGenome {
        let length = bases.len();
        let q = length / 4;
        let sequence = Sequence::new("reference".to_string(), bases, true).unwrap();
        let regions = vec![
            RegionBoundary::new("LSC".to_string(), 0, q),
            RegionBoundary::new("IRa".to_string(), q, 2 * q),
            RegionBoundary::new("SSC".to_string(), 2 * q, 3 * q),
            RegionBoundary::new("IRb".to_string(), 3 * q, length),
        ];
        ReferenceGenome::new(sequence, regions).unwrap()
    }

    /// Copies the reference and inverts [start, end)
    fn invert(bases: &[u8], start: usize, end: usize) -> Vec<u8> {
        let mut inverted = bases.to_vec();
        inverted[start..end].copy_from_slice(&reverse_complement(&bases[start..end]));
        inverted
    }

    fn overall_concordance(bases: &[u8], index: &KmerIndex) -> f64 {
        let windows: Vec<WindowScore> = WindowScanner::new(bases, index, 400, 0.6).collect();
        mean_concordance(&windows).unwrap()
    }

    #[test]
    fn test_merge_failing_windows() {
        let w = |start: usize, end: usize, c: Option<f64>| WindowScore {
            start, end, concordance: c, passed: c.map(|v| v >= 0.6)
        };
        let windows = vec![
            w(0, 10, Some(0.9)),
            w(10, 20, Some(0.2)),
            w(20, 30, Some(0.4)),
            w(30, 40, None),
            w(40, 50, Some(0.1)),
            w(50, 60, Some(0.7)),
            w(60, 65, Some(0.3)),
        ];
        let spans = merge_failing_windows(&windows);
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0].0, Span::new(10, 30));
        assert!((spans[0].1 - 0.3).abs() < 1e-9);
        assert_eq!(spans[1].0, Span::new(40, 50));
        assert_eq!(spans[2].0, Span::new(60, 65));
        assert!(merge_failing_windows(&[]).is_empty());
    }

    #[test]
    fn test_clean_sequence_untouched() {
        let ref_bases = random_sequence(10_000, 17);
        let reference = build_reference(&ref_bases);
        let index = KmerIndex::new(&ref_bases, 16).unwrap();
        let sequence = Sequence::new("clean".to_string(), &ref_bases, true).unwrap();

        let outcome = repair_orientation(&sequence, &index, &reference, &OrientationConfig::default());
        assert_eq!(outcome.sequence, sequence);
        assert!(outcome.decisions.is_empty());
        assert!(outcome.archived.is_empty());
        assert!(outcome.unresolved.is_empty());
    }

    #[test]
    fn test_long_inversion_flipped() {
        let ref_bases = random_sequence(10_000, 42);
        let reference = build_reference(&ref_bases);
        let index = KmerIndex::new(&ref_bases, 16).unwrap();

        let inverted = invert(&ref_bases, 1000, 4000);
        let sequence = Sequence::new("sample".to_string(), &inverted, true).unwrap();
        let pre_flip = overall_concordance(&inverted, &index);
        assert!(pre_flip < 0.8);

        // the inverted span itself is well below the threshold
        let span_windows: Vec<WindowScore> = WindowScanner::new(&inverted[1200..3600], &index, 400, 0.6).collect();
        assert!(mean_concordance(&span_windows).unwrap() < 0.6);

        let outcome = repair_orientation(&sequence, &index, &reference, &OrientationConfig::default());
        assert_eq!(outcome.sequence.len(), inverted.len());
        assert_eq!(outcome.decisions.len(), 1);
        let decision = &outcome.decisions[0];
        assert_eq!(decision.chosen, Orientation::ReverseComplemented);
        assert!(decision.detected_span.len() > 2000);
        assert!(decision.flipped_score > decision.original_score);
        assert_eq!(decision.pass, 1);

        // the rejected variant is the assembled orientation
        assert_eq!(outcome.archived.len(), 1);
        let archive = &outcome.archived[0];
        assert_eq!(archive.orientation, Orientation::Original);
        assert_eq!(archive.bases, inverted[archive.span.start..archive.span.end].to_vec());

        let post_flip = overall_concordance(outcome.sequence.bases(), &index);
        assert!(post_flip > pre_flip);
        assert!(post_flip > 0.9);
    }

    #[test]
    fn test_short_inversion_unresolved() {
        let ref_bases = random_sequence(10_000, 7);
        let reference = build_reference(&ref_bases);
        let index = KmerIndex::new(&ref_bases, 16).unwrap();

        let inverted = invert(&ref_bases, 2000, 3500);
        let sequence = Sequence::new("sample".to_string(), &inverted, true).unwrap();

        let outcome = repair_orientation(&sequence, &index, &reference, &OrientationConfig::default());
        assert_eq!(outcome.sequence, sequence);
        assert!(outcome.decisions.is_empty());
        assert_eq!(outcome.unresolved.len(), 1);
        let unresolved = &outcome.unresolved[0];
        assert!(unresolved.span.len() <= 2000);
        assert!(unresolved.span.start <= 2000 && unresolved.span.end >= 3500);
        assert!(unresolved.mean_concordance < 0.6);
        assert_eq!(unresolved.reference_regions, vec!["LSC".to_string(), "IRa".to_string()]);
        assert_eq!(unresolved.reason, UnresolvedReason::TooShort);
    }

    #[test]
    fn test_refined_span_below_minimum() {
        // the partially inverted edge windows push the detected span over the minimum, the real inversion is shorter
        let ref_bases = random_sequence(10_000, 42);
        let reference = build_reference(&ref_bases);
        let index = KmerIndex::new(&ref_bases, 16).unwrap();

        let inverted = invert(&ref_bases, 1030, 2970);
        let sequence = Sequence::new("sample".to_string(), &inverted, true).unwrap();
        let windows: Vec<WindowScore> = WindowScanner::new(&inverted, &index, 400, 0.6).collect();
        let detected = merge_failing_windows(&windows);
        assert_eq!(detected.len(), 1);
        assert!(detected[0].0.len() > 2000);
        assert_eq!(refine_span(&inverted, &index, detected[0].0, 400), Span::new(1030, 2970));

        let outcome = repair_orientation(&sequence, &index, &reference, &OrientationConfig::default());
        assert_eq!(outcome.sequence, sequence);
        assert!(outcome.decisions.is_empty());
        assert!(outcome.archived.is_empty());
        assert_eq!(outcome.unresolved.len(), 1);
        let unresolved = &outcome.unresolved[0];
        assert_eq!(unresolved.span, Span::new(1030, 2970));
        assert!(unresolved.span.len() <= 2000);
        assert_eq!(unresolved.reason, UnresolvedReason::TooShort);
    }

    #[test]
    fn test_exact_breakpoints() {
        // neither breakpoint is on a window boundary
        let ref_bases = random_sequence(10_000, 42);
        let reference = build_reference(&ref_bases);
        let index = KmerIndex::new(&ref_bases, 16).unwrap();

        let inverted = invert(&ref_bases, 1030, 4170);
        let sequence = Sequence::new("sample".to_string(), &inverted, true).unwrap();

        let outcome = repair_orientation(&sequence, &index, &reference, &OrientationConfig::default());
        assert_eq!(outcome.decisions.len(), 1);
        let decision = &outcome.decisions[0];
        assert_eq!(decision.detected_span, Span::new(800, 4400));
        assert_eq!(decision.trial_span, Span::new(1030, 4170));
        assert!(decision.is_flipped());
        assert_eq!(outcome.sequence.bases(), &ref_bases[..]);
        assert!(outcome.unresolved.is_empty());
    }

    #[test]
    fn test_divergent_span_kept() {
        // a long stretch that is foreign in both orientations should be trialed but never flipped
        let ref_bases = random_sequence(10_000, 99);
        let reference = build_reference(&ref_bases);
        let index = KmerIndex::new(&ref_bases, 16).unwrap();

        let mut divergent = ref_bases.clone();
        let foreign = random_sequence(3000, 12345);
        divergent[5000..8000].copy_from_slice(&foreign);
        let sequence = Sequence::new("sample".to_string(), &divergent, true).unwrap();

        let outcome = repair_orientation(&sequence, &index, &reference, &OrientationConfig::default());
        assert_eq!(outcome.sequence, sequence);
        assert_eq!(outcome.decisions.len(), 1);
        assert_eq!(outcome.decisions[0].chosen, Orientation::Original);
        assert_eq!(outcome.archived[0].orientation, Orientation::ReverseComplemented);
        // still failing, so it is reported with the trialed breakpoints
        assert_eq!(outcome.unresolved.len(), 1);
        assert_eq!(outcome.unresolved[0].span, outcome.decisions[0].trial_span);
        assert_eq!(outcome.unresolved[0].reason, UnresolvedReason::ReorientationNotBetter);
    }

    #[test]
    fn test_config_builder() {
        let config = OrientationConfigBuilder::default()
            .window_size(200)
            .max_passes(10)
            .build().unwrap();
        assert_eq!(config.window_size(), 200);
        assert_eq!(config.min_flip_span(), 2000);
        assert_eq!(config.max_passes(), MAX_REPAIR_PASSES);
    }
}
