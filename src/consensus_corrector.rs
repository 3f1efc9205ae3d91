/*!
# Consensus correction
Replaces assembled bases with the read-supported majority base at every position that has frequency data.
The vote only considers A/C/G/T; ties go to the lexicographically smallest symbol.
A winner with more than `majority_threshold` of the support is a true majority, anything less is a plurality that should be reviewed.

Correction is idempotent: events are only emitted when the base actually changes, so re-running with the same table is a no-op.
```
use plastome_polish::consensus_corrector::{CorrectorConfig, correct_sequence};
use plastome_polish::data_types::frequency_table::{FrequencyRecord, FrequencyTable};
use plastome_polish::data_types::sequence::Sequence;

let sequence = Sequence::new("example".to_string(), b"ACGT", true).unwrap();
let record = FrequencyRecord::new(1, [(b'A', 9), (b'C', 1)].into_iter().collect(), 0).unwrap();
let table = FrequencyTable::from_records([(1, record)]);

let outcome = correct_sequence(&sequence, &table, &CorrectorConfig::default());
assert_eq!(outcome.sequence.bases(), b"AAGT");
assert_eq!(outcome.events.len(), 1);
assert!(outcome.events[0].true_majority);
```
*/
use derive_builder::Builder;
use log::{debug, trace};
use serde::Serialize;

use crate::data_types::correction::CorrectionEvent;
use crate::data_types::frequency_table::FrequencyTable;
use crate::data_types::sequence::Sequence;

/// Controls the majority vote
#[derive(Builder, Clone, Copy, Debug, PartialEq, Serialize)]
#[builder(default)]
pub struct CorrectorConfig {
    /// A winning share strictly above this is a true majority
    majority_threshold: f64,
    /// Votes where the winner has fewer reads than this are ignored; 0 disables the filter
    min_support: u64
}

impl Default for CorrectorConfig {
    fn default() -> Self {
        Self {
            majority_threshold: 0.5,
            min_support: 0
        }
    }
}

impl CorrectorConfig {
    pub fn majority_threshold(&self) -> f64 {
        self.majority_threshold
    }

    pub fn min_support(&self) -> u64 {
        self.min_support
    }
}

/// Everything produced by correcting one sequence
#[derive(Clone, Debug)]
pub struct CorrectionOutcome {
    /// The corrected sequence, always the same length as the input
    pub sequence: Sequence,
    /// Substitutions in ascending position order
    pub events: Vec<CorrectionEvent>,
    /// Table positions that fall outside the sequence
    pub skipped_positions: Vec<usize>
}

/// Applies a majority vote at every position in the frequency table.
/// The table should already be anchored to the sequence (see `FrequencyTable::anchored`) if it carries reference matches.
/// # Arguments
/// * `sequence` - the sequence to correct
/// * `table` - per-position read support, 0-based
/// * `config` - vote parameters
pub fn correct_sequence(sequence: &Sequence, table: &FrequencyTable, config: &CorrectorConfig) -> CorrectionOutcome {
    let mut bases = sequence.bases().to_vec();
    let mut events = vec![];
    let mut skipped_positions = vec![];

    for (&position, record) in table.iter() {
        if position >= bases.len() {
            skipped_positions.push(position);
            continue;
        }

        let vote = match record.vote() {
            Some(v) => v,
            None => {
                trace!("{}: no A/C/G/T support at {position}", sequence.id());
                continue;
            }
        };

        if vote.count < config.min_support {
            trace!("{}: vote at {position} has only {} supporting reads", sequence.id(), vote.count);
            continue;
        }

        let original = bases[position];
        if vote.symbol == original {
            continue;
        }

        let margin = vote.margin();
        let true_majority = margin > config.majority_threshold;
        bases[position] = vote.symbol;
        events.push(CorrectionEvent {
            position,
            original,
            resolved: vote.symbol,
            margin,
            true_majority
        });
    }

    if !skipped_positions.is_empty() {
        debug!(
            "{}: {} frequency positions are beyond the sequence length {}",
            sequence.id(), skipped_positions.len(), bases.len()
        );
    }

    CorrectionOutcome {
        sequence: sequence.with_bases(bases),
        events,
        skipped_positions
    }
}
