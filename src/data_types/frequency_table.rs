
use std::collections::BTreeMap;

use crate::data_types::sequence::{Sequence, is_unambiguous, is_valid_symbol};

/// The unambiguous bases, in lexicographic order; this order is the vote tie-break
pub const VOTING_SYMBOLS: [u8; 4] = [b'A', b'C', b'G', b'T'];

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum FrequencyError {
    #[error("position {position} has no read support")]
    NoSupport { position: usize },
    #[error("position {position} has invalid symbol {symbol:?}")]
    InvalidSymbol { position: usize, symbol: char }
}

/// Result of a vote over the unambiguous counts at a single position
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vote {
    /// The winning symbol
    pub symbol: u8,
    /// Reads supporting the winning symbol
    pub count: u64,
    /// Reads supporting any of A/C/G/T
    pub total: u64
}

impl Vote {
    /// Winning count over total count
    pub fn margin(&self) -> f64 {
        self.count as f64 / self.total as f64
    }
}

/// Read support at a single position
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FrequencyRecord {
    /// Symbol to observed read count; symbols are uppercase
    counts: BTreeMap<u8, u64>,
    /// Reads that matched the pileup reference base, whatever it was
    reference_matches: u64
}

impl FrequencyRecord {
    /// Creates a new record, verifying that there is at least some support.
    /// # Arguments
    /// * `position` - 0-based position, only used for error reporting
    /// * `counts` - symbol to count lookup, symbols are normalized to uppercase
    /// * `reference_matches` - reads matching the reference base of the pileup
    /// # Errors
    /// * if any symbol is not a valid IUPAC code
    /// * if the total support is zero
    pub fn new(position: usize, counts: BTreeMap<u8, u64>, reference_matches: u64) -> Result<Self, FrequencyError> {
        let mut normalized: BTreeMap<u8, u64> = Default::default();
        for (symbol, count) in counts.into_iter() {
            let upper = symbol.to_ascii_uppercase();
            if !is_valid_symbol(upper) {
                return Err(FrequencyError::InvalidSymbol { position, symbol: symbol as char });
            }
            if count > 0 {
                *normalized.entry(upper).or_insert(0) += count;
            }
        }

        let total: u64 = normalized.values().sum::<u64>() + reference_matches;
        if total == 0 {
            return Err(FrequencyError::NoSupport { position });
        }

        Ok(Self {
            counts: normalized,
            reference_matches
        })
    }

    /// Count for a single symbol
    pub fn count(&self, symbol: u8) -> u64 {
        self.counts.get(&symbol).copied().unwrap_or(0)
    }

    /// Total support across all symbols, including reference matches
    pub fn total(&self) -> u64 {
        self.counts.values().sum::<u64>() + self.reference_matches
    }

    /// Majority vote over A/C/G/T.
    /// Ties go to the lexicographically smallest symbol.
    /// Returns None if there is no unambiguous support at all.
    pub fn vote(&self) -> Option<Vote> {
        let mut best: Option<(u8, u64)> = None;
        let mut total = 0;
        for &symbol in VOTING_SYMBOLS.iter() {
            let count = self.count(symbol);
            total += count;
            // strictly greater keeps the earliest symbol on ties
            let is_better = match best {
                Some((_s, best_count)) => count > best_count,
                None => count > 0
            };
            if is_better {
                best = Some((symbol, count));
            }
        }
        best.map(|(symbol, count)| Vote { symbol, count, total })
    }

    /// Folds the reference matches into the count for `base`.
    /// Ambiguous bases cannot take part in a vote, so the matches are dropped for those.
    fn anchor(&self, base: u8) -> Self {
        let mut counts = self.counts.clone();
        if self.reference_matches > 0 && is_unambiguous(base) {
            *counts.entry(base).or_insert(0) += self.reference_matches;
        }
        Self {
            counts,
            reference_matches: 0
        }
    }

    pub fn reference_matches(&self) -> u64 {
        self.reference_matches
    }
}

/// Per-position read support for one assembled sequence.
/// Positions are 0-based; positions without a record carry no data.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FrequencyTable {
    records: BTreeMap<usize, FrequencyRecord>
}

impl FrequencyTable {
    /// Builds a table from records, later duplicates replace earlier ones
    pub fn from_records(records: impl IntoIterator<Item = (usize, FrequencyRecord)>) -> Self {
        Self {
            records: records.into_iter().collect()
        }
    }

    /// Binds any reference-match counts to the bases of `sequence`.
    /// The pileup reference is the sequence being corrected, so a `.`/`,` in the pileup is support for the current base.
    /// This must happen once, before correction, so that repeated correction sees identical counts.
    pub fn anchored(&self, sequence: &Sequence) -> Self {
        let bases = sequence.bases();
        let records = self.records.iter()
            .map(|(&position, record)| {
                let anchored = match bases.get(position) {
                    Some(&base) => record.anchor(base),
                    // out of range, leave it so the corrector can report it
                    None => record.clone()
                };
                (position, anchored)
            })
            .collect();
        Self { records }
    }

    pub fn get(&self, position: usize) -> Option<&FrequencyRecord> {
        self.records.get(&position)
    }

    /// Iterates over records in ascending position order
    pub fn iter(&self) -> impl Iterator<Item = (&usize, &FrequencyRecord)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
