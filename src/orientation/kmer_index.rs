
use rustc_hash::FxHashSet as HashSet;

/// Largest k we can pack into a u64
pub const MAX_KMER_SIZE: usize = 32;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum KmerError {
    #[error("k-mer size must be in 1..={MAX_KMER_SIZE}, got {k}")]
    InvalidSize { k: usize }
}

/// 2-bit encoding for the unambiguous bases
fn encode_base(base: u8) -> Option<u64> {
    match base {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None
    }
}

/// Iterator over the packed k-mers of a sequence.
/// Yields `(start, Option<kmer>)` for every start position in `0..=len-k`; k-mers containing an ambiguous symbol are None.
pub struct PackedKmers<'a> {
    seq: &'a [u8],
    k: usize,
    mask: u64,
    /// Next start position to report
    next_start: usize,
    /// Rolling packed value over the last `valid_run` bases
    packed: u64,
    /// Number of consecutive unambiguous bases ending at the end of the current k-mer
    valid_run: usize,
    /// Number of bases consumed so far
    consumed: usize
}

impl<'a> PackedKmers<'a> {
    fn new(seq: &'a [u8], k: usize) -> Self {
        let mask = if k == MAX_KMER_SIZE { u64::MAX } else { (1u64 << (2 * k)) - 1 };
        Self {
            seq, k, mask,
            next_start: 0,
            packed: 0,
            valid_run: 0,
            consumed: 0
        }
    }
}

impl Iterator for PackedKmers<'_> {
    type Item = (usize, Option<u64>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.k == 0 || self.next_start + self.k > self.seq.len() {
            return None;
        }

        // consume bases until the current k-mer is fully loaded
        while self.consumed < self.next_start + self.k {
            match encode_base(self.seq[self.consumed]) {
                Some(code) => {
                    self.packed = ((self.packed << 2) | code) & self.mask;
                    self.valid_run += 1;
                },
                None => {
                    self.packed = 0;
                    self.valid_run = 0;
                }
            }
            self.consumed += 1;
        }

        let start = self.next_start;
        self.next_start += 1;
        let kmer = if self.valid_run >= self.k { Some(self.packed) } else { None };
        Some((start, kmer))
    }
}

/// Returns an iterator over all packed k-mers of `seq`
pub fn packed_kmers(seq: &[u8], k: usize) -> PackedKmers<'_> {
    PackedKmers::new(seq, k)
}

/// Set of the forward-strand k-mers of a sequence
#[derive(Clone, Debug, Default)]
pub struct KmerIndex {
    /// k-mer length
    k: usize,
    /// All unambiguous k-mers, 2-bit packed
    kmers: HashSet<u64>
}

impl KmerIndex {
    /// Builds the index from the forward strand of a sequence.
    /// # Arguments
    /// * `seq` - the sequence to index, uppercase
    /// * `k` - the k-mer length
    /// # Errors
    /// * if `k` is 0 or larger than 32
    pub fn new(seq: &[u8], k: usize) -> Result<Self, KmerError> {
        if k == 0 || k > MAX_KMER_SIZE {
            return Err(KmerError::InvalidSize { k });
        }

        let kmers: HashSet<u64> = packed_kmers(seq, k)
            .filter_map(|(_start, kmer)| kmer)
            .collect();
        Ok(Self { k, kmers })
    }

    pub fn contains(&self, kmer: u64) -> bool {
        self.kmers.contains(&kmer)
    }

    /// For each k-mer start in `seq`, returns Some(true) if the k-mer is in the index, None if it is ambiguous
    pub fn hits(&self, seq: &[u8]) -> Vec<Option<bool>> {
        packed_kmers(seq, self.k)
            .map(|(_start, kmer)| kmer.map(|v| self.contains(v)))
            .collect()
    }

    /// Fraction of the distinct k-mers in `other` that are also present here.
    /// Returns None if `other` has no k-mers.
    pub fn containment_of(&self, other: &KmerIndex) -> Option<f64> {
        if other.kmers.is_empty() {
            return None;
        }
        let shared = other.kmers.iter()
            .filter(|kmer| self.kmers.contains(kmer))
            .count();
        Some(shared as f64 / other.kmers.len() as f64)
    }

    // getters
    pub fn k(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        self.kmers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kmers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_kmers() {
        let kmers: Vec<(usize, Option<u64>)> = packed_kmers(b"ACGTA", 3).collect();
        // ACG = 0b000110, CGT = 0b011011, GTA = 0b101100
        assert_eq!(kmers, vec![(0, Some(0b000110)), (1, Some(0b011011)), (2, Some(0b101100))]);

        // the N poisons every k-mer it touches
        let kmers: Vec<Option<u64>> = packed_kmers(b"ACNGTA", 2).map(|(_s, k)| k).collect();
        assert_eq!(kmers, vec![Some(0b0001), None, None, Some(0b1011), Some(0b1100)]);

        // too short
        assert_eq!(packed_kmers(b"AC", 3).count(), 0);
    }

    #[test]
    fn test_max_k() {
        let seq = vec![b'T'; 40];
        let index = KmerIndex::new(&seq, 32).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.contains(u64::MAX));
        assert_eq!(KmerIndex::new(&seq, 33).unwrap_err(), KmerError::InvalidSize { k: 33 });
        assert_eq!(KmerIndex::new(&seq, 0).unwrap_err(), KmerError::InvalidSize { k: 0 });
    }

    #[test]
    fn test_hits_and_containment() {
        let index = KmerIndex::new(b"AACCGGTT", 4).unwrap();
        assert_eq!(index.hits(b"ACCGNAAC"), vec![Some(true), None, None, None, None]);

        let other = KmerIndex::new(b"CCGGTTAA", 4).unwrap();
        // CCGG, CGGT, GGTT are shared; GTTA, TTAA are not
        let containment = index.containment_of(&other).unwrap();
        assert!((containment - 3.0 / 5.0).abs() < 1e-9);
        assert_eq!(index.containment_of(&KmerIndex::default()), None);
    }
}
